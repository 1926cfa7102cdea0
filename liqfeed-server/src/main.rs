use crate::config::ServerConfig;
use futures::StreamExt;
use liqfeed_data::{normalise::Normaliser, stream::LiquidationStreams};
use liqfeed_stats::{Engine, Update};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{debug, info, warn};

mod config;

/// Interval between connection status log lines.
const STATUS_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Install the ring crypto provider before any TLS connection is made
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = ServerConfig::from_env()?;
    info!(
        exchanges = ?config.subscriptions.iter().map(|sub| sub.exchange).collect::<Vec<_>>(),
        bybit_side_rule = ?config.bybit_side_rule,
        reconnect = ?config.stream.reconnect,
        history_capacity = config.engine.history_capacity,
        "starting liquidation feed"
    );

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (engine, handle) = Engine::new(config.engine, event_rx);
    let reporter = tokio::spawn(report_updates(handle.subscribe_updates()));
    let engine = tokio::spawn(engine.run());

    let streams = config
        .subscriptions
        .into_iter()
        .fold(LiquidationStreams::builder(), |builder, subscription| {
            builder.subscribe(subscription)
        })
        .config(config.stream)
        .normaliser(Normaliser::new(config.bybit_side_rule))
        .init(event_tx)
        .await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut status = tokio::time::interval(STATUS_INTERVAL);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(error) = result {
                    warn!(%error, "failed to listen for ctrl-c, shutting down");
                }
                break;
            }
            _ = status.tick() => {
                for (exchange, state) in streams.connection_states() {
                    debug!(%exchange, %state, "connection status");
                }
            }
        }
    }

    info!("shutting down");
    streams.shutdown().await;
    handle.shutdown();
    drop(handle);

    let state = engine.await?;
    reporter.await?;

    let counters = state.counters();
    info!(
        total_value = %state.total_value(),
        high_score = %state.high_score(),
        buys = counters.buy_count,
        sells = counters.sell_count,
        buy_ratio = counters.buy_ratio(),
        streak_days = state.streak().days(),
        achievements = state.achievements().unlocked_count(),
        "final liquidation statistics"
    );
    debug!(snapshot = %serde_json::to_string(&state)?, "final aggregate state");

    Ok(())
}

/// Log one line per applied liquidation, plus whales and achievement unlocks.
async fn report_updates(updates: broadcast::Receiver<Update>) {
    let mut updates = BroadcastStream::new(updates);

    while let Some(update) = updates.next().await {
        let update = match update {
            Ok(update) => update,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "update reporter lagged");
                continue;
            }
        };

        let event = &update.event;
        info!(
            exchange = %event.exchange(),
            symbol = %event.symbol(),
            side = %event.side(),
            quantity = %event.quantity(),
            price = %event.price(),
            value = %event.value(),
            total_value = %update.total_value,
            "liquidation"
        );

        if update.whale {
            info!(
                exchange = %event.exchange(),
                symbol = %event.symbol(),
                value = %event.value(),
                "whale liquidation"
            );
        }

        for achievement in &update.unlocked {
            info!(
                title = achievement.title(),
                description = achievement.description(),
                "achievement unlocked"
            );
        }
    }
}

// Initialise an INFO `Subscriber` for `Tracing` logs and install it as the global default.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        // Disable colours on release builds
        .with_ansi(cfg!(debug_assertions))
        .init()
}
