use super::{ConnectionState, StreamConfig, watchdog::IdleWatchdog};
use crate::{
    error::DataError,
    event::{ExchangeId, LiquidationEvent},
    exchange::{Binance, Bybit, Connector, ControlFrame, Decoded, Okx, PingInterval, WsMessage},
    normalise::Normaliser,
    subscription::Subscription,
};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::{
    sync::{mpsc, watch},
    time::{Instant, Interval},
};
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};
use url::Url;

/// How a single connection session ended.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum SessionEnd {
    /// Teardown was requested.
    Shutdown,
    /// The session reached `Streaming` and then lost the connection.
    Disconnected,
}

/// Owns one logical liquidation stream for a single exchange, driving it through
/// `Connecting -> Open -> Subscribing -> Streaming -> Closed` and reconnecting according to
/// the configured [`ReconnectPolicy`](super::ReconnectPolicy).
#[derive(Debug)]
pub struct ConnectionManager {
    subscription: Subscription,
    config: StreamConfig,
    normaliser: Normaliser,
    event_tx: mpsc::UnboundedSender<LiquidationEvent>,
    state: Arc<RwLock<ConnectionState>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ConnectionManager {
    pub fn new(
        subscription: Subscription,
        config: StreamConfig,
        normaliser: Normaliser,
        event_tx: mpsc::UnboundedSender<LiquidationEvent>,
        state: Arc<RwLock<ConnectionState>>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            subscription,
            config,
            normaliser,
            event_tx,
            state,
            shutdown_rx,
        }
    }

    pub fn exchange(&self) -> ExchangeId {
        self.subscription.exchange
    }

    /// Run until teardown, the reconnect policy gives up, or the event receiver is dropped.
    pub async fn run(self) {
        match self.subscription.exchange {
            ExchangeId::Binance => self.run_with::<Binance>().await,
            ExchangeId::Bybit => self.run_with::<Bybit>().await,
            ExchangeId::Okx => self.run_with::<Okx>().await,
        }
    }

    async fn run_with<C: Connector>(self) {
        match C::url(&self.subscription) {
            Ok(url) => self.run_at::<C>(url).await,
            Err(error) => {
                error!(exchange = %C::ID, %error, "invalid liquidation stream url");
                self.set_state(ConnectionState::Closed);
            }
        }
    }

    async fn run_at<C: Connector>(self, url: Url) {
        let exchange = C::ID;
        let mut shutdown = self.shutdown_rx.clone();
        let mut attempt = 0u32;

        loop {
            self.set_state(ConnectionState::Connecting);

            match self.session::<C>(&url, &mut shutdown).await {
                Ok(SessionEnd::Shutdown) => {
                    info!(%exchange, "liquidation stream shut down");
                    break;
                }
                Ok(SessionEnd::Disconnected) => {
                    attempt = 0;
                }
                Err(DataError::EventReceiverDropped) => {
                    warn!(%exchange, "event receiver dropped, stopping liquidation stream");
                    break;
                }
                Err(error) => {
                    error!(%exchange, %error, "liquidation stream session failed");
                }
            }

            self.set_state(ConnectionState::Closed);

            attempt = attempt.saturating_add(1);
            let Some(delay) = self.config.reconnect.delay(attempt) else {
                warn!(%exchange, attempt, "reconnect policy exhausted, stream stays closed");
                break;
            };

            info!(
                %exchange,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "reconnecting liquidation stream"
            );

            tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => {
                    info!(%exchange, "liquidation stream shut down during reconnect backoff");
                    break;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Closed);
    }

    async fn session<C: Connector>(
        &self,
        url: &Url,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, DataError> {
        let exchange = C::ID;
        debug!(%exchange, %url, "connecting");

        let connect =
            tokio::time::timeout(self.config.connect_timeout, connect_async(url.as_str()));
        let websocket = tokio::select! {
            biased;
            () = shutdown_requested(shutdown) => return Ok(SessionEnd::Shutdown),
            result = connect => match result {
                Ok(Ok((websocket, _response))) => websocket,
                Ok(Err(error)) => return Err(DataError::from(error)),
                Err(_elapsed) => return Err(DataError::ConnectTimeout(self.config.connect_timeout)),
            },
        };

        self.set_state(ConnectionState::Open);
        info!(%exchange, %url, "connected");

        let (mut write, read) = websocket.split();
        let budget = C::idle_budget(self.config.read_timeout);
        let mut read = IdleWatchdog::new(exchange, read, budget);

        let requests = C::requests(&self.subscription);
        if !requests.is_empty() {
            self.set_state(ConnectionState::Subscribing);
            for request in requests {
                debug!(%exchange, payload = %request, "sending subscribe request");
                write.send(request).await?;
            }
        }

        self.set_state(ConnectionState::Streaming);

        let mut heartbeat = C::ping_interval().map(Heartbeat::new);

        loop {
            tokio::select! {
                biased;
                () = shutdown_requested(shutdown) => {
                    if let Err(error) = write.send(WsMessage::Close(None)).await {
                        debug!(%exchange, %error, "failed to send close frame");
                    }
                    return Ok(SessionEnd::Shutdown);
                }
                message = read.next() => match message {
                    Some(Ok(WsMessage::Text(text))) => self.process::<C>(text.as_str())?,
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(%exchange, ?frame, "connection closed by exchange");
                        return Ok(SessionEnd::Disconnected);
                    }
                    Some(Ok(WsMessage::Binary(payload))) => {
                        debug!(%exchange, len = payload.len(), "ignoring binary frame");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error @ DataError::ReadTimeout { .. })) => {
                        warn!(%exchange, %error, "connection went quiet");
                        return Ok(SessionEnd::Disconnected);
                    }
                    Some(Err(error)) => {
                        error!(%exchange, %error, "connection error");
                        return Ok(SessionEnd::Disconnected);
                    }
                    None => {
                        warn!(%exchange, "connection stream ended");
                        return Ok(SessionEnd::Disconnected);
                    }
                },
                ping = Heartbeat::tick(&mut heartbeat) => {
                    if let Err(error) = write.send(ping).await {
                        error!(%exchange, %error, "failed to send heartbeat");
                        return Ok(SessionEnd::Disconnected);
                    }
                }
            }
        }
    }

    /// Decode, filter and normalise one text frame, forwarding resulting events.
    ///
    /// Only a dropped event receiver is reported as an error; undecodable frames are logged
    /// and discarded so the connection stays open.
    fn process<C: Connector>(&self, payload: &str) -> Result<(), DataError> {
        let exchange = C::ID;

        let partials = match C::decode(payload) {
            Ok(Decoded::Liquidations(partials)) => partials,
            Ok(Decoded::Control(ControlFrame::Rejected(reason))) => {
                warn!(%exchange, %reason, "request rejected by exchange");
                return Ok(());
            }
            Ok(Decoded::Control(frame)) => {
                debug!(%exchange, ?frame, "control frame");
                return Ok(());
            }
            Err(error) => {
                warn!(%exchange, %error, payload, "discarding undecodable frame");
                return Ok(());
            }
        };

        for partial in partials {
            if !self.subscription.accepts(&partial.symbol) {
                continue;
            }

            match self.normaliser.normalise(exchange, partial) {
                Ok(event) => self
                    .event_tx
                    .send(event)
                    .map_err(|_| DataError::EventReceiverDropped)?,
                Err(error) => warn!(%exchange, %error, "discarding invalid liquidation"),
            }
        }

        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(exchange = %self.exchange(), from = %previous, to = %state, "connection state");
        }
    }
}

/// Resolves once teardown is requested or the [`LiquidationStreams`](super::LiquidationStreams)
/// owning the sender is dropped.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|shutdown| *shutdown).await;
}

/// Application level ping schedule. The first ping fires one interval after the session
/// starts streaming.
#[derive(Debug)]
struct Heartbeat {
    interval: Interval,
    ping: fn() -> WsMessage,
}

impl Heartbeat {
    fn new(PingInterval { interval, ping }: PingInterval) -> Self {
        Self {
            interval: tokio::time::interval_at(Instant::now() + interval, interval),
            ping,
        }
    }

    /// Resolves with the next ping to send, or never if the exchange needs no heartbeat.
    async fn tick(heartbeat: &mut Option<Self>) -> WsMessage {
        match heartbeat {
            Some(heartbeat) => {
                heartbeat.interval.tick().await;
                (heartbeat.ping)()
            }
            None => std::future::pending().await,
        }
    }
}
