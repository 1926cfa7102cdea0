use crate::{
    state::{AggregateState, DEFAULT_HISTORY_CAPACITY, Update},
    whale::WhaleConfig,
};
use chrono::Utc;
use liqfeed_data::LiquidationEvent;
use std::time::Duration;
use tokio::{
    sync::{broadcast, mpsc, watch},
    time::Instant,
};
use tracing::{debug, info};

/// Default interval between whale retention sweeps when no events arrive.
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Default number of [`Update`]s buffered per lagging notification subscriber.
pub const DEFAULT_UPDATE_CAPACITY: usize = 1024;

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct EngineConfig {
    pub history_capacity: usize,
    pub whales: WhaleConfig,
    pub prune_interval: Duration,
    pub update_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            whales: WhaleConfig::default(),
            prune_interval: DEFAULT_PRUNE_INTERVAL,
            update_capacity: DEFAULT_UPDATE_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_whales(mut self, whales: WhaleConfig) -> Self {
        self.whales = whales;
        self
    }

    pub fn with_prune_interval(mut self, interval: Duration) -> Self {
        self.prune_interval = interval;
        self
    }
}

/// Single writer of the [`AggregateState`].
///
/// Events from every exchange arrive on one channel and are applied one at a time in arrival
/// order. Readers observe the state through the [`EngineHandle`].
#[derive(Debug)]
pub struct Engine {
    event_rx: mpsc::UnboundedReceiver<LiquidationEvent>,
    state_tx: watch::Sender<AggregateState>,
    update_tx: broadcast::Sender<Update>,
    shutdown_rx: watch::Receiver<bool>,
    prune_interval: Duration,
}

/// Read & control access to a running [`Engine`].
///
/// Clones share the engine's shutdown signal. Dropping the last handle counts as a shutdown
/// request: the engine applies whatever is already queued and stops. Keep a handle alive for
/// as long as the engine should run.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    state_rx: watch::Receiver<AggregateState>,
    update_tx: broadcast::Sender<Update>,
    shutdown_tx: watch::Sender<bool>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        event_rx: mpsc::UnboundedReceiver<LiquidationEvent>,
    ) -> (Self, EngineHandle) {
        let state = AggregateState::new(config.history_capacity).with_whale_config(config.whales);
        let (state_tx, state_rx) = watch::channel(state);
        let (update_tx, _) = broadcast::channel(config.update_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let engine = Self {
            event_rx,
            state_tx,
            update_tx: update_tx.clone(),
            shutdown_rx,
            prune_interval: config.prune_interval,
        };

        let handle = EngineHandle {
            state_rx,
            update_tx,
            shutdown_tx,
        };

        (engine, handle)
    }

    /// Apply events until every producer is dropped or shutdown is requested, returning the
    /// final [`AggregateState`].
    ///
    /// On shutdown, events already queued are applied before returning. Dropping every
    /// [`EngineHandle`] requests shutdown.
    pub async fn run(mut self) -> AggregateState {
        let mut prune = tokio::time::interval_at(
            Instant::now() + self.prune_interval,
            self.prune_interval,
        );
        let mut shutdown = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => {
                    while let Ok(event) = self.event_rx.try_recv() {
                        self.apply(event);
                    }
                    info!("engine shut down");
                    break;
                }
                event = self.event_rx.recv() => match event {
                    Some(event) => self.apply(event),
                    None => {
                        info!("all event producers dropped, engine stopping");
                        break;
                    }
                },
                _ = prune.tick() => {
                    let pruned = self
                        .state_tx
                        .send_if_modified(|state| state.prune_whales(Utc::now()));
                    if pruned {
                        debug!("pruned expired whales");
                    }
                }
            }
        }

        self.state_tx.borrow().clone()
    }

    fn apply(&mut self, event: LiquidationEvent) {
        let mut update = None;
        self.state_tx
            .send_modify(|state| update = Some(state.apply(&event)));

        let Some(update) = update else {
            return;
        };

        if !update.unlocked.is_empty() {
            info!(
                achievements = ?update.unlocked,
                exchange = %event.exchange(),
                symbol = %event.symbol(),
                "achievements unlocked"
            );
        }

        // No subscribers is not an error
        let _ = self.update_tx.send(update);
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|shutdown| *shutdown).await;
}

impl EngineHandle {
    /// Snapshot of the current [`AggregateState`].
    pub fn state(&self) -> AggregateState {
        self.state_rx.borrow().clone()
    }

    /// Receiver notified after every applied event and whale sweep.
    pub fn subscribe_state(&self) -> watch::Receiver<AggregateState> {
        self.state_rx.clone()
    }

    /// Receiver of one [`Update`] per applied event.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<Update> {
        self.update_tx.subscribe()
    }

    /// Retained history, oldest first.
    pub fn history(&self) -> Vec<LiquidationEvent> {
        self.state_rx.borrow().history().cloned().collect()
    }

    /// Request the [`Engine`] stops after applying queued events.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
