use self::{connection::ConnectionManager, reconnect::ReconnectPolicy};
use crate::{
    error::DataError,
    event::{ExchangeId, LiquidationEvent},
    normalise::Normaliser,
    subscription::Subscription,
};
use derive_more::Display;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{info, warn};

/// Per-exchange [`ConnectionManager`] driving one liquidation WebSocket.
pub mod connection;

/// Reconnection policy applied when a connection closes.
pub mod reconnect;

/// Per-connection idle watchdog.
pub mod watchdog;

/// Default timeout applied to WebSocket connection establishment.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle state of one exchange connection.
#[derive(
    Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    #[display("connecting")]
    Connecting,
    #[display("open")]
    Open,
    #[display("subscribing")]
    Subscribing,
    #[display("streaming")]
    Streaming,
    #[display("closed")]
    Closed,
}

impl ConnectionState {
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Streaming)
    }
}

/// Connection behaviour shared by every exchange stream.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct StreamConfig {
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: watchdog::DEFAULT_READ_TIMEOUT,
        }
    }
}

impl StreamConfig {
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// Running liquidation streams, one task per subscribed exchange.
///
/// Dropping this without calling [`LiquidationStreams::shutdown`] also stops every task, but
/// does not wait for them to close their sockets.
#[derive(Debug)]
pub struct LiquidationStreams {
    states: BTreeMap<ExchangeId, Arc<RwLock<ConnectionState>>>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl LiquidationStreams {
    pub fn builder() -> LiquidationStreamsBuilder {
        LiquidationStreamsBuilder::default()
    }

    /// Current [`ConnectionState`] of the provided exchange, if it was subscribed.
    pub fn connection_state(&self, exchange: ExchangeId) -> Option<ConnectionState> {
        self.states.get(&exchange).map(|state| *state.read())
    }

    /// [`ConnectionState`] of every subscribed exchange.
    pub fn connection_states(&self) -> impl Iterator<Item = (ExchangeId, ConnectionState)> + '_ {
        self.states
            .iter()
            .map(|(exchange, state)| (*exchange, *state.read()))
    }

    pub fn exchanges(&self) -> impl Iterator<Item = ExchangeId> + '_ {
        self.states.keys().copied()
    }

    /// Signal every connection to close and wait until all tasks have finished.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        for handle in self.handles {
            if let Err(error) = handle.await {
                warn!(%error, "liquidation stream task failed");
            }
        }

        info!("liquidation streams shut down");
    }
}

/// Builder for [`LiquidationStreams`].
#[derive(Debug, Default)]
pub struct LiquidationStreamsBuilder {
    subscriptions: Vec<Subscription>,
    config: StreamConfig,
    normaliser: Normaliser,
}

impl LiquidationStreamsBuilder {
    pub fn subscribe(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn normaliser(mut self, normaliser: Normaliser) -> Self {
        self.normaliser = normaliser;
        self
    }

    /// Validate every [`Subscription`] and spawn one [`ConnectionManager`] per exchange, each
    /// forwarding normalised events to `event_tx`.
    pub async fn init(
        self,
        event_tx: mpsc::UnboundedSender<LiquidationEvent>,
    ) -> Result<LiquidationStreams, DataError> {
        let mut subscriptions = BTreeMap::new();
        for subscription in self.subscriptions {
            subscription.validate()?;
            let exchange = subscription.exchange;
            if subscriptions.insert(exchange, subscription).is_some() {
                return Err(DataError::DuplicateSubscription(exchange));
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut states = BTreeMap::new();
        let mut handles = Vec::with_capacity(subscriptions.len());

        for (exchange, subscription) in subscriptions {
            let state = Arc::new(RwLock::new(ConnectionState::default()));
            let manager = ConnectionManager::new(
                subscription,
                self.config,
                self.normaliser,
                event_tx.clone(),
                Arc::clone(&state),
                shutdown_rx.clone(),
            );

            info!(%exchange, "spawning liquidation stream");
            handles.push(tokio::spawn(manager.run()));
            states.insert(exchange, state);
        }

        Ok(LiquidationStreams {
            states,
            shutdown_tx,
            handles,
        })
    }
}
