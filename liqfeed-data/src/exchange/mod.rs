use crate::{
    error::DataError, event::ExchangeId, normalise::PartialLiquidation,
    subscription::Subscription,
};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// `Binance` USD-M futures [`Connector`] and liquidation payload types.
pub mod binance;

/// `Bybit` linear perpetual [`Connector`] and liquidation payload types.
pub mod bybit;

/// `Okx` [`Connector`] and liquidation payload types.
pub mod okx;

pub use self::{binance::Binance, bybit::Bybit, okx::Okx};

/// Convenient type alias for a tungstenite WebSocket message.
pub type WsMessage = Message;

/// Defines how to connect to, subscribe to, keep alive, and decode an exchange liquidation
/// feed.
pub trait Connector {
    /// Unique identifier for the exchange this [`Connector`] communicates with.
    const ID: ExchangeId;

    /// WebSocket url to connect to for the provided [`Subscription`].
    fn url(subscription: &Subscription) -> Result<Url, DataError>;

    /// Defines an application level [`PingInterval`] the exchange requires, if any.
    fn ping_interval() -> Option<PingInterval> {
        None
    }

    /// Longest silence tolerated before a connection is treated as dead.
    ///
    /// Never shorter than two [`PingInterval`]s, so replies to our own heartbeat always land
    /// inside the budget of a healthy connection.
    fn idle_budget(read_timeout: Duration) -> Duration {
        Self::ping_interval().map_or(read_timeout, |ping| {
            read_timeout.max(ping.interval.saturating_mul(2))
        })
    }

    /// Subscribe requests sent as soon as the connection opens. Empty if the url alone
    /// selects the stream.
    fn requests(subscription: &Subscription) -> Vec<WsMessage>;

    /// Decode one text frame into liquidations or a recognised protocol control frame.
    fn decode(payload: &str) -> Result<Decoded, DataError>;
}

/// Application level ping an exchange expects on a fixed interval.
#[derive(Copy, Clone, Debug)]
pub struct PingInterval {
    pub interval: Duration,
    pub ping: fn() -> WsMessage,
}

/// Result of decoding one exchange frame.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Decoded {
    /// Zero or more liquidations. Malformed elements are dropped by the decoder.
    Liquidations(Vec<PartialLiquidation>),
    /// Protocol frame carrying no liquidation.
    Control(ControlFrame),
}

impl Decoded {
    pub fn none() -> Self {
        Decoded::Liquidations(Vec::new())
    }
}

/// Protocol control frames recognised per exchange.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ControlFrame {
    SubscriptionAck,
    Pong,
    /// Exchange reported an error for a request we sent (eg/ rejected subscription).
    Rejected(String),
    /// Recognised envelope for a channel this crate does not consume.
    Other(String),
}

/// Decode a text frame with the [`Connector`] selected by `exchange`.
pub fn decode(exchange: ExchangeId, payload: &str) -> Result<Decoded, DataError> {
    match exchange {
        ExchangeId::Binance => Binance::decode(payload),
        ExchangeId::Bybit => Bybit::decode(payload),
        ExchangeId::Okx => Okx::decode(payload),
    }
}

/// Deserialise a JSON frame, attributing failures to the provided exchange.
pub(crate) fn from_json<'a, T>(exchange: ExchangeId, payload: &'a str) -> Result<T, DataError>
where
    T: serde::Deserialize<'a>,
{
    serde_json::from_str(payload).map_err(|error| DataError::Deserialise {
        exchange,
        error: error.to_string(),
    })
}
