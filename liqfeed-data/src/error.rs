use crate::event::ExchangeId;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// All errors generated in `liqfeed-data`.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum DataError {
    #[error("unsupported exchange: {0}")]
    UnsupportedExchange(String),

    #[error("unsupported liquidation side: {0}")]
    UnsupportedSide(String),

    #[error("unsupported side rule: {0}")]
    UnsupportedSideRule(String),

    #[error("{exchange} subscription requires at least one symbol")]
    SubscriptionsEmpty { exchange: ExchangeId },

    #[error("duplicate {0} subscription")]
    DuplicateSubscription(ExchangeId),

    #[error("failed to deserialise {exchange} payload: {error}")]
    Deserialise { exchange: ExchangeId, error: String },

    #[error("{exchange} payload missing required field: {field}")]
    MissingField {
        exchange: ExchangeId,
        field: &'static str,
    },

    #[error("{exchange} payload field {field} has invalid value: {value}")]
    InvalidField {
        exchange: ExchangeId,
        field: &'static str,
        value: String,
    },

    #[error("{exchange} liquidation value overflows: {quantity} * {price}")]
    ValueOverflow {
        exchange: ExchangeId,
        quantity: Decimal,
        price: Decimal,
    },

    #[error("invalid WebSocket url: {0}")]
    UrlParse(String),

    #[error("timed out after {0:?} establishing WebSocket connection")]
    ConnectTimeout(Duration),

    #[error("{exchange} sent no frame within {timeout:?}")]
    ReadTimeout {
        exchange: ExchangeId,
        timeout: Duration,
    },

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("liquidation event receiver dropped")]
    EventReceiverDropped,
}

impl DataError {
    /// Determine if an error requires the owning connection to be torn down.
    ///
    /// Decode errors only ever cost the offending message; the connection stays open.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            DataError::UrlParse(_)
            | DataError::ConnectTimeout(_)
            | DataError::ReadTimeout { .. }
            | DataError::Socket(_)
            | DataError::EventReceiverDropped => true,
            _ => false,
        }
    }
}

impl From<url::ParseError> for DataError {
    fn from(value: url::ParseError) -> Self {
        Self::UrlParse(value.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DataError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(value.to_string())
    }
}
