use crate::{
    de::{datetime_utc_from_epoch_ms, parse_decimal_field, parse_epoch_ms},
    error::DataError,
    event::{ExchangeId, Side},
    exchange::ControlFrame,
    normalise::PartialLiquidation,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use smol_str::SmolStr;
use tracing::warn;

/// Bybit does not publish an order type or status for liquidations.
const BYBIT_ORDER_TYPE: &str = "LIMIT";
const BYBIT_ORDER_STATUS: &str = "FILLED";

/// Messages received on the Bybit all liquidation stream.
#[derive(Clone, Debug)]
pub enum BybitLiquidationMessage {
    Response(BybitResponse),
    Payload(BybitAllLiquidation),
}

impl<'de> Deserialize<'de> for BybitLiquidationMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        if value.get("topic").is_some_and(Value::is_string) {
            serde_json::from_value(value)
                .map(BybitLiquidationMessage::Payload)
                .map_err(serde::de::Error::custom)
        } else if value.get("op").is_some_and(Value::is_string) {
            serde_json::from_value(value)
                .map(BybitLiquidationMessage::Response)
                .map_err(serde::de::Error::custom)
        } else {
            Err(serde::de::Error::custom(
                "expected Bybit topic payload or op response",
            ))
        }
    }
}

/// [`Bybit`](super::Bybit) response to an `op` request (subscribe, ping).
///
/// ### Raw Payload Examples
/// ```json
/// {"success":true,"ret_msg":"","conn_id":"2324d924-aa4d-45b0-a858-7b8be29ab52b","req_id":"","op":"subscribe"}
/// {"success":true,"ret_msg":"pong","conn_id":"0970e817-426e-429a-a679-ff7f55e0b16a","op":"ping"}
/// ```
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct BybitResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub ret_msg: String,
    pub op: String,
}

impl BybitResponse {
    pub fn into_control_frame(self) -> ControlFrame {
        match (self.op.as_str(), self.success) {
            (_, Some(false)) => ControlFrame::Rejected(format!("{}: {}", self.op, self.ret_msg)),
            ("ping" | "pong", _) => ControlFrame::Pong,
            ("subscribe", _) => ControlFrame::SubscriptionAck,
            _ => ControlFrame::Other(self.op),
        }
    }
}

/// [`Bybit`](super::Bybit) all liquidation payload.
///
/// ### Raw Payload Examples
/// See docs: <https://bybit-exchange.github.io/docs/v5/websocket/public/all-liquidation>
/// ```json
/// {
///     "topic": "allLiquidation.ROSEUSDT",
///     "type": "snapshot",
///     "ts": 1739502303204,
///     "data": [
///         {"T": 1739502302929, "s": "ROSEUSDT", "S": "Sell", "v": "20000", "p": "0.04499"}
///     ]
/// }
/// ```
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct BybitAllLiquidation {
    pub topic: String,
    #[serde(default)]
    pub ts: Option<u64>,
    #[serde(default)]
    pub data: Vec<BybitLiquidationEntry>,
}

impl BybitAllLiquidation {
    /// Convert every well formed entry into a [`PartialLiquidation`], logging and discarding
    /// the rest.
    pub fn into_partials(self) -> Vec<PartialLiquidation> {
        let fallback_time = self.ts.and_then(datetime_utc_from_epoch_ms);

        self.data
            .into_iter()
            .filter_map(|entry| match entry.into_partial(fallback_time) {
                Ok(partial) => Some(partial),
                Err(error) => {
                    warn!(exchange = %ExchangeId::Bybit, %error, "discarding malformed liquidation");
                    None
                }
            })
            .collect()
    }
}

/// Individual liquidation entry included within a [`BybitAllLiquidation`] payload.
///
/// Fields are optional so that missing values can be reported per field rather than failing
/// the whole frame.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
pub struct BybitLiquidationEntry {
    #[serde(rename = "T", default)]
    pub time: Option<Value>,
    #[serde(rename = "s", default)]
    pub symbol: Option<Value>,
    #[serde(rename = "S", default)]
    pub side: Option<Value>,
    #[serde(rename = "v", default)]
    pub volume: Option<Value>,
    #[serde(rename = "p", default)]
    pub price: Option<Value>,
}

impl BybitLiquidationEntry {
    pub fn into_partial(
        self,
        fallback_time: Option<DateTime<Utc>>,
    ) -> Result<PartialLiquidation, DataError> {
        const EXCHANGE: ExchangeId = ExchangeId::Bybit;

        let symbol = required(EXCHANGE, "s", self.symbol)?;
        let side = required(EXCHANGE, "S", self.side)?;
        let volume = required(EXCHANGE, "v", self.volume)?;
        let price = required(EXCHANGE, "p", self.price)?;

        let side = side.parse::<Side>().map_err(|_| DataError::InvalidField {
            exchange: EXCHANGE,
            field: "S",
            value: side.clone(),
        })?;

        let time = match text(self.time) {
            Some(time) => parse_epoch_ms(&time).ok_or(DataError::InvalidField {
                exchange: EXCHANGE,
                field: "T",
                value: time,
            })?,
            None => fallback_time.ok_or(DataError::MissingField {
                exchange: EXCHANGE,
                field: "T",
            })?,
        };

        Ok(PartialLiquidation {
            symbol: SmolStr::new(symbol),
            side,
            order_type: SmolStr::new_static(BYBIT_ORDER_TYPE),
            quantity: parse_decimal_field(EXCHANGE, "v", &volume)?,
            price: parse_decimal_field(EXCHANGE, "p", &price)?,
            order_status: SmolStr::new_static(BYBIT_ORDER_STATUS),
            time,
        })
    }
}

/// Textual content of a string or number field. Empty strings count as absent.
fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(value) if !value.trim().is_empty() => Some(value),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

fn required(
    exchange: ExchangeId,
    field: &'static str,
    value: Option<Value>,
) -> Result<String, DataError> {
    text(value).ok_or(DataError::MissingField { exchange, field })
}
