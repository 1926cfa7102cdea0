use crate::{
    de::{de_decimal, de_epoch_ms_as_datetime_utc},
    error::DataError,
    event::{ExchangeId, Side},
    exchange::ControlFrame,
    normalise::PartialLiquidation,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use smol_str::SmolStr;
use tracing::warn;

/// OKX does not publish an order type or status for liquidation orders.
const OKX_ORDER_TYPE: &str = "LIMIT";
const OKX_ORDER_STATUS: &str = "FILLED";

/// Messages received on the [`Okx`](super::Okx) liquidation orders channel.
#[derive(Clone, Debug)]
pub enum OkxLiquidationMessage {
    Event(OkxEvent),
    Payload(OkxLiquidations),
}

impl<'de> Deserialize<'de> for OkxLiquidationMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        if value.get("event").is_some_and(Value::is_string) {
            serde_json::from_value(value)
                .map(OkxLiquidationMessage::Event)
                .map_err(serde::de::Error::custom)
        } else if value.get("arg").is_some() && value.get("data").is_some() {
            serde_json::from_value(value)
                .map(OkxLiquidationMessage::Payload)
                .map_err(serde::de::Error::custom)
        } else {
            Err(serde::de::Error::custom(
                "expected Okx event or arg/data payload",
            ))
        }
    }
}

/// [`Okx`](super::Okx) operation event, eg/ subscription confirmation or error.
///
/// ### Raw Payload Examples
/// ```json
/// {"event":"subscribe","arg":{"channel":"liquidation-orders","instType":"SWAP"},"connId":"a4d3ae55"}
/// {"event":"error","code":"60012","msg":"Invalid request","connId":"a4d3ae55"}
/// ```
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct OkxEvent {
    pub event: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl OkxEvent {
    pub fn into_control_frame(self) -> ControlFrame {
        match self.event.as_str() {
            "subscribe" => ControlFrame::SubscriptionAck,
            "error" => ControlFrame::Rejected(format!(
                "{}: {}",
                self.code.unwrap_or_default(),
                self.msg.unwrap_or_default()
            )),
            _ => ControlFrame::Other(self.event),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxArg {
    pub channel: String,
    #[serde(default)]
    pub inst_type: Option<String>,
}

/// [`Okx`](super::Okx) liquidation orders WebSocket message.
///
/// ### Raw Payload Examples
/// See docs: <https://www.okx.com/docs-v5/en/#websocket-api-public-channel-liquidation-orders-channel>
/// ```json
/// {
///     "arg": {"channel": "liquidation-orders", "instType": "SWAP"},
///     "data": [{
///         "instId": "BTC-USDT-SWAP",
///         "instFamily": "BTC-USDT",
///         "instType": "SWAP",
///         "uly": "BTC-USDT",
///         "details": [{
///             "bkLoss": "0", "bkPx": "41870.8", "ccy": "", "posSide": "short",
///             "side": "buy", "sz": "161", "ts": "1703123456789"
///         }]
///     }]
/// }
/// ```
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct OkxLiquidations {
    pub arg: OkxArg,
    pub data: Vec<OkxLiquidation>,
}

impl OkxLiquidations {
    /// Flatten every instrument group's details into [`PartialLiquidation`]s, logging and
    /// discarding details whose side cannot be resolved.
    pub fn into_partials(self) -> Vec<PartialLiquidation> {
        self.data
            .into_iter()
            .flat_map(|liquidation| {
                let inst_id = liquidation.inst_id;
                liquidation
                    .details
                    .into_iter()
                    .filter_map(move |detail| match detail.into_partial(inst_id.clone()) {
                        Ok(partial) => Some(partial),
                        Err(error) => {
                            warn!(exchange = %ExchangeId::Okx, %error, "discarding malformed liquidation");
                            None
                        }
                    })
            })
            .collect()
    }
}

/// [`Okx`](super::Okx) liquidation orders for one instrument.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct OkxLiquidation {
    #[serde(rename = "instId")]
    pub inst_id: SmolStr,
    #[serde(default)]
    pub details: Vec<OkxLiquidationDetail>,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct OkxLiquidationDetail {
    /// Side of the liquidated position: "long", "short", or "net" in one-way mode.
    #[serde(rename = "posSide", default)]
    pub position_side: String,

    /// Side of the liquidation order, only consulted for "net" positions.
    #[serde(default)]
    pub side: Option<String>,

    #[serde(rename = "bkPx", deserialize_with = "de_decimal")]
    pub price: Decimal,

    #[serde(rename = "sz", deserialize_with = "de_decimal")]
    pub size: Decimal,

    #[serde(rename = "ts", deserialize_with = "de_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,
}

impl OkxLiquidationDetail {
    /// Side of the order that force-closes the position. A liquidated long is closed with a
    /// sell, a liquidated short with a buy.
    pub fn liquidating_side(&self) -> Result<Side, DataError> {
        match self.position_side.to_ascii_lowercase().as_str() {
            "long" => Ok(Side::Sell),
            "short" => Ok(Side::Buy),
            _ => {
                let side = self.side.as_deref().ok_or(DataError::MissingField {
                    exchange: ExchangeId::Okx,
                    field: "side",
                })?;
                side.parse().map_err(|_| DataError::InvalidField {
                    exchange: ExchangeId::Okx,
                    field: "side",
                    value: side.to_string(),
                })
            }
        }
    }

    pub fn into_partial(self, inst_id: SmolStr) -> Result<PartialLiquidation, DataError> {
        Ok(PartialLiquidation {
            symbol: inst_id,
            side: self.liquidating_side()?,
            order_type: SmolStr::new_static(OKX_ORDER_TYPE),
            quantity: self.size,
            price: self.price,
            order_status: SmolStr::new_static(OKX_ORDER_STATUS),
            time: self.time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        exchange::{Connector, Decoded, Okx},
        normalise::Normaliser,
    };
    use rust_decimal_macros::dec;

    fn frame(details: &str) -> String {
        format!(
            r#"{{
                "arg": {{"channel": "liquidation-orders", "instType": "SWAP"}},
                "data": [{{
                    "instId": "ETH-USDT-SWAP",
                    "instFamily": "ETH-USDT",
                    "instType": "SWAP",
                    "uly": "ETH-USDT",
                    "details": [{details}]
                }}]
            }}"#
        )
    }

    #[test]
    fn test_okx_liquidating_side() {
        struct TestCase {
            position_side: &'static str,
            side: Option<&'static str>,
            expected: Result<Side, ()>,
        }

        let tests = vec![
            TestCase {
                // TC0: liquidated long is a forced sell
                position_side: "long",
                side: Some("buy"),
                expected: Ok(Side::Sell),
            },
            TestCase {
                // TC1: liquidated short is a forced buy
                position_side: "short",
                side: Some("sell"),
                expected: Ok(Side::Buy),
            },
            TestCase {
                // TC2: net position falls back to order side
                position_side: "net",
                side: Some("sell"),
                expected: Ok(Side::Sell),
            },
            TestCase {
                // TC3: net position w/o order side is rejected
                position_side: "net",
                side: None,
                expected: Err(()),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let detail = OkxLiquidationDetail {
                position_side: test.position_side.to_string(),
                side: test.side.map(str::to_string),
                price: dec!(3000),
                size: dec!(2),
                time: Utc::now(),
            };
            let actual = detail.liquidating_side().map_err(|_| ());
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_okx_long_liquidation_normalises_to_sell() {
        let input = frame(r#"{"posSide":"long","side":"sell","sz":"2","bkPx":"3000","bkLoss":"0","ts":"1700000000000"}"#);

        let Decoded::Liquidations(mut liquidations) = Okx::decode(&input).unwrap() else {
            panic!("expected liquidations");
        };
        assert_eq!(liquidations.len(), 1);

        let event = Normaliser::default()
            .normalise(ExchangeId::Okx, liquidations.remove(0))
            .unwrap();
        assert_eq!(event.exchange(), ExchangeId::Okx);
        assert_eq!(event.symbol(), "ETH-USDT-SWAP");
        assert_eq!(event.side(), Side::Sell);
        assert_eq!(event.value(), dec!(6000));
        assert_eq!(event.time().timestamp_millis(), 1700000000000);
    }

    #[test]
    fn test_okx_decode() {
        struct TestCase {
            input: String,
            expected: Result<usize, Option<ControlFrame>>,
        }

        let tests = vec![
            TestCase {
                // TC0: multiple details produce one liquidation each
                input: frame(
                    r#"{"posSide":"long","sz":"1","bkPx":"3000","ts":"1700000000000"},
                       {"posSide":"short","sz":"3","bkPx":"3001","ts":"1700000000001"}"#,
                ),
                expected: Ok(2),
            },
            TestCase {
                // TC1: detail w/ unresolvable side is dropped
                input: frame(r#"{"posSide":"net","sz":"1","bkPx":"3000","ts":"1700000000000"}"#),
                expected: Ok(0),
            },
            TestCase {
                // TC2: subscription confirmation
                input: r#"{"event":"subscribe","arg":{"channel":"liquidation-orders","instType":"SWAP"},"connId":"a4d3ae55"}"#.to_string(),
                expected: Err(Some(ControlFrame::SubscriptionAck)),
            },
            TestCase {
                // TC3: error event
                input: r#"{"event":"error","code":"60012","msg":"Invalid request","connId":"a4d3ae55"}"#.to_string(),
                expected: Err(Some(ControlFrame::Rejected("60012: Invalid request".to_string()))),
            },
            TestCase {
                // TC4: unparseable bankruptcy price discards the frame
                input: frame(r#"{"posSide":"long","sz":"1","bkPx":"n/a","ts":"1700000000000"}"#),
                expected: Err(None),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = match Okx::decode(&test.input) {
                Ok(Decoded::Liquidations(liquidations)) => Ok(liquidations.len()),
                Ok(Decoded::Control(control)) => Err(Some(control)),
                Err(_) => Err(None),
            };
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
