use crate::{
    de::{de_decimal, de_epoch_ms_as_datetime_utc, de_side},
    event::Side,
    normalise::PartialLiquidation,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use smol_str::SmolStr;

/// Messages received on a [`Binance`](super::Binance) force order stream.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
#[serde(untagged)]
pub enum BinanceLiquidationMessage {
    ForceOrder(BinanceForceOrder),
    /// Response to a `SUBSCRIBE` request, `result` is null on success.
    SubscriptionResponse {
        result: Option<serde_json::Value>,
        id: u64,
    },
}

/// [`Binance`](super::Binance) liquidation order envelope.
///
/// ### Raw Payload Examples
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/websocket-market-streams/Liquidation-Order-Streams>
/// ```json
/// {
///     "e": "forceOrder",
///     "E": 1700000000010,
///     "o": {
///         "s": "BTCUSDT",
///         "S": "SELL",
///         "o": "LIMIT",
///         "f": "IOC",
///         "q": "0.5",
///         "p": "59800",
///         "ap": "60000",
///         "X": "FILLED",
///         "l": "0.5",
///         "z": "0.5",
///         "T": 1700000000000
///     }
/// }
/// ```
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct BinanceForceOrder {
    #[serde(rename = "o")]
    pub order: BinanceLiquidationOrder,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct BinanceLiquidationOrder {
    #[serde(rename = "s")]
    pub symbol: SmolStr,

    #[serde(rename = "S", deserialize_with = "de_side")]
    pub side: Side,

    #[serde(rename = "o")]
    pub order_type: SmolStr,

    #[serde(rename = "q", deserialize_with = "de_decimal")]
    pub quantity: Decimal,

    #[serde(rename = "ap", deserialize_with = "de_decimal")]
    pub average_price: Decimal,

    #[serde(rename = "X")]
    pub status: SmolStr,

    #[serde(rename = "T", deserialize_with = "de_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,
}

impl From<BinanceLiquidationOrder> for PartialLiquidation {
    fn from(order: BinanceLiquidationOrder) -> Self {
        Self {
            symbol: order.symbol,
            side: order.side,
            order_type: order.order_type,
            quantity: order.quantity,
            price: order.average_price,
            order_status: order.status,
            time: order.time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        exchange::{Binance, Connector, Decoded},
        normalise::Normaliser,
        event::ExchangeId,
    };
    use rust_decimal_macros::dec;

    #[test]
    fn test_binance_force_order() {
        struct TestCase {
            input: &'static str,
            expected: Option<(Side, Decimal, Decimal, i64)>,
        }

        let tests = vec![
            TestCase {
                // TC0: input BinanceForceOrder is deserialised
                input: r#"
                    {
                        "e": "forceOrder",
                        "E": 1700000000010,
                        "o": {
                            "s": "BTCUSDT", "S": "SELL", "o": "LIMIT", "f": "IOC",
                            "q": "0.5", "p": "59800", "ap": "60000", "X": "FILLED",
                            "l": "0.5", "z": "0.5", "T": 1700000000000
                        }
                    }
                "#,
                expected: Some((Side::Sell, dec!(0.5), dec!(60000), 1700000000000)),
            },
            TestCase {
                // TC1: input BinanceForceOrder w/ string timestamp is deserialised
                input: r#"
                    {
                        "o": {
                            "s": "ETHUSDT", "S": "BUY", "o": "LIMIT",
                            "q": "2", "ap": "3000.5", "X": "FILLED", "T": "1700000000001"
                        }
                    }
                "#,
                expected: Some((Side::Buy, dec!(2), dec!(3000.5), 1700000000001)),
            },
            TestCase {
                // TC2: input BinanceForceOrder w/ unparseable quantity is rejected
                input: r#"
                    {
                        "o": {
                            "s": "ETHUSDT", "S": "BUY", "o": "LIMIT",
                            "q": "two", "ap": "3000.5", "X": "FILLED", "T": 1700000000001
                        }
                    }
                "#,
                expected: None,
            },
            TestCase {
                // TC3: input BinanceForceOrder w/ missing average price is rejected
                input: r#"
                    {
                        "o": {
                            "s": "ETHUSDT", "S": "BUY", "o": "LIMIT",
                            "q": "2", "X": "FILLED", "T": 1700000000001
                        }
                    }
                "#,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = match Binance::decode(test.input) {
                Ok(Decoded::Liquidations(mut liquidations)) => {
                    assert_eq!(liquidations.len(), 1, "TC{} failed", index);
                    let liquidation = liquidations.remove(0);
                    Some((
                        liquidation.side,
                        liquidation.quantity,
                        liquidation.price,
                        liquidation.time.timestamp_millis(),
                    ))
                }
                Ok(other) => panic!("TC{index} failed: unexpected {other:?}"),
                Err(_) => None,
            };
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_binance_force_order_normalises_to_canonical_event() {
        let input = r#"{"o":{"s":"BTCUSDT","S":"SELL","o":"LIMIT","q":"0.5","ap":"60000","X":"FILLED","T":1700000000000}}"#;

        let Decoded::Liquidations(mut liquidations) = Binance::decode(input).unwrap() else {
            panic!("expected liquidations");
        };
        let event = Normaliser::default()
            .normalise(ExchangeId::Binance, liquidations.remove(0))
            .unwrap();

        assert_eq!(event.exchange(), ExchangeId::Binance);
        assert_eq!(event.symbol(), "BTCUSDT");
        assert_eq!(event.side(), Side::Sell);
        assert_eq!(event.order_type(), "LIMIT");
        assert_eq!(event.quantity(), dec!(0.5));
        assert_eq!(event.price(), dec!(60000));
        assert_eq!(event.order_status(), "FILLED");
        assert_eq!(event.value(), dec!(30000));
        assert_eq!(event.time().timestamp_millis(), 1700000000000);
    }
}
