use self::liquidation::BinanceLiquidationMessage;
use super::{Connector, ControlFrame, Decoded, PingInterval, WsMessage, from_json};
use crate::{error::DataError, event::ExchangeId, subscription::Subscription};
use itertools::Itertools;
use serde_json::json;
use std::time::Duration;
use url::Url;

/// Liquidation (force order) types for [`Binance`].
pub mod liquidation;

/// [`Binance`] USD-M futures WebSocket base url.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/websocket-market-streams>
pub const BASE_URL_BINANCE_FUTURES_USD: &str = "wss://fstream.binance.com/ws";

/// [`Binance`] stream carrying every market's liquidation orders.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/websocket-market-streams/All-Market-Liquidation-Order-Streams>
pub const ALL_MARKET_FORCE_ORDER_STREAM: &str = "!forceOrder@arr";

/// [`Binance`] keepalive [`PingInterval`] duration.
///
/// Binance pings the client only every 3 minutes, and a quiet liquidation stream can go longer
/// than the read timeout without a frame. A transport `Ping` every 30s draws a `Pong` that
/// keeps the idle watchdog satisfied.
///
/// See docs: <https://developers.binance.com/docs/derivatives/usds-margined-futures/websocket-market-streams>
pub const PING_INTERVAL_BINANCE: Duration = Duration::from_secs(30);

/// [`Binance`] USD-M futures exchange.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Binance;

impl Binance {
    /// Per symbol force order stream name, eg/ "btcusdt@forceOrder".
    pub fn force_order_stream(symbol: &str) -> String {
        format!("{}@forceOrder", symbol.to_lowercase())
    }
}

impl Connector for Binance {
    const ID: ExchangeId = ExchangeId::Binance;

    fn url(subscription: &Subscription) -> Result<Url, DataError> {
        let url = if subscription.is_all_markets() {
            format!("{BASE_URL_BINANCE_FUTURES_USD}/{ALL_MARKET_FORCE_ORDER_STREAM}")
        } else {
            BASE_URL_BINANCE_FUTURES_USD.to_string()
        };

        Url::parse(&url).map_err(DataError::from)
    }

    fn ping_interval() -> Option<PingInterval> {
        Some(PingInterval {
            interval: PING_INTERVAL_BINANCE,
            ping: || WsMessage::Ping(Default::default()),
        })
    }

    fn requests(subscription: &Subscription) -> Vec<WsMessage> {
        if subscription.is_all_markets() {
            return vec![];
        }

        let params = subscription
            .symbols()
            .map(|symbol| Self::force_order_stream(symbol))
            .collect_vec();

        vec![WsMessage::text(
            json!({
                "method": "SUBSCRIBE",
                "params": params,
                "id": 1,
            })
            .to_string(),
        )]
    }

    fn decode(payload: &str) -> Result<Decoded, DataError> {
        match from_json::<BinanceLiquidationMessage>(Self::ID, payload)? {
            BinanceLiquidationMessage::SubscriptionResponse { result: None, .. } => {
                Ok(Decoded::Control(ControlFrame::SubscriptionAck))
            }
            BinanceLiquidationMessage::SubscriptionResponse {
                result: Some(result),
                ..
            } => Ok(Decoded::Control(ControlFrame::Rejected(result.to_string()))),
            BinanceLiquidationMessage::ForceOrder(force_order) => {
                Ok(Decoded::Liquidations(vec![force_order.order.into()]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binance_url_and_requests() {
        let all = Subscription::all_markets(ExchangeId::Binance);
        assert_eq!(
            Binance::url(&all).unwrap().as_str(),
            "wss://fstream.binance.com/ws/!forceOrder@arr"
        );
        assert!(Binance::requests(&all).is_empty());

        let symbols = Subscription::new(ExchangeId::Binance, ["BTCUSDT", "ETHUSDT"]);
        assert_eq!(
            Binance::url(&symbols).unwrap().as_str(),
            "wss://fstream.binance.com/ws"
        );

        let requests = Binance::requests(&symbols);
        assert_eq!(requests.len(), 1);
        let request: serde_json::Value =
            serde_json::from_str(requests[0].to_text().unwrap()).unwrap();
        assert_eq!(
            request,
            json!({
                "method": "SUBSCRIBE",
                "params": ["btcusdt@forceOrder", "ethusdt@forceOrder"],
                "id": 1,
            })
        );
    }

    #[test]
    fn test_binance_keepalive_is_transport_ping() {
        let ping = Binance::ping_interval().unwrap();
        assert_eq!(ping.interval, Duration::from_secs(30));
        assert!(matches!((ping.ping)(), WsMessage::Ping(payload) if payload.is_empty()));
    }

    #[test]
    fn test_binance_decode_subscription_response() {
        assert_eq!(
            Binance::decode(r#"{"result":null,"id":1}"#).unwrap(),
            Decoded::Control(ControlFrame::SubscriptionAck)
        );
        assert!(matches!(
            Binance::decode(r#"{"result":{"code":2},"id":1}"#).unwrap(),
            Decoded::Control(ControlFrame::Rejected(_))
        ));
    }
}
