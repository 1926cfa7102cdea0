use self::{channel::BybitChannel, liquidation::BybitLiquidationMessage};
use super::{Connector, ControlFrame, Decoded, PingInterval, WsMessage, from_json};
use crate::{error::DataError, event::ExchangeId, subscription::Subscription};
use itertools::Itertools;
use serde_json::json;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Defines the [`BybitChannel`] used to generate [`Connector::requests`].
pub mod channel;

/// Liquidation types for [`Bybit`].
pub mod liquidation;

/// [`Bybit`] linear perpetuals server base url.
///
/// See docs: <https://bybit-exchange.github.io/docs/v5/ws/connect>
pub const BASE_URL_BYBIT_PERPETUALS_USD: &str = "wss://stream.bybit.com/v5/public/linear";

/// [`Bybit`] server [`PingInterval`] duration.
///
/// See docs: <https://bybit-exchange.github.io/docs/v5/ws/connect#how-to-send-the-heartbeat-packet>
pub const PING_INTERVAL_BYBIT: Duration = Duration::from_secs(20);

/// Maximum number of topics sent in one subscribe request.
pub const MAX_TOPICS_PER_REQUEST: usize = 10;

/// [`Bybit`] linear perpetuals exchange.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Bybit;

impl Connector for Bybit {
    const ID: ExchangeId = ExchangeId::Bybit;

    fn url(_: &Subscription) -> Result<Url, DataError> {
        Url::parse(BASE_URL_BYBIT_PERPETUALS_USD).map_err(DataError::from)
    }

    fn ping_interval() -> Option<PingInterval> {
        Some(PingInterval {
            interval: PING_INTERVAL_BYBIT,
            ping: || WsMessage::text(json!({ "op": "ping" }).to_string()),
        })
    }

    fn requests(subscription: &Subscription) -> Vec<WsMessage> {
        subscription
            .symbols()
            .map(|symbol| BybitChannel::ALL_LIQUIDATION.topic(symbol))
            .chunks(MAX_TOPICS_PER_REQUEST)
            .into_iter()
            .map(|topics| {
                WsMessage::text(
                    json!({
                        "op": "subscribe",
                        "args": topics.collect_vec(),
                    })
                    .to_string(),
                )
            })
            .collect()
    }

    fn decode(payload: &str) -> Result<Decoded, DataError> {
        match from_json::<BybitLiquidationMessage>(Self::ID, payload)? {
            BybitLiquidationMessage::Response(response) => {
                Ok(Decoded::Control(response.into_control_frame()))
            }
            BybitLiquidationMessage::Payload(payload)
                if BybitChannel::ALL_LIQUIDATION.matches(&payload.topic) =>
            {
                Ok(Decoded::Liquidations(payload.into_partials()))
            }
            BybitLiquidationMessage::Payload(payload) => {
                warn!(exchange = %Self::ID, topic = %payload.topic, "unexpected topic");
                Ok(Decoded::Control(ControlFrame::Other(payload.topic)))
            }
        }
    }
}
