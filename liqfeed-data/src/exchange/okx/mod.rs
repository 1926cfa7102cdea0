use self::{channel::OkxChannel, liquidation::OkxLiquidationMessage};
use super::{Connector, ControlFrame, Decoded, PingInterval, WsMessage, from_json};
use crate::{error::DataError, event::ExchangeId, subscription::Subscription};
use serde_json::json;
use std::time::Duration;
use url::Url;

/// Defines the [`OkxChannel`] used to generate [`Connector::requests`].
pub mod channel;

/// Liquidation types for [`Okx`].
pub mod liquidation;

/// [`Okx`] server base url.
///
/// See docs: <https://www.okx.com/docs-v5/en/#overview-api-resources-and-support>
pub const BASE_URL_OKX: &str = "wss://ws.okx.com:8443/ws/v5/public";

/// [`Okx`] server [`PingInterval`] duration. OKX drops connections idle for 30s.
///
/// See docs: <https://www.okx.com/docs-v5/en/#websocket-api-connect>
pub const PING_INTERVAL_OKX: Duration = Duration::from_secs(25);

/// Instrument type liquidation orders are subscribed for.
pub const OKX_INST_TYPE: &str = "SWAP";

/// Literal text frame OKX replies to a `ping` with, outside of JSON framing.
pub const OKX_PONG: &str = "pong";

/// [`Okx`] exchange.
///
/// See docs: <https://www.okx.com/docs-v5/en/#websocket-api>
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Okx;

impl Connector for Okx {
    const ID: ExchangeId = ExchangeId::Okx;

    fn url(_: &Subscription) -> Result<Url, DataError> {
        Url::parse(BASE_URL_OKX).map_err(DataError::from)
    }

    fn ping_interval() -> Option<PingInterval> {
        Some(PingInterval {
            interval: PING_INTERVAL_OKX,
            ping: || WsMessage::text("ping"),
        })
    }

    /// Liquidation orders are subscribed per instrument type rather than per instrument, so
    /// symbol filtering happens after decoding.
    fn requests(_: &Subscription) -> Vec<WsMessage> {
        vec![WsMessage::text(
            json!({
                "op": "subscribe",
                "args": [{
                    "channel": OkxChannel::LIQUIDATION_ORDERS.as_ref(),
                    "instType": OKX_INST_TYPE,
                }],
            })
            .to_string(),
        )]
    }

    fn decode(payload: &str) -> Result<Decoded, DataError> {
        if payload.trim() == OKX_PONG {
            return Ok(Decoded::Control(ControlFrame::Pong));
        }

        match from_json::<OkxLiquidationMessage>(Self::ID, payload)? {
            OkxLiquidationMessage::Event(event) => Ok(Decoded::Control(event.into_control_frame())),
            OkxLiquidationMessage::Payload(payload)
                if payload.arg.channel == OkxChannel::LIQUIDATION_ORDERS.as_ref() =>
            {
                Ok(Decoded::Liquidations(payload.into_partials()))
            }
            OkxLiquidationMessage::Payload(payload) => {
                Ok(Decoded::Control(ControlFrame::Other(payload.arg.channel)))
            }
        }
    }
}
