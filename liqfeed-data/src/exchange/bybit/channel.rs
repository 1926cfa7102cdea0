use serde::Serialize;

/// Type that defines a [`Bybit`](super::Bybit) channel to be subscribed to.
///
/// See docs: <https://bybit-exchange.github.io/docs/v5/ws/connect>
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct BybitChannel(pub &'static str);

impl BybitChannel {
    /// [`Bybit`](super::Bybit) stream emitting liquidation events for a symbol.
    ///
    /// See docs: <https://bybit-exchange.github.io/docs/v5/websocket/public/all-liquidation>
    pub const ALL_LIQUIDATION: Self = Self("allLiquidation");

    /// Topic for the provided symbol, eg/ "allLiquidation.BTCUSDT".
    pub fn topic(&self, symbol: &str) -> String {
        format!("{}.{symbol}", self.0)
    }

    /// Determine if a received topic belongs to this channel.
    pub fn matches(&self, topic: &str) -> bool {
        topic.contains(self.0)
    }
}

impl AsRef<str> for BybitChannel {
    fn as_ref(&self) -> &str {
        self.0
    }
}
