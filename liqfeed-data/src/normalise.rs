use crate::{
    error::DataError,
    event::{ExchangeId, LiquidationEvent, Side},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::str::FromStr;

/// Exchange agnostic liquidation record produced by an exchange decoder, before the
/// [`Normaliser`] resolves side semantics and derives the notional value.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct PartialLiquidation {
    pub symbol: SmolStr,
    /// Side exactly as the exchange decoder resolved it from the payload.
    pub side: Side,
    pub order_type: SmolStr,
    pub quantity: Decimal,
    pub price: Decimal,
    pub order_status: SmolStr,
    pub time: DateTime<Utc>,
}

/// How a reported side maps onto the side of the liquidating order.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideRule {
    /// Feed reports the liquidating order side.
    #[default]
    AsReported,
    /// Feed reports the liquidated position side, so BUY and SELL are swapped.
    Invert,
}

impl SideRule {
    pub fn apply(&self, side: Side) -> Side {
        match self {
            SideRule::AsReported => side,
            SideRule::Invert => side.invert(),
        }
    }
}

impl FromStr for SideRule {
    type Err = DataError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "as_reported" => Ok(SideRule::AsReported),
            "invert" => Ok(SideRule::Invert),
            _ => Err(DataError::UnsupportedSideRule(input.to_string())),
        }
    }
}

/// Converts [`PartialLiquidation`]s into canonical [`LiquidationEvent`]s.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Normaliser {
    bybit_side_rule: SideRule,
}

impl Default for Normaliser {
    /// Bybit v5 `allLiquidation` reports the side of the liquidated position, so the default
    /// inverts it.
    fn default() -> Self {
        Self {
            bybit_side_rule: SideRule::Invert,
        }
    }
}

impl Normaliser {
    pub fn new(bybit_side_rule: SideRule) -> Self {
        Self { bybit_side_rule }
    }

    /// Set the [`SideRule`] applied to Bybit liquidations.
    pub fn with_bybit_side_rule(mut self, rule: SideRule) -> Self {
        self.bybit_side_rule = rule;
        self
    }

    /// [`SideRule`] applied to liquidations originating from the provided exchange.
    ///
    /// Binance reports the liquidating order side and the OKX decoder already resolves it from
    /// `posSide`, so only Bybit is configurable.
    pub fn side_rule(&self, exchange: ExchangeId) -> SideRule {
        match exchange {
            ExchangeId::Binance | ExchangeId::Okx => SideRule::AsReported,
            ExchangeId::Bybit => self.bybit_side_rule,
        }
    }

    /// Tag the [`PartialLiquidation`] with its exchange, resolve the side and derive `value`.
    ///
    /// Decoders only emit records that satisfy [`LiquidationEvent::new`], so an error here
    /// indicates a decoder defect rather than a bad payload.
    pub fn normalise(
        &self,
        exchange: ExchangeId,
        partial: PartialLiquidation,
    ) -> Result<LiquidationEvent, DataError> {
        let PartialLiquidation {
            symbol,
            side,
            order_type,
            quantity,
            price,
            order_status,
            time,
        } = partial;

        LiquidationEvent::new(
            exchange,
            symbol,
            self.side_rule(exchange).apply(side),
            order_type,
            quantity,
            price,
            order_status,
            time,
        )
    }
}
