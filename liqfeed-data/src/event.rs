use crate::error::DataError;
use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::str::FromStr;

/// Unique identifier for an exchange a liquidation feed can be consumed from.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExchangeId {
    #[display("BINANCE")]
    Binance,
    #[display("BYBIT")]
    Bybit,
    #[display("OKX")]
    Okx,
}

impl ExchangeId {
    /// Every supported [`ExchangeId`], in display order.
    pub const ALL: [ExchangeId; 3] = [ExchangeId::Binance, ExchangeId::Bybit, ExchangeId::Okx];
}

impl FromStr for ExchangeId {
    type Err = DataError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        ExchangeId::ALL
            .into_iter()
            .find(|exchange| input.trim().eq_ignore_ascii_case(&exchange.to_string()))
            .ok_or_else(|| DataError::UnsupportedExchange(input.to_string()))
    }
}

/// Side of the order an exchange places to force-close a position.
///
/// A liquidated long position is closed with a [`Side::Sell`], a liquidated short with a
/// [`Side::Buy`].
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    #[display("BUY")]
    Buy,
    #[display("SELL")]
    Sell,
}

impl Side {
    /// Return the opposite [`Side`].
    pub fn invert(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, Side::Sell)
    }
}

impl FromStr for Side {
    type Err = DataError;

    /// Exchanges disagree on casing ("SELL", "Sell", "sell"), so matching is case-insensitive.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.eq_ignore_ascii_case("buy") {
            Ok(Side::Buy)
        } else if input.eq_ignore_ascii_case("sell") {
            Ok(Side::Sell)
        } else {
            Err(DataError::UnsupportedSide(input.to_string()))
        }
    }
}

/// Normalised liquidation event.
///
/// Immutable once constructed. `value` is always `quantity * price`, computed here and never
/// taken from an upstream payload.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct LiquidationEvent {
    exchange: ExchangeId,
    symbol: SmolStr,
    side: Side,
    order_type: SmolStr,
    quantity: Decimal,
    price: Decimal,
    order_status: SmolStr,
    time: DateTime<Utc>,
    value: Decimal,
}

impl LiquidationEvent {
    /// Construct a new [`LiquidationEvent`], deriving `value` from `quantity * price`.
    ///
    /// Fails if `price` is not positive, `quantity` is negative, or the notional value does not
    /// fit in a [`Decimal`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exchange: ExchangeId,
        symbol: SmolStr,
        side: Side,
        order_type: SmolStr,
        quantity: Decimal,
        price: Decimal,
        order_status: SmolStr,
        time: DateTime<Utc>,
    ) -> Result<Self, DataError> {
        if price <= Decimal::ZERO {
            return Err(DataError::InvalidField {
                exchange,
                field: "price",
                value: price.to_string(),
            });
        }
        if quantity.is_sign_negative() && !quantity.is_zero() {
            return Err(DataError::InvalidField {
                exchange,
                field: "quantity",
                value: quantity.to_string(),
            });
        }

        let value = quantity
            .checked_mul(price)
            .ok_or(DataError::ValueOverflow { exchange, quantity, price })?;

        Ok(Self {
            exchange,
            symbol,
            side,
            order_type,
            quantity,
            price,
            order_status,
            time,
            value,
        })
    }

    pub fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    pub fn symbol(&self) -> &SmolStr {
        &self.symbol
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn order_type(&self) -> &SmolStr {
        &self.order_type
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn order_status(&self) -> &SmolStr {
        &self.order_status
    }

    /// Time the exchange recorded the liquidation.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Notional value of the liquidation (`quantity * price`).
    pub fn value(&self) -> Decimal {
        self.value
    }
}
