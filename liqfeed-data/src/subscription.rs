use crate::{error::DataError, event::ExchangeId};
use smol_str::{SmolStr, StrExt};
use std::collections::BTreeSet;

/// Liquidation feed subscription for one exchange.
///
/// Symbols are venue native (eg/ "BTCUSDT" for Binance & Bybit, "BTC-USDT-SWAP" for OKX). An
/// empty symbol set subscribes to every market the exchange publishes liquidations for, where
/// the exchange supports it.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Subscription {
    pub exchange: ExchangeId,
    symbols: BTreeSet<SmolStr>,
}

impl Subscription {
    pub fn new<I, S>(exchange: ExchangeId, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            exchange,
            symbols: symbols
                .into_iter()
                .map(|symbol| symbol.as_ref().trim().to_uppercase_smolstr())
                .filter(|symbol| !symbol.is_empty())
                .collect(),
        }
    }

    /// Subscribe to every market of the provided exchange.
    pub fn all_markets(exchange: ExchangeId) -> Self {
        Self {
            exchange,
            symbols: BTreeSet::new(),
        }
    }

    pub fn symbols(&self) -> impl Iterator<Item = &SmolStr> {
        self.symbols.iter()
    }

    pub fn is_all_markets(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Determine if a liquidation for the provided symbol belongs to this [`Subscription`].
    pub fn accepts(&self, symbol: &str) -> bool {
        self.is_all_markets() || self.symbols.contains(symbol)
    }

    /// Bybit has no all-market liquidation topic, so it needs at least one symbol.
    pub fn validate(&self) -> Result<(), DataError> {
        match self.exchange {
            ExchangeId::Bybit if self.is_all_markets() => Err(DataError::SubscriptionsEmpty {
                exchange: self.exchange,
            }),
            _ => Ok(()),
        }
    }
}
