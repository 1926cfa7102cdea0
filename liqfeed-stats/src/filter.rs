use liqfeed_data::LiquidationEvent;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use std::collections::BTreeSet;

/// Display filter applied to liquidation history.
///
/// An empty filter matches every event. Criteria combine with AND.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct LiquidationFilter {
    /// Only events for these symbols. Empty matches all symbols.
    pub symbols: BTreeSet<SmolStr>,
    /// Case-insensitive substring searched in the symbol, price and value.
    pub search: Option<String>,
    /// Only events with `value >= min_value`.
    pub min_value: Option<Decimal>,
}

impl LiquidationFilter {
    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into().trim().to_lowercase();
        self.search = (!search.is_empty()).then_some(search);
        self
    }

    pub fn with_min_value(mut self, min_value: Decimal) -> Self {
        self.min_value = Some(min_value);
        self
    }

    pub fn matches(&self, event: &LiquidationEvent) -> bool {
        if !self.symbols.is_empty() && !self.symbols.contains(event.symbol()) {
            return false;
        }

        if self
            .min_value
            .is_some_and(|min_value| event.value() < min_value)
        {
            return false;
        }

        match &self.search {
            None => true,
            Some(search) => {
                let search = search.to_lowercase();
                event.symbol().to_lowercase().contains(&search)
                    || event.price().to_string().contains(&search)
                    || event.value().to_string().contains(&search)
            }
        }
    }
}
