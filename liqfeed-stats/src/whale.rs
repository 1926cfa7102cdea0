use chrono::{DateTime, TimeDelta, Utc};
use liqfeed_data::LiquidationEvent;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::VecDeque;

/// Default notional at or above which a liquidation is a whale.
pub const DEFAULT_WHALE_THRESHOLD: Decimal = dec!(250000);

/// Default time a whale stays in the [`WhaleWatch`].
pub const DEFAULT_WHALE_RETENTION: TimeDelta = TimeDelta::minutes(60);

/// Maximum number of whales retained.
pub const MAX_WHALES: usize = 100;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct WhaleConfig {
    pub threshold: Decimal,
    pub retention: TimeDelta,
    pub capacity: usize,
}

impl Default for WhaleConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_WHALE_THRESHOLD,
            retention: DEFAULT_WHALE_RETENTION,
            capacity: MAX_WHALES,
        }
    }
}

impl WhaleConfig {
    pub fn with_threshold(mut self, threshold: Decimal) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_retention(mut self, retention: TimeDelta) -> Self {
        self.retention = retention;
        self
    }
}

/// Recent large liquidations, newest first, de-duplicated by `(time, symbol, value)`.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct WhaleWatch {
    #[serde(skip)]
    config: WhaleConfig,
    whales: VecDeque<LiquidationEvent>,
}

impl Default for WhaleWatch {
    fn default() -> Self {
        Self::new(WhaleConfig::default())
    }
}

impl WhaleWatch {
    pub fn new(config: WhaleConfig) -> Self {
        Self {
            config,
            whales: VecDeque::with_capacity(config.capacity),
        }
    }

    pub fn config(&self) -> &WhaleConfig {
        &self.config
    }

    pub fn is_whale(&self, event: &LiquidationEvent) -> bool {
        event.value() >= self.config.threshold
    }

    /// Record the event if it is a whale, then prune relative to the event instant.
    ///
    /// Returns `true` if the event was added.
    pub fn record(&mut self, event: &LiquidationEvent) -> bool {
        let added = self.is_whale(event) && !self.contains(event);

        if added {
            self.whales.push_front(event.clone());
            self.whales.truncate(self.config.capacity);
        }

        self.prune(event.time());
        added
    }

    /// Drop whales older than the retention window as of `now`, returning `true` if any were
    /// removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.config.retention;
        let before = self.whales.len();
        self.whales.retain(|whale| whale.time() >= cutoff);
        before != self.whales.len()
    }

    /// Whales, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LiquidationEvent> {
        self.whales.iter()
    }

    pub fn len(&self) -> usize {
        self.whales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.whales.is_empty()
    }

    fn contains(&self, event: &LiquidationEvent) -> bool {
        self.whales.iter().any(|whale| {
            whale.time() == event.time()
                && whale.symbol() == event.symbol()
                && whale.value() == event.value()
        })
    }
}
