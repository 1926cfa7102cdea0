use crate::{
    achievement::{
        AchievementId, Achievements, BALANCED_VIEW_COUNT, FIRST_MILLION_TOTAL, WHALE_HUNTER_VALUE,
    },
    filter::LiquidationFilter,
    streak::Streak,
    whale::{WhaleConfig, WhaleWatch},
};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use liqfeed_data::{LiquidationEvent, Side};
use rust_decimal::Decimal;
use serde::Serialize;
use smol_str::SmolStr;
use std::collections::VecDeque;

/// Default number of events retained in [`AggregateState`] history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Lifetime buy & sell liquidation counts. Independent of history truncation.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Serialize)]
pub struct Counters {
    pub buy_count: u64,
    pub sell_count: u64,
}

impl Counters {
    pub fn record(&mut self, side: Side) {
        match side {
            Side::Buy => self.buy_count = self.buy_count.saturating_add(1),
            Side::Sell => self.sell_count = self.sell_count.saturating_add(1),
        }
    }

    pub fn total(&self) -> u64 {
        self.buy_count.saturating_add(self.sell_count)
    }

    /// Share of buy liquidations in `[0, 1]`, or 0.5 before any event.
    pub fn buy_ratio(&self) -> f64 {
        match self.total() {
            0 => 0.5,
            total => self.buy_count as f64 / total as f64,
        }
    }

    fn is_balanced(&self) -> bool {
        self.buy_count == self.sell_count && self.buy_count >= BALANCED_VIEW_COUNT
    }
}

/// What changed when one event was applied to the [`AggregateState`].
#[derive(Clone, PartialEq, Debug)]
pub struct Update {
    pub event: LiquidationEvent,
    /// Oldest event evicted from history to make room, if any.
    pub evicted: Option<LiquidationEvent>,
    pub total_value: Decimal,
    pub new_high_score: bool,
    pub new_largest: bool,
    pub streak_days: u32,
    pub unlocked: Vec<AchievementId>,
    pub whale: bool,
}

/// Aggregate statistics over every liquidation event seen by the process.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct AggregateState {
    capacity: usize,
    /// Most recent events, oldest first.
    history: VecDeque<LiquidationEvent>,
    total_value: Decimal,
    high_score: Decimal,
    counters: Counters,
    largest: Option<LiquidationEvent>,
    streak: Streak,
    achievements: Achievements,
    whales: WhaleWatch,
}

impl Default for AggregateState {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl AggregateState {
    /// Construct an empty [`AggregateState`] retaining at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            history: VecDeque::with_capacity(capacity),
            total_value: Decimal::ZERO,
            high_score: Decimal::ZERO,
            counters: Counters::default(),
            largest: None,
            streak: Streak::default(),
            achievements: Achievements::default(),
            whales: WhaleWatch::default(),
        }
    }

    pub fn with_whale_config(mut self, config: WhaleConfig) -> Self {
        self.whales = WhaleWatch::new(config);
        self
    }

    /// Apply one event. Every field is updated before this returns, so observers never see a
    /// partially applied event.
    pub fn apply(&mut self, event: &LiquidationEvent) -> Update {
        let value = event.value();
        let time = event.time();

        // History, FIFO by arrival
        self.history.push_back(event.clone());
        let evicted = if self.history.len() > self.capacity {
            self.history.pop_front()
        } else {
            None
        };

        // Totals
        self.total_value = self.total_value.saturating_add(value);
        let new_high_score = self.total_value > self.high_score;
        if new_high_score {
            self.high_score = self.total_value;
        }

        self.counters.record(event.side());

        // Largest, first seen wins ties
        let new_largest = self
            .largest
            .as_ref()
            .is_none_or(|largest| value > largest.value());
        if new_largest {
            self.largest = Some(event.clone());
        }

        self.streak.record(time);

        // Achievements
        let mut unlocked = Vec::new();
        let candidates = [
            (
                AchievementId::FirstMillion,
                self.total_value >= FIRST_MILLION_TOTAL,
            ),
            (AchievementId::WhaleHunter, value >= WHALE_HUNTER_VALUE),
            // Counters already include this event, so the SELL that brings 9/9 + BUY to
            // 10/10 is the one that unlocks
            (AchievementId::BalancedView, self.counters.is_balanced()),
        ];
        for (id, condition) in candidates {
            if condition && self.achievements.unlock(id, time) {
                unlocked.push(id);
            }
        }

        let whale = self.whales.record(event);

        Update {
            event: event.clone(),
            evicted,
            total_value: self.total_value,
            new_high_score,
            new_largest,
            streak_days: self.streak.days(),
            unlocked,
            whale,
        }
    }

    /// Drop whales outside the retention window as of `now`, returning `true` if any were
    /// removed.
    pub fn prune_whales(&mut self, now: DateTime<Utc>) -> bool {
        self.whales.prune(now)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Retained events in arrival order, oldest first.
    pub fn history(
        &self,
    ) -> impl DoubleEndedIterator<Item = &LiquidationEvent> + ExactSizeIterator {
        self.history.iter()
    }

    /// Retained events matching the [`LiquidationFilter`], newest first.
    pub fn filtered<'a>(
        &'a self,
        filter: &'a LiquidationFilter,
    ) -> impl Iterator<Item = &'a LiquidationEvent> + 'a {
        self.history
            .iter()
            .rev()
            .filter(move |event| filter.matches(event))
    }

    /// Sorted unique symbols present in history.
    pub fn available_symbols(&self) -> Vec<SmolStr> {
        self.history
            .iter()
            .map(|event| event.symbol().clone())
            .sorted()
            .dedup()
            .collect()
    }

    pub fn total_value(&self) -> Decimal {
        self.total_value
    }

    pub fn high_score(&self) -> Decimal {
        self.high_score
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn largest(&self) -> Option<&LiquidationEvent> {
        self.largest.as_ref()
    }

    pub fn streak(&self) -> Streak {
        self.streak
    }

    pub fn achievements(&self) -> &Achievements {
        &self.achievements
    }

    pub fn whales(&self) -> &WhaleWatch {
        &self.whales
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use liqfeed_data::ExchangeId;
    use rust_decimal_macros::dec;

    fn event(side: Side, quantity: Decimal, price: Decimal, minutes: i64) -> LiquidationEvent {
        LiquidationEvent::new(
            ExchangeId::Binance,
            SmolStr::new_static("BTCUSDT"),
            side,
            SmolStr::new_static("LIMIT"),
            quantity,
            price,
            SmolStr::new_static("FILLED"),
            DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap()
                + TimeDelta::minutes(minutes),
        )
        .unwrap()
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = AggregateState::default();

        assert_eq!(state.capacity(), DEFAULT_HISTORY_CAPACITY);
        assert_eq!(state.history().len(), 0);
        assert_eq!(state.total_value(), Decimal::ZERO);
        assert_eq!(state.high_score(), Decimal::ZERO);
        assert_eq!(state.counters(), Counters::default());
        assert_eq!(state.largest(), None);
        assert_eq!(state.streak().days(), 0);
        assert_eq!(state.achievements().unlocked_count(), 0);
        assert!(state.whales().is_empty());
    }

    #[test]
    fn test_apply_updates_totals_counters_and_largest() {
        let mut state = AggregateState::new(2);

        let first = event(Side::Sell, dec!(0.5), dec!(60000), 0);
        let update = state.apply(&first);
        assert_eq!(update.total_value, dec!(30000));
        assert!(update.new_high_score);
        assert!(update.new_largest);
        assert_eq!(update.streak_days, 1);
        assert_eq!(update.evicted, None);

        // Equal value does not displace the first-seen largest
        let tie = event(Side::Buy, dec!(1), dec!(30000), 1);
        let update = state.apply(&tie);
        assert!(!update.new_largest);
        assert_eq!(state.largest(), Some(&first));

        let bigger = event(Side::Buy, dec!(1), dec!(40000), 2);
        let update = state.apply(&bigger);
        assert!(update.new_largest);
        assert_eq!(update.evicted, Some(first));
        assert_eq!(state.total_value(), dec!(100000));
        assert_eq!(
            state.counters(),
            Counters {
                buy_count: 2,
                sell_count: 1
            }
        );
        assert_eq!(state.history().collect::<Vec<_>>(), vec![&tie, &bigger]);
    }

    #[test]
    fn test_counters_buy_ratio() {
        struct TestCase {
            input: Counters,
            expected: f64,
        }

        let tests = vec![
            TestCase {
                // TC0: no events is balanced
                input: Counters::default(),
                expected: 0.5,
            },
            TestCase {
                // TC1: only buys
                input: Counters {
                    buy_count: 4,
                    sell_count: 0,
                },
                expected: 1.0,
            },
            TestCase {
                // TC2: one buy in four
                input: Counters {
                    buy_count: 1,
                    sell_count: 3,
                },
                expected: 0.25,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.input.buy_ratio(), test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_first_million_unlocks_on_cumulative_total() {
        let mut state = AggregateState::default();

        for minute in 0..9 {
            let update = state.apply(&event(Side::Sell, dec!(1), dec!(99999), minute));
            assert!(update.unlocked.is_empty());
        }

        let update = state.apply(&event(Side::Sell, dec!(1), dec!(99999), 9));
        assert!(update.unlocked.is_empty());

        let crossing = event(Side::Sell, dec!(1), dec!(10), 10);
        let update = state.apply(&crossing);
        assert_eq!(update.unlocked, vec![AchievementId::FirstMillion]);
        assert_eq!(
            state.achievements().unlocked_at(AchievementId::FirstMillion),
            Some(crossing.time())
        );
    }

    #[test]
    fn test_filtered_and_available_symbols() {
        let mut state = AggregateState::default();
        let symbols = ["ETHUSDT", "BTCUSDT", "ETHUSDT", "SOLUSDT"];

        for (minute, symbol) in symbols.into_iter().enumerate() {
            let event = LiquidationEvent::new(
                ExchangeId::Bybit,
                SmolStr::new(symbol),
                Side::Buy,
                SmolStr::new_static("LIMIT"),
                dec!(1),
                Decimal::from(100 * (minute + 1)),
                SmolStr::new_static("FILLED"),
                DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap(),
            )
            .unwrap();
            state.apply(&event);
        }

        assert_eq!(
            state.available_symbols(),
            vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]
        );

        let filter = LiquidationFilter::default().with_symbols(["ETHUSDT"]);
        let values = state
            .filtered(&filter)
            .map(|event| event.value())
            .collect::<Vec<_>>();
        assert_eq!(values, vec![dec!(300), dec!(100)]);
    }
}
