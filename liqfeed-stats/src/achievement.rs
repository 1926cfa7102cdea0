use chrono::{DateTime, Utc};
use derive_more::Display;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifetime liquidated notional that unlocks [`AchievementId::FirstMillion`].
pub const FIRST_MILLION_TOTAL: Decimal = dec!(1000000);

/// Single event notional that unlocks [`AchievementId::WhaleHunter`].
pub const WHALE_HUNTER_VALUE: Decimal = dec!(100000);

/// Minimum buy & sell count, equal to each other, that unlocks [`AchievementId::BalancedView`].
pub const BALANCED_VIEW_COUNT: u64 = 10;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AchievementId {
    #[display("first_million")]
    FirstMillion,
    #[display("whale_hunter")]
    WhaleHunter,
    #[display("balanced_view")]
    BalancedView,
}

impl AchievementId {
    pub const ALL: [AchievementId; 3] = [
        AchievementId::FirstMillion,
        AchievementId::WhaleHunter,
        AchievementId::BalancedView,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            AchievementId::FirstMillion => "First Million",
            AchievementId::WhaleHunter => "Whale Hunter",
            AchievementId::BalancedView => "Balanced View",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AchievementId::FirstMillion => "Witness $1,000,000 in total liquidations",
            AchievementId::WhaleHunter => "Spot a single liquidation worth $100,000 or more",
            AchievementId::BalancedView => "See an equal number of buy and sell liquidations (10+ each)",
        }
    }
}

/// Set of unlocked achievements, each stamped with the instant it unlocked.
///
/// Unlocking is one-way: once present, an achievement and its instant never change.
#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize)]
pub struct Achievements {
    unlocked: BTreeMap<AchievementId, DateTime<Utc>>,
}

impl Achievements {
    pub fn is_unlocked(&self, id: AchievementId) -> bool {
        self.unlocked.contains_key(&id)
    }

    pub fn unlocked_at(&self, id: AchievementId) -> Option<DateTime<Utc>> {
        self.unlocked.get(&id).copied()
    }

    /// Unlock the provided achievement, returning `true` only on the first unlock.
    pub fn unlock(&mut self, id: AchievementId, time: DateTime<Utc>) -> bool {
        if self.is_unlocked(id) {
            return false;
        }
        self.unlocked.insert(id, time);
        true
    }

    /// Every known achievement with its unlock instant, if unlocked.
    pub fn iter(&self) -> impl Iterator<Item = (AchievementId, Option<DateTime<Utc>>)> + '_ {
        AchievementId::ALL
            .into_iter()
            .map(|id| (id, self.unlocked_at(id)))
    }

    pub fn unlocked_count(&self) -> usize {
        self.unlocked.len()
    }
}
