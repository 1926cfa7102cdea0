use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Consecutive-day activity streak measured in elapsed 24 hour periods, not calendar days.
///
/// Events 23:59 and 00:01 on consecutive dates are less than one day apart and leave the
/// streak unchanged.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Serialize)]
pub struct Streak {
    days: u32,
    last_active: Option<DateTime<Utc>>,
}

impl Streak {
    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn last_active(&self) -> Option<DateTime<Utc>> {
        self.last_active
    }

    /// Record activity at the provided instant, returning `true` if the streak length changed.
    pub fn record(&mut self, time: DateTime<Utc>) -> bool {
        let previous = self.days;

        self.days = match self.last_active {
            None => 1,
            Some(last_active) => match whole_days(time - last_active) {
                1 => self.days.saturating_add(1),
                days if days >= 2 => 1,
                _ => self.days,
            },
        };

        self.last_active = Some(time);
        previous != self.days
    }
}

// Negative deltas (out of order events) count as zero days.
fn whole_days(delta: TimeDelta) -> i64 {
    delta.num_days().max(0)
}
