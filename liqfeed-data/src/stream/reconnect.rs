use rand::Rng;
use std::time::Duration;

/// Policy applied when an exchange connection closes or fails.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ReconnectPolicy {
    /// Stay closed after the first disconnect. Restarting is left to the owner.
    Never,
    /// Reconnect with exponential backoff.
    Backoff(Backoff),
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Backoff(Backoff::default())
    }
}

impl ReconnectPolicy {
    /// Delay before the provided (1-based) reconnection attempt, or `None` if the connection
    /// should remain closed.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            ReconnectPolicy::Never => None,
            ReconnectPolicy::Backoff(backoff) => backoff.delay(attempt),
        }
    }
}

/// Exponential backoff: `base * 2^(attempt - 1)`, capped at `max`, plus up to `jitter`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub jitter: Duration,
    /// Maximum reconnection attempts, 0 = infinite.
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
            jitter: Duration::from_millis(1000),
            max_attempts: 0,
        }
    }
}

impl Backoff {
    /// Deterministic part of the delay for the provided attempt, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts > 0 && attempt > self.max_attempts {
            return None;
        }

        let exponent = attempt.saturating_sub(1).min(16);
        Some(self.base.saturating_mul(1u32 << exponent).min(self.max))
    }

    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        let delay = self.base_delay(attempt)?;
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);

        if jitter_ms == 0 {
            Some(delay)
        } else {
            Some(delay + Duration::from_millis(rand::rng().random_range(0..=jitter_ms)))
        }
    }
}
