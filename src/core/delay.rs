//! Retry delay policies.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Maps an attempt count to the delay before the next attempt is released.
///
/// The argument is the number of attempts already made: `0` when a task is
/// first scheduled, `k` right after attempt `k` failed.
#[derive(Clone)]
pub struct DelayPolicy(Arc<dyn Fn(u32) -> Duration + Send + Sync>);

impl DelayPolicy {
    /// Wrap an arbitrary function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Zero delay for every attempt.
    #[must_use]
    pub fn immediate() -> Self {
        Self::from_fn(|_| Duration::ZERO)
    }

    /// The same delay for every attempt, including the first.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self::from_fn(move |_| delay)
    }

    /// `attempts × step`; the first schedule is immediate.
    #[must_use]
    pub fn linear(step: Duration) -> Self {
        Self::from_fn(move |attempts| step.saturating_mul(attempts))
    }

    /// `base × 2^(attempts − 1)` capped at `max`; the first schedule is immediate.
    #[must_use]
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self::from_fn(move |attempts| {
            if attempts == 0 {
                return Duration::ZERO;
            }
            2_u32
                .checked_pow(attempts - 1)
                .map_or(max, |factor| base.saturating_mul(factor))
                .min(max)
        })
    }

    /// Delay to apply after `attempts` attempts have been made.
    #[must_use]
    pub fn delay_for(&self, attempts: u32) -> Duration {
        (self.0)(attempts)
    }
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self::immediate()
    }
}

impl fmt::Debug for DelayPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DelayPolicy").field(&"<fn>").finish()
    }
}
