//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples the group logic from the system clock.
//! Retention decisions are made against `now()`, and the `(HH:MM:SS)` tag on
//! live messages comes from `wall_clock()`. This enables:
//!
//! - Deterministic Simulation: Turmoil provides a virtual clock, so a retention
//!   window of several seconds elapses instantly and reproducibly.
//!
//! - Production Runtime: Tokio implementations use the real clocks without any
//!   change to the group logic.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Isolation: Implementations must not share global state

use std::{
    fmt::Debug,
    ops::Sub,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::NaiveTime;

/// Abstract environment providing monotonic and wall-clock time.
///
/// # Safety
///
/// Implementations MUST guarantee time monotonicity: `now()` never goes
/// backwards. The message log subtracts stored instants from `now()` and
/// relies on the result being a non-negative age.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant used to stamp log entries.
    type Instant: Copy + Ord + Debug + Send + Sync + Sub<Output = Duration> + 'static;

    /// Returns the current monotonic time.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: Subsequent calls must return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Returns the local time of day used to tag outgoing messages.
    ///
    /// Only used for display. Never compared against log timestamps.
    fn wall_clock(&self) -> NaiveTime;
}

/// Instant of a `ManualEnv`: time since the environment was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ManualInstant(pub Duration);

impl Sub for ManualInstant {
    type Output = Duration;

    fn sub(self, other: Self) -> Duration {
        self.0.saturating_sub(other.0)
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same clock. The wall clock starts at midnight.
#[derive(Debug, Clone, Default)]
pub struct ManualEnv {
    elapsed: Arc<Mutex<Duration>>,
}

impl ManualEnv {
    /// Clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }

    /// Move the clock forward by whole seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }
}

impl Environment for ManualEnv {
    type Instant = ManualInstant;

    fn now(&self) -> ManualInstant {
        ManualInstant(*self.elapsed.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn wall_clock(&self) -> NaiveTime {
        let secs = self.now().0.as_secs() % 86_400;
        NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let env = ManualEnv::new();
        let other = env.clone();
        let start = env.now();

        other.advance_secs(3);
        assert_eq!(env.now() - start, Duration::from_secs(3));
        assert_eq!(env.wall_clock().to_string(), "00:00:03");
    }

    #[test]
    fn instants_never_go_negative() {
        let earlier = ManualInstant(Duration::from_secs(1));
        let later = ManualInstant(Duration::from_secs(4));
        assert_eq!(earlier - later, Duration::ZERO);
    }
}
