//! Environment backed by turmoil's virtual clock.

use std::time::Duration;

use chrono::NaiveTime;
use groupcast_core::Environment;
use tokio::time::Instant;

/// Wall clock reading at simulation start.
const START_OF_DAY_SECS: u64 = 12 * 60 * 60;

/// Simulated environment.
///
/// Turmoil runs every host on a paused Tokio clock that it advances itself,
/// so `tokio::time::Instant` is virtual time. The `(HH:MM:SS)` tag starts at
/// noon when the environment is created and follows the same clock.
#[derive(Debug, Clone, Copy)]
pub struct SimEnv {
    start: Instant,
}

impl SimEnv {
    /// Create an environment anchored at the current virtual instant.
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    /// Virtual time since this environment was created.
    pub fn elapsed(&self) -> Duration {
        Instant::now() - self.start
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_clock(&self) -> NaiveTime {
        let secs = (START_OF_DAY_SECS + self.elapsed().as_secs()) % 86_400;
        NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, 0).unwrap_or_default()
    }
}
