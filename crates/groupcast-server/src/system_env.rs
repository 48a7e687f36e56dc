//! Production Environment implementation using the system clocks.
//!
//! This module provides `SystemEnv`, the production implementation of the
//! `Environment` trait.

use chrono::{Local, NaiveTime};
use groupcast_core::env::Environment;

/// Production environment.
///
/// This implementation:
/// - Uses `std::time::Instant::now()` for retention ages
/// - Uses `chrono::Local` for the `(HH:MM:SS)` message tag
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> std::time::Instant {
        std::time::Instant::now()
    }

    fn wall_clock(&self) -> NaiveTime {
        Local::now().time()
    }
}
