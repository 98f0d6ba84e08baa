//! Defines the configuration structures for the scheduler.
//!
//! These structs are designed to be deserialized from a configuration file
//! (e.g., a TOML file) using `serde`, so a binary embedding a
//! [`Registry`](crate::registry::Registry) can define the tick frequency and
//! its polling cadence externally from the application code.

use crate::common::DEFAULT_TICK_HZ;
use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration for a `Registry` and the poll loop driving it.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Frequency of the underlying tick counter, in ticks per second.
    /// Used to derive periods from frame rates. Defaults to one microsecond
    /// per tick.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u64,

    /// How often the embedding program intends to poll the registry.
    /// The core never sleeps itself; this only paces the owning loop.
    #[serde(default)]
    pub pacing: PollPacing,
}

/// The polling cadence of the loop that drives [`Registry::poll_once`].
///
/// Correctness of wraparound detection requires polling more often than one
/// wrap period of the raw counter; that is the caller's responsibility, and
/// every variant here satisfies it by a wide margin for a microsecond tick.
///
/// [`Registry::poll_once`]: crate::registry::Registry::poll_once
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollPacing {
    /// Poll as fast as the loop spins, never sleeping.
    Busy,
    /// ~1000 polls per second.
    High,
    /// ~100 polls per second. Suitable for most schedules.
    Medium,
    /// ~10 polls per second.
    Low,
    /// A user-defined polling rate.
    Custom { polls_per_second: u64 },
}

impl PollPacing {
    /// The sleep to insert between polls, or `None` for busy polling.
    pub fn poll_interval(&self) -> Option<Duration> {
        match self {
            PollPacing::Busy => None,
            PollPacing::High => Some(Duration::from_millis(1)),
            PollPacing::Medium => Some(Duration::from_millis(10)),
            PollPacing::Low => Some(Duration::from_millis(100)),
            PollPacing::Custom { polls_per_second } => {
                if *polls_per_second == 0 {
                    None
                } else {
                    Some(Duration::from_secs_f64(1.0 / *polls_per_second as f64))
                }
            }
        }
    }
}

impl Default for PollPacing {
    fn default() -> Self {
        PollPacing::Medium
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            pacing: PollPacing::default(),
        }
    }
}

// --- Default value functions for serde ---

fn default_tick_hz() -> u64 {
    DEFAULT_TICK_HZ
}
