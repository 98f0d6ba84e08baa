//! Contains common, primitive types and constants shared across the scheduler.
//!
//! This module defines the tick arithmetic types, the fixed width of the
//! underlying hardware counter, and the key type used to identify tasks
//! owned by a [`Registry`](crate::registry::Registry). Using a distinct
//! slotmap key instead of a bare index prevents stale-handle bugs: a removed
//! task's key is never reused for a later task.

use slotmap::new_key_type;

/// The unit of all scheduler arithmetic: ticks of the underlying counter,
/// widened to 64 bits so elapsed values survive counter wraparound.
pub type Ticks = i64;

new_key_type! {
    /// Uniquely and safely identifies a root task owned by a `Registry`.
    ///
    /// Returned when a task is added to the registry. The key stays valid
    /// until the task is removed (explicitly or by auto-erase) and is never
    /// handed out again afterwards.
    pub struct TaskKey;
}

/// Bit width of the raw hardware tick counter.
pub const RAW_TICK_BITS: u32 = 32;

/// Largest value the raw counter can hold, widened to `Ticks`.
pub const RAW_TICK_MAX: i64 = 0x0000_0000_FFFF_FFFF;

/// Half the raw counter's range. A backwards jump larger than this between
/// two reads is treated as one wraparound of the counter.
pub const RAW_TICK_HALF: u32 = 0x7FFF_FFFF;

/// Default tick frequency assumed for rate conversions: one tick per
/// microsecond. Override per registry via
/// [`SchedulerConfig::tick_hz`](crate::config::SchedulerConfig).
pub const DEFAULT_TICK_HZ: u64 = 1_000_000;
