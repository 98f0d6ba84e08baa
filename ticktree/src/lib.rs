//! # Ticktree
//!
//! A cooperative, poll-driven task scheduler for Rust.
//!
//! Ticktree provides the core model for periodic, windowed, and composed
//! work driven from a single polling loop. Nothing here spawns threads or
//! sleeps; the embedding program decides when and how often to poll, and
//! every clock in the tree settles its state inside that call.
//!
//! ## Core Concepts
//!
//! - **TickSource**: the single source of raw time, a wrapping 32-bit
//!   counter. The library widens it to 64 bits internally, so schedules
//!   survive counter wraparound as long as polling outpaces the wrap period.
//! - **Clock**: a start/pause/stop stopwatch over a tick source, with an
//!   optional activation window (start offset and duration) and edge
//!   callbacks that fire on state transitions.
//! - **TaskNode**: a schedulable unit combining a periodic trigger, a
//!   user-supplied [`Task`](components::task::Task) body, and children
//!   composed in parallel, in lockstep, or as a sequence.
//! - **Registry**: the embedding surface; owns top-level nodes, shares one
//!   tick source among them, and drives the whole forest once per poll.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ticktree::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() {
//!     // 1. One tick source for everything; here, process uptime in
//!     //    microseconds.
//!     let source: Arc<dyn TickSource> = Arc::new(SystemTickSource::new());
//!     let mut registry = Registry::new(source);
//!
//!     // 2. Spawn periodic work.
//!     registry.interval("heartbeat", 1_000_000, 0, |cx| {
//!         println!("{} fired, frame {}", cx.name, cx.frame);
//!     });
//!     registry.once("farewell", 10_000_000, |_cx| {
//!         println!("ten seconds in");
//!     });
//!
//!     // 3. Drive everything from the main loop.
//!     loop {
//!         registry.poll_once();
//!         std::thread::sleep(std::time::Duration::from_millis(10));
//!     }
//! }
//! ```

pub const LIB_NAME: &str = "Ticktree";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod common;
pub mod components;
pub mod config;
pub mod error;
pub mod registry;
pub mod time;

/// A prelude module for easy importing of the most common Ticktree types.
pub mod prelude {
    pub use crate::common::{TaskKey, Ticks};
    pub use crate::components::task::{Composition, FnTask, Task, TaskContext, TaskNode};
    pub use crate::components::trigger::IntervalTrigger;
    pub use crate::config::{PollPacing, SchedulerConfig};
    pub use crate::error::{ScheduleError, ScheduleResult};
    pub use crate::registry::Registry;
    pub use crate::time::{
        Clock, ClockState, ManualTickSource, SystemTickSource, TickSource,
    };
}
