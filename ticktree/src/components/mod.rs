//! Contains the building blocks for schedulable work.
//!
//! This module provides the periodic trigger (which answers "has another
//! period elapsed since the last poll") and the task node (which combines a
//! trigger, a user-supplied task body, and a tree of child nodes). The
//! [`Registry`](crate::registry::Registry) owns collections of task nodes
//! and drives them once per polling cycle.

pub mod task;
pub mod trigger;
