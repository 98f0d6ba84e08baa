//! Error types reported by the scheduler core.
//!
//! Nothing in the core is fatal: every error here describes a rejected call
//! that left all scheduler state unchanged. Misconfigured nodes keep
//! answering their state queries, so the worst case is always observable.

use crate::components::task::Composition;
use thiserror::Error;

/// A convenience alias for results returned by scheduler operations.
pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Errors reported by task composition and registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// A child was added under a composition mode that conflicts with the
    /// mode fixed by the node's first child-adding call.
    #[error("task `{name}` already composes its children as {existing:?}")]
    CompositionFixed {
        name: String,
        existing: Composition,
    },

    /// A sequential operation was requested on a node that does not compose
    /// its children sequentially.
    #[error("task `{0}` does not compose its children sequentially")]
    NotSequential(String),

    /// Automatic sequential advancement was attempted while a child has no
    /// fixed duration, which makes the compensated base ill-defined.
    #[error("task `{name}` cannot auto-advance: child `{child}` has no fixed duration")]
    UnboundedChild { name: String, child: String },

    /// Sequential advancement was requested past the last child, or on a
    /// node with no children.
    #[error("task `{name}` has no child at index {index}")]
    IndexOutOfRange { name: String, index: usize },

    /// A name lookup on the registry came up empty.
    #[error("no task named `{0}`")]
    TaskNotFound(String),
}
