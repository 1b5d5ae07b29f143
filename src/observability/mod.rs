//! Logging for recordplan
//!
//! All events go through `tracing` with target `recordplan`. The library never
//! installs a subscriber; embedding applications decide where events go.
//!
//! # Conventions
//!
//! - `component`: subsystem emitting the event ("planner", "executor")
//! - `event`: snake_case event name
//! - `%` for Display fields, `?` for Debug fields
//!
//! ```ignore
//! log_debug!(
//!     component = "planner",
//!     event = "in_join_planned",
//!     index = %index_name,
//! );
//! ```

/// Target for every recordplan log event.
pub(crate) const TARGET: &str = "recordplan";

/// Debug-level event.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::TARGET, $($field)*)
    };
}

/// Trace-level event, for per-row and per-candidate detail.
macro_rules! log_trace {
    ($($field:tt)*) => {
        ::tracing::trace!(target: $crate::observability::TARGET, $($field)*)
    };
}

/// Warn-level event.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_trace;
pub(crate) use log_warn;
