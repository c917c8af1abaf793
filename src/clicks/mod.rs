//! Denormalized click counters
//!
//! The click log table is the source of truth; these counters are a
//! fast-read cache maintained by increment calls. Increments are buffered
//! in-process and flushed to a [`ClickSink`] on an interval or when the
//! buffer crosses a threshold.

pub mod manager;
pub mod sink;

pub use manager::ClickManager;
pub use sink::ClickSink;
