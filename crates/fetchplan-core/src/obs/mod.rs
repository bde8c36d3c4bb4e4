//! Load-plan tracing boundary.
//!
//! Tracing is optional, injected by the caller, and must not affect walk or
//! resolution semantics. Nothing in the engine reads back what it emits.

mod sink;

pub use sink::{PlanTraceEvent, PlanTraceSink, TraceFrame};

pub(crate) use sink::emit;
