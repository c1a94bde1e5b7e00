//! # stratus-telemetry
//!
//! Event bus for output-cycle telemetry. The writer emits structured events
//! (cycle boundaries, declarations, opened files, written fields) that are
//! consumed by pluggable sinks (in-memory collectors, `tracing` logs).

pub mod bus;
pub mod events;
pub mod sinks;

pub use bus::EventBus;
pub use events::{CycleEvent, EventKind, Pass};
pub use sinks::{EventSink, SharedVecSink, TracingSink, VecSink};
