//! Pluggable event sinks.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::CycleEvent;

/// Trait for event consumers.
pub trait EventSink: Send {
    /// Process a single event.
    fn handle(&mut self, event: &CycleEvent);

    /// Called when the writer is unloaded.
    fn finalize(&mut self) {}

    /// Returns a human-readable name for this sink.
    fn name(&self) -> &str;
}

/// Collects events into a `Vec`.
#[derive(Default)]
pub struct VecSink {
    pub events: Vec<CycleEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for VecSink {
    fn handle(&mut self, event: &CycleEvent) {
        self.events.push(event.clone());
    }

    fn name(&self) -> &str {
        "vec_sink"
    }
}

/// Collects events into a shared `Vec` that stays readable after the sink
/// has been boxed and handed to a bus.
#[derive(Clone, Default)]
pub struct SharedVecSink {
    events: Arc<Mutex<Vec<CycleEvent>>>,
}

impl SharedVecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event received so far.
    pub fn events(&self) -> Vec<CycleEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for SharedVecSink {
    fn handle(&mut self, event: &CycleEvent) {
        self.events.lock().push(event.clone());
    }

    fn name(&self) -> &str {
        "shared_vec_sink"
    }
}

/// Logs events through `tracing` at debug level.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn handle(&mut self, event: &CycleEvent) {
        tracing::debug!(
            iteration = event.iteration,
            rank = event.rank,
            event = ?event.kind,
            "output_event"
        );
    }

    fn name(&self) -> &str {
        "tracing_sink"
    }
}
