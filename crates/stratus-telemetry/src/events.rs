//! Write-cycle event types.
//!
//! Events are small value types tagged with the iteration and the rank
//! that emitted them.

use serde::{Deserialize, Serialize};

/// Which pass of a cycle an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pass {
    /// The visible window, written to `<prefix>_<iteration>.<ext>`.
    Primary,
    /// The trailing segment of a sliding window, written by auxiliary writers.
    Ghost,
}

/// An event emitted by the writer during one output cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleEvent {
    /// Iteration being written.
    pub iteration: u32,
    /// Emitting rank.
    pub rank: usize,
    /// Event payload.
    pub kind: EventKind,
}

/// Event payload variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// Cycle started.
    CycleBegin {
        /// Whether the moving window was active at this step.
        sliding: bool,
    },

    /// Declaration phase of a pass finished.
    VariablesDeclared {
        pass: Pass,
        /// Number of declared variables.
        variables: usize,
        /// Bytes requested from the backend.
        bytes: u64,
    },

    /// Output target opened and space reserved.
    FileOpened {
        pass: Pass,
        path: String,
        /// Bytes the backend granted.
        reserved_bytes: u64,
    },

    /// One field component packed and written.
    FieldWritten {
        name: String,
        /// Cells this rank contributed.
        cells: usize,
    },

    /// Second pass over the ghost segment started.
    GhostPass {
        /// Registered auxiliary writers.
        writers: usize,
        /// Ghost cells held by this rank.
        local_cells: usize,
    },

    /// Cycle completed.
    CycleEnd {
        variables: usize,
        declared_bytes: u64,
    },

    /// Cycle aborted.
    CycleFailed { error: String },
}

impl CycleEvent {
    pub fn new(iteration: u32, rank: usize, kind: EventKind) -> Self {
        Self {
            iteration,
            rank,
            kind,
        }
    }
}
