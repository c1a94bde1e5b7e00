//! Ordered queue of declared variable handles.
//!
//! Every declaration pushes its handle to the back; every write pops from
//! the front. Because all ranks declare in the same order, popping in
//! FIFO order keeps writes aligned across ranks. Popping an empty queue,
//! or finishing with handles left over, is a protocol violation.

use std::collections::VecDeque;

use stratus_types::{StratusError, StratusResult, VariableId};

/// Which per-axis quantity an axis variable carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRole {
    LocalSize,
    GlobalSize,
    GlobalOffset,
}

impl AxisRole {
    /// Declaration order within one axis triplet.
    pub const TRIPLET: [AxisRole; 3] = [
        AxisRole::LocalSize,
        AxisRole::GlobalSize,
        AxisRole::GlobalOffset,
    ];
}

/// What a declared handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Scalar,
    Axis { axis: usize, role: AxisRole },
    Field { field: usize, component: usize },
    /// Declared on behalf of an auxiliary writer.
    Auxiliary { writer: usize },
}

/// One declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub id: VariableId,
    pub name: String,
    pub kind: HandleKind,
}

/// FIFO of handles in declaration order.
#[derive(Debug, Default)]
pub struct HandleQueue {
    entries: VecDeque<Handle>,
    declared: usize,
}

impl HandleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a freshly declared handle.
    pub fn push(&mut self, handle: Handle) {
        self.declared += 1;
        self.entries.push_back(handle);
    }

    /// Takes the next handle in declaration order.
    pub fn pop_front(&mut self) -> StratusResult<Handle> {
        self.entries.pop_front().ok_or_else(|| {
            StratusError::Protocol(format!(
                "Handle queue underflow: all {} declared handles already consumed",
                self.declared
            ))
        })
    }

    /// Takes the next handle and checks it is the one the caller expects.
    pub fn pop_expecting(&mut self, name: &str) -> StratusResult<Handle> {
        let handle = self.pop_front()?;
        if handle.name != name {
            return Err(StratusError::Protocol(format!(
                "Write order diverged from declaration order: expected '{}', writing '{name}'",
                handle.name
            )));
        }
        Ok(handle)
    }

    /// Handles not consumed yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handles ever pushed.
    pub fn declared(&self) -> usize {
        self.declared
    }

    /// Names of the pending handles, front first.
    pub fn pending_names(&self) -> Vec<&str> {
        self.entries.iter().map(|h| h.name.as_str()).collect()
    }

    /// Checks that every declared handle was consumed.
    pub fn finish(&self) -> StratusResult<()> {
        if !self.entries.is_empty() {
            return Err(StratusError::Protocol(format!(
                "{} declared handle(s) never written: {}",
                self.entries.len(),
                self.pending_names().join(", ")
            )));
        }
        Ok(())
    }
}
