//! Strongly-typed identifiers handed out by an output backend.
//!
//! Newtype wrappers prevent accidental mixing of variable handles
//! with file or group handles.

use serde::{Deserialize, Serialize};

/// Handle of a declared variable. Consumed once per write, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableId(pub u32);

/// Handle of an open collective output target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub u32);

/// Handle of a declared variable group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

impl VariableId {
    /// Returns the raw index as `usize` for table lookups.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl FileId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl GroupId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for VariableId {
    fn from(val: u32) -> Self {
        Self(val)
    }
}
