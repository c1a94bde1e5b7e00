//! # stratus-types
//!
//! Shared types, identifiers, error types, and layout constants
//! for the Stratus collective field output pipeline.
//!
//! This crate has no I/O and no protocol logic. It defines the vocabulary
//! that all other Stratus crates share.

pub mod constants;
pub mod error;
pub mod grid;
pub mod ids;
pub mod value;

pub use error::{StratusError, StratusResult};
pub use grid::GridVec;
pub use ids::{FileId, GroupId, VariableId};
pub use value::{DataType, Element, ScalarValue};
