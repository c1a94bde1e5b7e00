//! # stratus-writer
//!
//! Drives the periodic, collective output cycle: resolve the geometry of
//! the step, declare every variable, open the target, write the global
//! scalars, the axis metadata and each field component in declaration
//! order, then close. When the moving window is active, auxiliary writers
//! get a second pass over the ghost segment.
//!
//! ## Key Types
//!
//! - [`WriterConfig`]: period, file prefix and group name
//! - [`FieldSource`] / [`FieldRegistry`]: the fields to write, in registration order
//! - [`FieldWriter`]: the orchestrator, with `load` / `notify` / `unload`
//! - [`AuxiliaryWriter`]: seam for outputs written over the ghost segment

pub mod auxiliary;
pub mod config;
pub mod context;
pub mod orchestrator;
pub mod source;

pub use auxiliary::{AuxiliaryWriter, FieldSegmentWriter};
pub use config::WriterConfig;
pub use context::WriteContext;
pub use orchestrator::{CyclePhase, CycleReport, FieldWriter, PassReport};
pub use source::{DerivedField, FieldRegistry, FieldSource, HostData, HostField, SharedHostData};
