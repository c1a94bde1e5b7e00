//! # stratus-backend
//!
//! Collective output backend abstraction for the Stratus pipeline.
//!
//! Provides an [`OutputBackend`] trait with two implementations:
//! - [`ContainerBackend`]: writes one self-describing container file per
//!   output step, gathering every rank's blocks on rank 0
//! - [`RecordingBackend`]: records the exact call sequence (tests, dry runs)
//!
//! Ranks talk through the [`Communicator`] trait. [`LocalGroup`] runs a
//! collective group as threads inside one process.

pub mod backend;
pub mod comm;
pub mod container;
pub mod container_backend;
pub mod recording;

pub use backend::{OutputBackend, VariableDecl};
pub use comm::{Communicator, LocalComm, LocalGroup};
pub use container::{Block, Container, StoredVariable};
pub use container_backend::ContainerBackend;
pub use recording::{BackendCall, CallLog, RecordingBackend};
