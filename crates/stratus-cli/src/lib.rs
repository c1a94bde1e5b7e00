//! # stratus-cli
//!
//! Library side of the `stratus` binary: the TOML run configuration and a
//! driver that runs a synthetic domain-decomposed simulation, one thread
//! per rank, writing its fields through the collective writer.

pub mod config;
pub mod driver;

pub use config::{DerivedConfig, FieldConfig, RunConfig, WindowConfig};
pub use driver::run;
