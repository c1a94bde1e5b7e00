//! # stratus-schema
//!
//! Declares the variables of one output cycle and keeps the handles the
//! backend hands back in the order the writes must consume them.
//!
//! ## Key Types
//!
//! - [`FieldDescriptor`]: name, component count, element type and units of a field
//! - [`SchemaBuilder`]: issues declarations and accumulates the byte total to reserve
//! - [`DeclaredSchema`]: the finished declaration set
//! - [`HandleQueue`]: FIFO of declared handles, consumed once per write

pub mod builder;
pub mod descriptor;
pub mod naming;
pub mod queue;

pub use builder::{DeclaredSchema, SchemaBuilder};
pub use descriptor::FieldDescriptor;
pub use queue::{AxisRole, Handle, HandleKind, HandleQueue};
