//! # stratus-pack
//!
//! Extracts the guard-free region of a padded, component-interleaved field
//! buffer into a flat staging buffer, one component at a time.
//!
//! Both the padded source and the packed destination are laid out with the
//! first axis varying fastest.

pub mod layout;
pub mod packer;
pub mod staging;

pub use layout::SourceLayout;
pub use packer::pack;
pub use staging::StagingBuffer;
