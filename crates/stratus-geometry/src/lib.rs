//! # stratus-geometry
//!
//! Maps simulation window state onto the geometry of one output write.
//!
//! ## Key Types
//!
//! - [`WindowState`]: per-step window extents reported by the simulation
//! - [`DomainGeometry`]: local/global offsets and sizes of one write
//! - [`resolve_primary`] / [`resolve_ghost`]: geometry for the visible
//!   window and for the trailing ghost segment of a sliding window
//! - [`WindowSource`]: collaborator trait, with [`StaticWindow`] and
//!   [`SlidingWindow`] implementations
//! - [`decompose`]: splits a global grid into per-rank domains

pub mod decompose;
pub mod domain;
pub mod resolver;
pub mod validator;
pub mod window;

pub use decompose::{decompose, RankDomain};
pub use domain::DomainGeometry;
pub use resolver::{resolve_ghost, resolve_primary};
pub use validator::validate_window;
pub use window::{SlidingWindow, StaticWindow, WindowSource, WindowState};
