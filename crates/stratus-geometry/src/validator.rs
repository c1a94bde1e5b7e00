//! Window state validation.
//!
//! Rejects inconsistent window snapshots before any geometry is derived
//! from them, so configuration mistakes surface as clear errors instead
//! of corrupt output.

use stratus_types::{StratusError, StratusResult};

use crate::window::WindowState;

/// Validates a window snapshot.
///
/// Checks:
/// - All vectors share one dimensionality (2 or 3)
/// - No size is negative
/// - The visible region lies inside the allocated local extent
/// - The global window fits into the simulation box
pub fn validate_window(window: &WindowState) -> StratusResult<()> {
    let reference = window.local_size;
    reference.check_dims(&window.local_offset, "window local offset")?;
    reference.check_dims(&window.local_full_size, "window local full size")?;
    reference.check_dims(&window.global_window_size, "global window size")?;
    reference.check_dims(&window.global_simulation_offset, "global simulation offset")?;
    reference.check_dims(&window.global_simulation_size, "global simulation size")?;

    for (what, v) in [
        ("local size", window.local_size),
        ("local full size", window.local_full_size),
        ("local offset", window.local_offset),
        ("global window size", window.global_window_size),
        ("global simulation size", window.global_simulation_size),
    ] {
        if !v.is_non_negative() {
            return Err(StratusError::InvalidConfig(format!(
                "Window {what} must be non-negative, got {v}"
            )));
        }
    }

    if !(window.local_offset + window.local_size).all_le(&window.local_full_size) {
        return Err(StratusError::InvalidConfig(format!(
            "Visible region {} + {} exceeds local extent {}",
            window.local_offset, window.local_size, window.local_full_size
        )));
    }

    if !window.global_window_size.all_le(&window.global_simulation_size) {
        return Err(StratusError::InvalidConfig(format!(
            "Global window {} exceeds simulation box {}",
            window.global_window_size, window.global_simulation_size
        )));
    }

    Ok(())
}
