//! Geometry resolution for the visible window and the ghost segment.

use stratus_types::constants::SLIDING_AXIS;
use stratus_types::{GridVec, StratusError, StratusResult};

use crate::domain::DomainGeometry;
use crate::validator::validate_window;
use crate::window::WindowState;

/// Geometry of the visible window for this rank.
///
/// The written region is the window's visible local extent; the global
/// array is the global window, anchored at the global simulation offset.
pub fn resolve_primary(
    window: &WindowState,
    rank_physical_offset: GridVec,
) -> StratusResult<DomainGeometry> {
    validate_window(window)?;

    let geometry = DomainGeometry::new(
        window.local_offset,
        window.local_size,
        window.global_simulation_offset,
        window.global_window_size,
        rank_physical_offset,
    )?;

    if !geometry.fits_global() {
        return Err(StratusError::InvalidConfig(format!(
            "Local region {} + {} exceeds global window {}",
            geometry.local_offset(),
            geometry.local_size(),
            geometry.global_size()
        )));
    }

    Ok(geometry)
}

/// Geometry of the segment below the visible window.
///
/// Returns `None` unless the moving window is active. The segment starts
/// where the primary global array ends along the sliding axis and runs to
/// the end of the simulation box. Only bottom ranks hold cells of it; every
/// other rank still gets a geometry, with a zero extent along the sliding
/// axis, so that it joins the collective calls with empty payloads.
pub fn resolve_ghost(
    window: &WindowState,
    primary: &DomainGeometry,
) -> StratusResult<Option<DomainGeometry>> {
    if !window.sliding_active {
        return Ok(None);
    }

    let axis = SLIDING_AXIS;
    let visible = window.local_size[axis];

    let ghost_start = primary.global_offset()[axis] + primary.global_size()[axis];
    let global_offset = primary.global_offset().with(axis, ghost_start);
    let global_size = window
        .global_simulation_size
        .with(axis, window.global_simulation_size[axis] - ghost_start);

    let mut local_size = window.local_full_size.with(axis, window.local_full_size[axis] - visible);
    if !window.is_bottom {
        local_size[axis] = 0;
    }
    let local_offset = GridVec::zeros(primary.dims()).with(axis, visible);

    // Off-axis the segment keeps the primary domain offset; on the sliding
    // axis `domain_offset()` lands on the segment origin.
    let rank_physical_offset = primary
        .domain_offset()
        .with(axis, ghost_start - visible);

    DomainGeometry::new(
        local_offset,
        local_size,
        global_offset,
        global_size,
        rank_physical_offset,
    )
    .map(Some)
}
