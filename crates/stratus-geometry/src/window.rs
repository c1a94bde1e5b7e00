//! Window state and the sources that report it.
//!
//! The simulation owns the window; the writer only asks for a snapshot of
//! it at each notified step. Sources are handed to the writer at
//! construction instead of being looked up from a global registry.

use serde::{Deserialize, Serialize};
use stratus_types::constants::SLIDING_AXIS;
use stratus_types::GridVec;

use crate::decompose::RankDomain;

/// Snapshot of the (possibly moving) simulation window at one step.
///
/// All local quantities are in the rank's non-guard cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    /// Step this snapshot belongs to.
    pub iteration: u32,
    /// Start of the visible region inside the rank's buffer.
    pub local_offset: GridVec,
    /// Visible local extent.
    pub local_size: GridVec,
    /// Allocated local extent (visible and hidden part together).
    pub local_full_size: GridVec,
    /// Extent of the visible global window.
    pub global_window_size: GridVec,
    /// Origin of the visible window in the full simulation box.
    pub global_simulation_offset: GridVec,
    /// Extent of the full simulation box.
    pub global_simulation_size: GridVec,
    /// Number of times the window has slid so far.
    pub slides: u32,
    /// Whether the moving window is enabled.
    pub sliding_active: bool,
    /// Whether this rank sits in the bottom row of the rank grid.
    pub is_bottom: bool,
}

/// Collaborator reporting window state for the local rank.
pub trait WindowSource: Send {
    /// Window snapshot at `step`.
    fn window(&self, step: u32) -> WindowState;

    /// Start of this rank's non-guard buffer in the full simulation box.
    fn rank_offset(&self) -> GridVec;
}

/// Window that always covers the whole simulation box.
#[derive(Debug, Clone)]
pub struct StaticWindow {
    domain: RankDomain,
    global_size: GridVec,
}

impl StaticWindow {
    pub fn new(domain: RankDomain, global_size: GridVec) -> Self {
        Self {
            domain,
            global_size,
        }
    }
}

impl WindowSource for StaticWindow {
    fn window(&self, step: u32) -> WindowState {
        let dims = self.global_size.dims();
        WindowState {
            iteration: step,
            local_offset: GridVec::zeros(dims),
            local_size: self.domain.local_size,
            local_full_size: self.domain.local_size,
            global_window_size: self.global_size,
            global_simulation_offset: GridVec::zeros(dims),
            global_simulation_size: self.global_size,
            slides: 0,
            sliding_active: false,
            is_bottom: self.domain.is_bottom,
        }
    }

    fn rank_offset(&self) -> GridVec {
        self.domain.grid_position
    }
}

/// Moving window that keeps the bottom row of ranks hidden.
///
/// The visible window spans the simulation box minus `hidden_cells` along
/// the sliding axis. Ranks whose buffer lies entirely below the window see
/// nothing of it; their cells form the ghost segment. The slide counter
/// advances once every `slide_period` steps (0 never slides).
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    domain: RankDomain,
    global_size: GridVec,
    hidden_cells: i64,
    slide_period: u32,
}

impl SlidingWindow {
    pub fn new(domain: RankDomain, global_size: GridVec, hidden_cells: i64, slide_period: u32) -> Self {
        Self {
            domain,
            global_size,
            hidden_cells,
            slide_period,
        }
    }
}

impl WindowSource for SlidingWindow {
    fn window(&self, step: u32) -> WindowState {
        let dims = self.global_size.dims();
        let window_extent = (self.global_size[SLIDING_AXIS] - self.hidden_cells).max(0);
        let full = self.domain.local_size;

        let start = self.domain.grid_position[SLIDING_AXIS];
        let visible = (window_extent - start).clamp(0, full[SLIDING_AXIS]);

        let slides = if self.slide_period == 0 {
            0
        } else {
            step / self.slide_period
        };

        WindowState {
            iteration: step,
            local_offset: GridVec::zeros(dims),
            local_size: full.with(SLIDING_AXIS, visible),
            local_full_size: full,
            global_window_size: self.global_size.with(SLIDING_AXIS, window_extent),
            global_simulation_offset: GridVec::zeros(dims),
            global_simulation_size: self.global_size,
            slides,
            sliding_active: true,
            is_bottom: self.domain.is_bottom,
        }
    }

    fn rank_offset(&self) -> GridVec {
        self.domain.grid_position
    }
}
