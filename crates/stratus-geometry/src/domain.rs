//! Domain geometry of a single output write.

use serde::{Deserialize, Serialize};
use stratus_types::constants::SLIDING_AXIS;
use stratus_types::{GridVec, StratusError, StratusResult};

/// Local and global placement of one rank's contribution to a write.
///
/// - `local_offset` / `local_size`: the written region inside the rank's
///   non-guard buffer.
/// - `global_offset` / `global_size`: the logical global array (its origin
///   and extent in the full simulation box).
/// - `rank_physical_offset`: where the rank's non-guard buffer starts in the
///   full simulation box.
///
/// Constructed once per write and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainGeometry {
    local_offset: GridVec,
    local_size: GridVec,
    global_offset: GridVec,
    global_size: GridVec,
    rank_physical_offset: GridVec,
}

impl DomainGeometry {
    /// Creates a geometry, checking dimensionality and that no extent is negative.
    pub fn new(
        local_offset: GridVec,
        local_size: GridVec,
        global_offset: GridVec,
        global_size: GridVec,
        rank_physical_offset: GridVec,
    ) -> StratusResult<Self> {
        local_offset.check_dims(&local_size, "local size")?;
        local_offset.check_dims(&global_offset, "global offset")?;
        local_offset.check_dims(&global_size, "global size")?;
        local_offset.check_dims(&rank_physical_offset, "rank offset")?;

        if !local_size.is_non_negative() {
            return Err(StratusError::InvalidConfig(format!(
                "Local size must be non-negative, got {local_size}"
            )));
        }
        if !global_size.is_non_negative() {
            return Err(StratusError::InvalidConfig(format!(
                "Global size must be non-negative, got {global_size}"
            )));
        }
        if !local_offset.is_non_negative() {
            return Err(StratusError::InvalidConfig(format!(
                "Local offset must be non-negative, got {local_offset}"
            )));
        }

        Ok(Self {
            local_offset,
            local_size,
            global_offset,
            global_size,
            rank_physical_offset,
        })
    }

    /// Simulation dimensionality (2 or 3).
    pub fn dims(&self) -> usize {
        self.local_size.dims()
    }

    pub fn local_offset(&self) -> GridVec {
        self.local_offset
    }

    pub fn local_size(&self) -> GridVec {
        self.local_size
    }

    pub fn global_offset(&self) -> GridVec {
        self.global_offset
    }

    pub fn global_size(&self) -> GridVec {
        self.global_size
    }

    pub fn rank_physical_offset(&self) -> GridVec {
        self.rank_physical_offset
    }

    /// Absolute position of the first written cell in the full simulation box.
    pub fn domain_offset(&self) -> GridVec {
        self.rank_physical_offset + self.local_offset
    }

    /// Offset recorded in the `offset_global_*` variables.
    ///
    /// Along the sliding axis the offset is taken relative to the global
    /// window origin and floored at zero, since output metadata cannot hold
    /// negative coordinates. Other axes pass the domain offset through.
    pub fn written_offset(&self) -> GridVec {
        let domain = self.domain_offset();
        let clamped = (domain[SLIDING_AXIS] - self.global_offset[SLIDING_AXIS]).max(0);
        domain.with(SLIDING_AXIS, clamped)
    }

    /// Number of cells this rank writes.
    pub fn local_cell_count(&self) -> usize {
        self.local_size.cell_count()
    }

    /// True if `local_offset + local_size <= global_size` in every dimension.
    pub fn fits_global(&self) -> bool {
        (self.local_offset + self.local_size).all_le(&self.global_size)
    }
}
