//! Shape of a padded source buffer.

use serde::{Deserialize, Serialize};
use stratus_types::constants::MAX_COMPONENTS;
use stratus_types::{GridVec, StratusError, StratusResult};

/// Padded shape, guard width and component interleaving of a field buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLayout {
    /// Full extent including guard cells on both sides.
    pub padded: GridVec,
    /// Guard cells in front of the first interior cell, per axis.
    pub guard: GridVec,
    /// Interleaved components per cell.
    pub components: usize,
}

impl SourceLayout {
    pub fn new(padded: GridVec, guard: GridVec, components: usize) -> StratusResult<Self> {
        padded.check_dims(&guard, "guard width")?;
        if !guard.is_non_negative() {
            return Err(StratusError::InvalidConfig(format!(
                "Guard width must be non-negative, got {guard}"
            )));
        }
        if components == 0 || components > MAX_COMPONENTS {
            return Err(StratusError::InvalidConfig(format!(
                "Component count must be 1..={MAX_COMPONENTS}, got {components}"
            )));
        }
        for d in 0..padded.dims() {
            if padded[d] < 2 * guard[d] {
                return Err(StratusError::InvalidConfig(format!(
                    "Padded extent {padded} cannot hold guard {guard} on both sides"
                )));
            }
        }
        Ok(Self {
            padded,
            guard,
            components,
        })
    }

    /// Layout of an interior of `interior` cells surrounded by `guard` cells on every side.
    pub fn with_guard(interior: GridVec, guard: i64, components: usize) -> StratusResult<Self> {
        let guard = GridVec::splat(interior.dims(), guard);
        Self::new(interior + guard + guard, guard, components)
    }

    pub fn dims(&self) -> usize {
        self.padded.dims()
    }

    /// Interior (non-guard) extent.
    pub fn interior(&self) -> GridVec {
        self.padded - self.guard - self.guard
    }

    /// Number of elements a buffer with this layout holds.
    pub fn element_count(&self) -> usize {
        self.padded.cell_count() * self.components
    }
}
