//! Deterministic domain decomposition over a regular rank grid.

use serde::{Deserialize, Serialize};
use stratus_types::constants::SLIDING_AXIS;
use stratus_types::{GridVec, StratusError, StratusResult};

/// The sub-domain owned by one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankDomain {
    /// Linear rank index (x fastest).
    pub rank: usize,
    /// Position of the rank in the rank grid.
    pub grid_index: GridVec,
    /// Start of the rank's non-guard cells in the simulation box.
    pub grid_position: GridVec,
    /// Non-guard extent of the rank's buffer.
    pub local_size: GridVec,
    /// True for the last row of ranks along the sliding axis.
    pub is_bottom: bool,
}

/// Splits `global` cells over `ranks_per_axis` ranks.
///
/// Remainder cells go to the lowest rank indices along each axis.
pub fn decompose(global: GridVec, ranks_per_axis: GridVec) -> StratusResult<Vec<RankDomain>> {
    global.check_dims(&ranks_per_axis, "decomposition")?;
    let dims = global.dims();

    for d in 0..dims {
        if ranks_per_axis[d] < 1 {
            return Err(StratusError::InvalidConfig(format!(
                "Need at least one rank per axis, got {ranks_per_axis}"
            )));
        }
        if global[d] < ranks_per_axis[d] {
            return Err(StratusError::InvalidConfig(format!(
                "Cannot split {} cells across {} ranks on axis {d}",
                global[d], ranks_per_axis[d]
            )));
        }
    }

    // Per-axis (start, size) of each slab.
    let slabs: Vec<Vec<(i64, i64)>> = (0..dims)
        .map(|d| {
            let n = ranks_per_axis[d];
            let base = global[d] / n;
            let rem = global[d] % n;
            let mut cursor = 0;
            (0..n)
                .map(|i| {
                    let size = base + i64::from(i < rem);
                    let start = cursor;
                    cursor += size;
                    (start, size)
                })
                .collect()
        })
        .collect();

    let total = ranks_per_axis.product() as usize;
    let mut out = Vec::with_capacity(total);
    for rank in 0..total {
        let mut index = GridVec::zeros(dims);
        let mut rest = rank as i64;
        for d in 0..dims {
            index[d] = rest % ranks_per_axis[d];
            rest /= ranks_per_axis[d];
        }

        let mut position = GridVec::zeros(dims);
        let mut size = GridVec::zeros(dims);
        for d in 0..dims {
            let (start, len) = slabs[d][index[d] as usize];
            position[d] = start;
            size[d] = len;
        }

        out.push(RankDomain {
            rank,
            grid_index: index,
            grid_position: position,
            local_size: size,
            is_bottom: index[SLIDING_AXIS] == ranks_per_axis[SLIDING_AXIS] - 1,
        });
    }

    Ok(out)
}
