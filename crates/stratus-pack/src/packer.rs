//! Strided extraction of one component.

use stratus_geometry::DomainGeometry;
use stratus_types::{Element, StratusError, StratusResult};

use crate::layout::SourceLayout;

/// Copies component `component` of the region `geometry` selects out of the
/// padded `src` into the front of `dest`, returning the number of cells
/// written.
///
/// Source cell of local coordinate `c` is `guard + local_offset + c` in the
/// padded shape; destination cell is `c` in the local extent. The region
/// must lie inside the interior; inconsistent layout/geometry pairs are
/// reported, never clamped.
pub fn pack<T: Element>(
    src: &[T],
    layout: &SourceLayout,
    geometry: &DomainGeometry,
    component: usize,
    dest: &mut [T],
) -> StratusResult<usize> {
    let size = geometry.local_size();
    let offset = geometry.local_offset();
    layout.padded.check_dims(&size, "packed region")?;

    if component >= layout.components {
        return Err(StratusError::Precondition(format!(
            "Component {component} requested from a {}-component layout",
            layout.components
        )));
    }
    if src.len() != layout.element_count() {
        return Err(StratusError::Precondition(format!(
            "Source holds {} elements, layout {} x {} needs {}",
            src.len(),
            layout.padded,
            layout.components,
            layout.element_count()
        )));
    }
    if !offset.is_non_negative() || !(offset + size).all_le(&layout.interior()) {
        return Err(StratusError::Precondition(format!(
            "Region {offset}+{size} exceeds interior {} of padded extent {}",
            layout.interior(),
            layout.padded
        )));
    }

    let cells = size.cell_count();
    if dest.len() < cells {
        return Err(StratusError::Precondition(format!(
            "Destination holds {} elements, region needs {cells}",
            dest.len()
        )));
    }
    if cells == 0 {
        return Ok(0);
    }

    let start = layout.guard + offset;
    let padded = layout.padded;
    let nx = size[0] as usize;
    let rows = cells / nx;

    // Walk rows of constant (y, z); x is contiguous in both buffers.
    for row in 0..rows {
        let (y, z) = if size.dims() == 3 {
            let ny = size[1] as usize;
            (row % ny, row / ny)
        } else {
            (row, 0)
        };

        let mut src_cell = (start[1] as usize + y) * padded[0] as usize;
        if size.dims() == 3 {
            src_cell += (start[2] as usize + z) * (padded[0] * padded[1]) as usize;
        }
        src_cell += start[0] as usize;

        let out = &mut dest[row * nx..(row + 1) * nx];
        for (x, slot) in out.iter_mut().enumerate() {
            *slot = src[(src_cell + x) * layout.components + component];
        }
    }

    Ok(cells)
}
