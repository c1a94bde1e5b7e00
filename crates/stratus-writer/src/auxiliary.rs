//! Outputs written over the ghost segment of a sliding window.
//!
//! Particle-oriented writers live outside this crate; they plug into the
//! ghost pass through [`AuxiliaryWriter`]. [`FieldSegmentWriter`] is the
//! in-crate implementation: it dumps the hidden cells of a stored field.

use stratus_backend::VariableDecl;
use stratus_geometry::DomainGeometry;
use stratus_pack::{pack, SourceLayout};
use stratus_schema::naming;
use stratus_schema::{AxisRole, FieldDescriptor};
use stratus_types::{Element, StratusError, StratusResult};

use crate::source::{HostData, SharedHostData};

/// A writer that contributes variables to the ghost pass.
///
/// Within one pass the writer is asked for its declarations once, then
/// for the payload of each declaration in the same order.
pub trait AuxiliaryWriter: Send {
    fn name(&self) -> &str;

    /// Variables to declare for `geometry`, with the payload bytes each
    /// will need on this rank.
    fn declarations(
        &mut self,
        group: &str,
        geometry: &DomainGeometry,
    ) -> StratusResult<Vec<(VariableDecl, u64)>>;

    /// Payload of the `index`-th declaration.
    fn payload(&mut self, index: usize, geometry: &DomainGeometry) -> StratusResult<Vec<u8>>;
}

/// Writes the ghost-segment cells of a stored field.
pub struct FieldSegmentWriter {
    descriptor: FieldDescriptor,
    layout: SourceLayout,
    data: SharedHostData,
}

impl FieldSegmentWriter {
    pub fn new(descriptor: FieldDescriptor, layout: SourceLayout, data: SharedHostData) -> Self {
        Self {
            descriptor,
            layout,
            data,
        }
    }
}

fn pack_bytes<T: Element + Default>(
    src: &[T],
    layout: &SourceLayout,
    geometry: &DomainGeometry,
    component: usize,
) -> StratusResult<Vec<u8>> {
    let mut out = vec![T::default(); geometry.local_cell_count()];
    pack(src, layout, geometry, component, &mut out)?;
    Ok(bytemuck::cast_slice(&out).to_vec())
}

impl AuxiliaryWriter for FieldSegmentWriter {
    fn name(&self) -> &str {
        self.descriptor.name()
    }

    fn declarations(
        &mut self,
        group: &str,
        geometry: &DomainGeometry,
    ) -> StratusResult<Vec<(VariableDecl, u64)>> {
        let dims = geometry.dims();
        let local = naming::shape_expr(AxisRole::LocalSize, dims);
        let global = naming::shape_expr(AxisRole::GlobalSize, dims);
        let offset = naming::shape_expr(AxisRole::GlobalOffset, dims);
        let bytes = geometry.local_cell_count() as u64 * self.descriptor.element_bytes();

        let components = self.descriptor.components();
        Ok((0..components)
            .map(|c| {
                let name = naming::component_name(group, self.descriptor.name(), components, c);
                let decl = VariableDecl::array(name, self.descriptor.dtype(), &local, &global, &offset)
                    .with_unit(self.descriptor.unit(c));
                (decl, bytes)
            })
            .collect())
    }

    fn payload(&mut self, index: usize, geometry: &DomainGeometry) -> StratusResult<Vec<u8>> {
        if index >= self.descriptor.components() {
            return Err(StratusError::Protocol(format!(
                "Segment writer '{}' asked for payload {index} of {}",
                self.descriptor.name(),
                self.descriptor.components()
            )));
        }
        match &*self.data.read() {
            HostData::F32(v) => pack_bytes(v, &self.layout, geometry, index),
            HostData::F64(v) => pack_bytes(v, &self.layout, geometry, index),
        }
    }
}
