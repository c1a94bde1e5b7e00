//! Declaration phase of an output cycle.
//!
//! A [`SchemaBuilder`] declares, in a fixed order, the global scalars, one
//! axis triplet per dimension and every component of every field, pushing
//! each handle onto a [`HandleQueue`] and summing the bytes the write
//! phase will need. [`SchemaBuilder::finish`] consumes the builder, so no
//! declaration can follow the end of the phase.

use stratus_backend::{OutputBackend, VariableDecl};
use stratus_geometry::DomainGeometry;
use stratus_types::constants::{AXIS_VAR_BYTES, FIELD_META_BYTES, GLOBAL_SCALAR_BYTES};
use stratus_types::{DataType, GroupId, StratusError, StratusResult, VariableId};
use tracing::debug;

use crate::descriptor::FieldDescriptor;
use crate::naming;
use crate::queue::{AxisRole, Handle, HandleKind, HandleQueue};

/// Issues the declarations of one cycle against a backend.
pub struct SchemaBuilder<'a> {
    backend: &'a mut dyn OutputBackend,
    group_name: String,
    group: GroupId,
    geometry: DomainGeometry,
    queue: HandleQueue,
    total_bytes: u64,
}

impl<'a> SchemaBuilder<'a> {
    /// Declares the variable group and starts the byte total at the global
    /// scalar overhead.
    pub fn begin(
        backend: &'a mut dyn OutputBackend,
        group_name: &str,
        geometry: DomainGeometry,
    ) -> StratusResult<Self> {
        if group_name.is_empty() {
            return Err(StratusError::InvalidConfig("Variable group name is empty".into()));
        }
        let group = backend.declare_group(group_name)?;
        Ok(Self {
            backend,
            group_name: group_name.to_string(),
            group,
            geometry,
            queue: HandleQueue::new(),
            total_bytes: GLOBAL_SCALAR_BYTES,
        })
    }

    fn declare(&mut self, decl: VariableDecl, kind: HandleKind) -> StratusResult<VariableId> {
        let name = decl.name.clone();
        let id = self.backend.declare_variable(self.group, decl)?;
        self.queue.push(Handle { id, name, kind });
        Ok(id)
    }

    /// Declares a global scalar. Its bytes are part of the base overhead.
    pub fn declare_scalar(&mut self, name: &str, dtype: DataType) -> StratusResult<VariableId> {
        self.declare(VariableDecl::scalar(name, dtype), HandleKind::Scalar)
    }

    /// Declares the local size, global size and global offset variables of one axis.
    pub fn declare_axis_triplet(&mut self, axis: usize) -> StratusResult<[VariableId; 3]> {
        if axis >= self.geometry.dims() {
            return Err(StratusError::Protocol(format!(
                "Axis {axis} declared for a {}-dimensional geometry",
                self.geometry.dims()
            )));
        }
        let mut ids = [VariableId(0); 3];
        for (slot, role) in ids.iter_mut().zip(AxisRole::TRIPLET) {
            let decl = VariableDecl::scalar(naming::axis_var(role, axis), DataType::I32);
            *slot = self.declare(decl, HandleKind::Axis { axis, role })?;
            self.total_bytes += AXIS_VAR_BYTES;
        }
        Ok(ids)
    }

    /// Declares the axis triplet of every dimension, in axis order.
    pub fn declare_axes(&mut self) -> StratusResult<()> {
        for axis in 0..self.geometry.dims() {
            self.declare_axis_triplet(axis)?;
        }
        Ok(())
    }

    /// Declares one array per component of a field.
    ///
    /// `index` is the field's position in the registry and is recorded on
    /// each handle.
    pub fn declare_field(
        &mut self,
        index: usize,
        field: &FieldDescriptor,
    ) -> StratusResult<Vec<VariableId>> {
        let dims = self.geometry.dims();
        let local = naming::shape_expr(AxisRole::LocalSize, dims);
        let global = naming::shape_expr(AxisRole::GlobalSize, dims);
        let offset = naming::shape_expr(AxisRole::GlobalOffset, dims);
        let payload = self.geometry.local_cell_count() as u64 * field.element_bytes();

        let mut ids = Vec::with_capacity(field.components());
        for c in 0..field.components() {
            let name =
                naming::component_name(&self.group_name, field.name(), field.components(), c);
            let decl = VariableDecl::array(name, field.dtype(), &local, &global, &offset)
                .with_unit(field.unit(c));
            ids.push(self.declare(decl, HandleKind::Field { field: index, component: c })?);
            self.total_bytes += payload + FIELD_META_BYTES;
        }
        Ok(ids)
    }

    /// Declares a variable on behalf of auxiliary writer `writer`, charging
    /// `payload_bytes` to the reservation.
    pub fn declare_auxiliary(
        &mut self,
        writer: usize,
        decl: VariableDecl,
        payload_bytes: u64,
    ) -> StratusResult<VariableId> {
        let id = self.declare(decl, HandleKind::Auxiliary { writer })?;
        self.total_bytes += payload_bytes;
        Ok(id)
    }

    /// Geometry the declarations are made for.
    pub fn geometry(&self) -> &DomainGeometry {
        &self.geometry
    }

    /// Bytes accumulated so far.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Ends the declaration phase.
    pub fn finish(self) -> DeclaredSchema {
        debug!(
            group = %self.group_name,
            variables = self.queue.declared(),
            bytes = self.total_bytes,
            "declarations complete"
        );
        DeclaredSchema {
            group: self.group,
            queue: self.queue,
            total_bytes: self.total_bytes,
        }
    }
}

/// Result of a finished declaration phase.
#[derive(Debug)]
pub struct DeclaredSchema {
    pub group: GroupId,
    pub queue: HandleQueue,
    pub total_bytes: u64,
}

impl DeclaredSchema {
    /// Number of declared variables.
    pub fn variable_count(&self) -> usize {
        self.queue.declared()
    }
}
