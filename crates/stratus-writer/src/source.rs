//! Field sources and the registry they are written from.
//!
//! A source hands the writer a host-resident padded buffer together with
//! its layout. Stored fields share their buffer with the simulation through
//! a [`SharedHostData`] handle; derived fields compute into a scratch
//! buffer in [`FieldSource::prepare`], right before they are packed.

use std::sync::Arc;

use parking_lot::RwLock;
use stratus_pack::SourceLayout;
use stratus_schema::naming;
use stratus_schema::FieldDescriptor;
use stratus_types::{DataType, StratusError, StratusResult};

/// Padded, component-interleaved host buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum HostData {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl HostData {
    /// Zero-filled buffer of `len` elements.
    pub fn zeros(dtype: DataType, len: usize) -> StratusResult<Self> {
        match dtype {
            DataType::F32 => Ok(Self::F32(vec![0.0; len])),
            DataType::F64 => Ok(Self::F64(vec![0.0; len])),
            other => Err(StratusError::InvalidConfig(format!(
                "Field buffers hold f32 or f64, not {}",
                other.name()
            ))),
        }
    }

    pub fn dtype(&self) -> DataType {
        match self {
            Self::F32(_) => DataType::F32,
            Self::F64(_) => DataType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Buffer shared between the simulation (writer side) and the output path
/// (reader side).
pub type SharedHostData = Arc<RwLock<HostData>>;

/// A field the writer can pack.
pub trait FieldSource: Send {
    /// Static description of the field.
    fn descriptor(&self) -> &FieldDescriptor;

    /// Layout of the buffer handed to [`FieldSource::with_data`].
    fn layout(&self) -> &SourceLayout;

    /// Brings the buffer up to date for `step`. Called once per cycle,
    /// before the field is packed.
    fn prepare(&mut self, _step: u32) -> StratusResult<()> {
        Ok(())
    }

    /// Runs `f` with read access to the buffer.
    fn with_data(
        &self,
        f: &mut dyn FnMut(&HostData) -> StratusResult<()>,
    ) -> StratusResult<()>;
}

fn check_buffer(descriptor: &FieldDescriptor, layout: &SourceLayout, data: &HostData) -> StratusResult<()> {
    if layout.components != descriptor.components() {
        return Err(StratusError::InvalidConfig(format!(
            "Field '{}' has {} components, its layout {}",
            descriptor.name(),
            descriptor.components(),
            layout.components
        )));
    }
    if data.dtype() != descriptor.dtype() {
        return Err(StratusError::InvalidConfig(format!(
            "Field '{}' is declared {}, its buffer holds {}",
            descriptor.name(),
            descriptor.dtype().name(),
            data.dtype().name()
        )));
    }
    if data.len() != layout.element_count() {
        return Err(StratusError::InvalidConfig(format!(
            "Field '{}' buffer holds {} elements, layout needs {}",
            descriptor.name(),
            data.len(),
            layout.element_count()
        )));
    }
    Ok(())
}

/// A field stored in a buffer the simulation writes into.
pub struct HostField {
    descriptor: FieldDescriptor,
    layout: SourceLayout,
    data: SharedHostData,
}

impl HostField {
    /// Allocates a zeroed buffer for the field.
    pub fn new(descriptor: FieldDescriptor, layout: SourceLayout) -> StratusResult<Self> {
        let data = HostData::zeros(descriptor.dtype(), layout.element_count())?;
        Self::from_data(descriptor, layout, data)
    }

    /// Wraps an existing buffer.
    pub fn from_data(
        descriptor: FieldDescriptor,
        layout: SourceLayout,
        data: HostData,
    ) -> StratusResult<Self> {
        check_buffer(&descriptor, &layout, &data)?;
        Ok(Self {
            descriptor,
            layout,
            data: Arc::new(RwLock::new(data)),
        })
    }

    /// Handle through which the simulation updates the buffer.
    pub fn handle(&self) -> SharedHostData {
        Arc::clone(&self.data)
    }
}

impl FieldSource for HostField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn layout(&self) -> &SourceLayout {
        &self.layout
    }

    fn prepare(&mut self, _step: u32) -> StratusResult<()> {
        // The simulation may have swapped in a buffer of another shape.
        check_buffer(&self.descriptor, &self.layout, &self.data.read())
    }

    fn with_data(
        &self,
        f: &mut dyn FnMut(&HostData) -> StratusResult<()>,
    ) -> StratusResult<()> {
        let data = self.data.read();
        f(&data)
    }
}

/// Computes a derived field for one step into a padded buffer.
pub type ComputeFn = Box<dyn FnMut(u32, &mut HostData) -> StratusResult<()> + Send>;

/// A field computed on demand for a solver and particle species.
pub struct DerivedField {
    descriptor: FieldDescriptor,
    layout: SourceLayout,
    scratch: HostData,
    compute: ComputeFn,
}

impl DerivedField {
    /// Creates a single-component derived field named `<solver>_<species>`.
    pub fn new(
        solver: &str,
        species: &str,
        dtype: DataType,
        unit: f64,
        layout: SourceLayout,
        compute: ComputeFn,
    ) -> StratusResult<Self> {
        let descriptor = FieldDescriptor::scalar(naming::derived_name(solver, species), dtype, unit)?;
        let scratch = HostData::zeros(dtype, layout.element_count())?;
        check_buffer(&descriptor, &layout, &scratch)?;
        Ok(Self {
            descriptor,
            layout,
            scratch,
            compute,
        })
    }
}

impl FieldSource for DerivedField {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn layout(&self) -> &SourceLayout {
        &self.layout
    }

    fn prepare(&mut self, step: u32) -> StratusResult<()> {
        (self.compute)(step, &mut self.scratch)?;
        check_buffer(&self.descriptor, &self.layout, &self.scratch)
    }

    fn with_data(
        &self,
        f: &mut dyn FnMut(&HostData) -> StratusResult<()>,
    ) -> StratusResult<()> {
        f(&self.scratch)
    }
}

/// Waits for pending compute work before a cycle reads any buffer.
pub type SyncBarrier = Box<dyn FnMut(u32) -> StratusResult<()> + Send>;

/// Ordered set of fields to write.
///
/// Registration order is declaration order and therefore identical on all
/// ranks as long as every rank registers the same fields in the same order.
#[derive(Default)]
pub struct FieldRegistry {
    sources: Vec<Box<dyn FieldSource>>,
    sync: Option<SyncBarrier>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field. Names must be unique.
    pub fn register(&mut self, source: Box<dyn FieldSource>) -> StratusResult<()> {
        let name = source.descriptor().name();
        if self.sources.iter().any(|s| s.descriptor().name() == name) {
            return Err(StratusError::InvalidConfig(format!(
                "Field '{name}' registered twice"
            )));
        }
        self.sources.push(source);
        Ok(())
    }

    /// Builder-style [`FieldRegistry::register`].
    pub fn with(mut self, source: Box<dyn FieldSource>) -> StratusResult<Self> {
        self.register(source)?;
        Ok(self)
    }

    /// Installs the hook run at the start of every cycle.
    pub fn set_sync_barrier(&mut self, sync: SyncBarrier) {
        self.sync = Some(sync);
    }

    /// Runs the sync hook, if any.
    pub fn synchronize(&mut self, step: u32) -> StratusResult<()> {
        match self.sync.as_mut() {
            Some(sync) => sync(step),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn descriptors(&self) -> Vec<&FieldDescriptor> {
        self.sources.iter().map(|s| s.descriptor()).collect()
    }

    /// Total components over all fields.
    pub fn component_count(&self) -> usize {
        self.sources.iter().map(|s| s.descriptor().components()).sum()
    }

    /// Largest element size over all fields.
    pub fn max_element_bytes(&self) -> usize {
        self.sources
            .iter()
            .map(|s| s.descriptor().dtype().byte_size())
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn sources_mut(&mut self) -> &mut [Box<dyn FieldSource>] {
        &mut self.sources
    }
}
