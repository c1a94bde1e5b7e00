//! Write-cycle orchestration.
//!
//! One cycle per notified step:
//!
//! ```text
//! Idle -> Declaring -> Opened -> Writing -> Closed -> Idle
//! ```
//!
//! Declaring issues every declaration and sums the bytes to reserve;
//! Opened creates `<prefix>_<iteration>.<ext>`; Writing reserves, writes
//! the global scalars, the axis triplets and each field component through
//! the next handle of the queue; Closed closes the target and waits on the
//! collective barrier. With a sliding window and registered auxiliary
//! writers, the same sequence runs again over the ghost segment into
//! `<prefix>_<iteration>_ghosts.<ext>`.
//!
//! Every rank runs every phase, writing zero-length payloads where it owns
//! no cells. Local failures during declaration are combined across ranks
//! before the target is opened; a rank failing while writing aborts its
//! part of the collective close. Either way the cycle fails on every rank,
//! leaves no file behind, and the next cycle starts clean.

use std::path::PathBuf;

use stratus_backend::OutputBackend;
use stratus_geometry::{resolve_ghost, resolve_primary, DomainGeometry, WindowSource, WindowState};
use stratus_pack::{pack, SourceLayout, StagingBuffer};
use stratus_schema::naming;
use stratus_schema::{AxisRole, SchemaBuilder};
use stratus_telemetry::{CycleEvent, EventBus, EventKind, EventSink, Pass};
use stratus_types::constants::{GHOST_SUFFIX, INITIAL_BUFFER_MB, ITERATION_VAR, SLIDES_VAR};
use stratus_types::{
    DataType, Element, FileId, ScalarValue, StratusError, StratusResult, VariableId,
};
use tracing::{debug, info, warn};

use crate::auxiliary::AuxiliaryWriter;
use crate::config::WriterConfig;
use crate::context::WriteContext;
use crate::source::{FieldRegistry, HostData};

/// Where a cycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Declaring,
    Opened,
    Writing,
    Closed,
}

/// Outcome of one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub path: PathBuf,
    /// Bytes requested from the backend.
    pub declared_bytes: u64,
    /// Bytes the backend granted.
    pub reserved_bytes: u64,
    /// Declared variables.
    pub variables: usize,
}

/// Outcome of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub iteration: u32,
    pub path: PathBuf,
    pub declared_bytes: u64,
    pub reserved_bytes: u64,
    pub variables: usize,
    /// Ghost pass, when one ran.
    pub ghost: Option<PassReport>,
}

/// Periodic collective field writer.
///
/// Collaborators (backend, window source, fields) are handed over at
/// construction and owned by the writer for its lifetime.
pub struct FieldWriter {
    config: WriterConfig,
    backend: Box<dyn OutputBackend>,
    window: Box<dyn WindowSource>,
    registry: FieldRegistry,
    auxiliaries: Vec<Box<dyn AuxiliaryWriter>>,
    bus: EventBus,
    phase: CyclePhase,
    loaded: bool,
}

impl FieldWriter {
    pub fn new(
        config: WriterConfig,
        backend: Box<dyn OutputBackend>,
        window: Box<dyn WindowSource>,
        registry: FieldRegistry,
    ) -> StratusResult<Self> {
        config.validate()?;
        let mut bus = EventBus::new();
        bus.set_enabled(config.is_enabled());
        Ok(Self {
            config,
            backend,
            window,
            registry,
            auxiliaries: Vec::new(),
            bus,
            phase: CyclePhase::Idle,
            loaded: false,
        })
    }

    /// Registers a writer for the ghost pass.
    pub fn add_auxiliary(&mut self, writer: Box<dyn AuxiliaryWriter>) {
        self.auxiliaries.push(writer);
    }

    /// Registers a telemetry sink.
    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.bus.add_sink(sink);
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Initializes the backend. Does nothing when output is disabled.
    pub fn load(&mut self) -> StratusResult<()> {
        if !self.config.is_enabled() {
            info!("field output disabled (period 0)");
            return Ok(());
        }
        if self.loaded {
            return Ok(());
        }
        self.backend.init(INITIAL_BUFFER_MB)?;
        self.loaded = true;
        info!(
            rank = self.backend.rank(),
            ranks = self.backend.size(),
            backend = self.backend.name(),
            period = self.config.period,
            fields = self.registry.len(),
            sinks = self.bus.sink_count(),
            "field writer loaded"
        );
        Ok(())
    }

    /// Finalizes the backend and flushes telemetry.
    pub fn unload(&mut self) -> StratusResult<()> {
        if self.loaded {
            self.loaded = false;
            self.backend.finalize()?;
        }
        self.bus.finalize();
        Ok(())
    }

    /// Whether `step` is an output step.
    pub fn should_notify(&self, step: u32) -> bool {
        self.config.is_output_step(step)
    }

    /// Runs one output cycle for `step`.
    pub fn notify(&mut self, step: u32) -> StratusResult<CycleReport> {
        if !self.loaded {
            return Err(StratusError::Protocol(
                "notify called on a writer that is not loaded".into(),
            ));
        }
        if self.phase != CyclePhase::Idle {
            return Err(StratusError::Protocol(format!(
                "notify called while a cycle is in phase {:?}",
                self.phase
            )));
        }

        let result = self.run_cycle(step);
        if let Err(e) = &result {
            warn!(iteration = step, rank = self.backend.rank(), error = %e, "output cycle failed");
            self.emit(step, EventKind::CycleFailed { error: e.to_string() });
        }
        self.phase = CyclePhase::Idle;
        self.bus.flush();
        result
    }

    fn emit(&self, iteration: u32, kind: EventKind) {
        self.bus
            .emit(CycleEvent::new(iteration, self.backend.rank(), kind));
    }

    fn run_cycle(&mut self, step: u32) -> StratusResult<CycleReport> {
        let window = self.window.window(step);
        let iteration = window.iteration;
        self.emit(
            iteration,
            EventKind::CycleBegin {
                sliding: window.sliding_active,
            },
        );

        let geometry = self
            .registry
            .synchronize(step)
            .and_then(|()| resolve_primary(&window, self.window.rank_offset()));
        let primary_geometry = geometry.as_ref().ok().copied();
        let primary = self.run_pass(Pass::Primary, &window, geometry)?;

        let mut ghost = None;
        let ghost_due = window.sliding_active && !self.auxiliaries.is_empty();
        if let Some(geometry) = primary_geometry.filter(|_| ghost_due) {
            if let Some(ghost_geometry) = resolve_ghost(&window, &geometry).transpose() {
                if let Ok(g) = &ghost_geometry {
                    self.emit(
                        iteration,
                        EventKind::GhostPass {
                            writers: self.auxiliaries.len(),
                            local_cells: g.local_cell_count(),
                        },
                    );
                }
                ghost = Some(self.run_pass(Pass::Ghost, &window, ghost_geometry)?);
            }
        }

        self.emit(
            iteration,
            EventKind::CycleEnd {
                variables: primary.variables,
                declared_bytes: primary.declared_bytes,
            },
        );
        info!(
            iteration,
            rank = self.backend.rank(),
            file = %primary.path.display(),
            bytes = primary.declared_bytes,
            ghost = ghost.is_some(),
            "output cycle complete"
        );

        Ok(CycleReport {
            iteration,
            path: primary.path,
            declared_bytes: primary.declared_bytes,
            reserved_bytes: primary.reserved_bytes,
            variables: primary.variables,
            ghost,
        })
    }

    /// Runs one pass. Every rank takes part in each collective call even
    /// when its own part failed, so a local failure reaches all ranks.
    fn run_pass(
        &mut self,
        pass: Pass,
        window: &WindowState,
        geometry: StratusResult<DomainGeometry>,
    ) -> StratusResult<PassReport> {
        self.phase = CyclePhase::Declaring;
        let declared = geometry.and_then(|g| self.declare_pass(pass, window.iteration, g));
        let agreed = self
            .backend
            .agree("declare", declared.as_ref().err().map(ToString::to_string));
        let (mut ctx, aux_names) = declared?;
        agreed?;

        self.phase = CyclePhase::Opened;
        let file = self.backend.open(ctx.schema.group, &ctx.path)?;
        ctx.file = Some(file);

        self.phase = CyclePhase::Writing;
        let reserved = match self.write_pass(&mut ctx, file, window, &aux_names) {
            Ok(reserved) => reserved,
            Err(e) => {
                warn!(
                    iteration = ctx.iteration,
                    rank = self.backend.rank(),
                    file = %ctx.path.display(),
                    error = %e,
                    "discarding target"
                );
                self.backend.abort(file, &e.to_string())?;
                return Err(e);
            }
        };

        self.phase = CyclePhase::Closed;
        self.backend.close(file)?;
        self.backend.barrier()?;

        Ok(PassReport {
            path: ctx.path,
            declared_bytes: ctx.schema.total_bytes,
            reserved_bytes: reserved,
            variables: ctx.schema.variable_count(),
        })
    }

    /// Declares every variable of the pass. Purely local.
    fn declare_pass(
        &mut self,
        pass: Pass,
        iteration: u32,
        geometry: DomainGeometry,
    ) -> StratusResult<(WriteContext, Vec<Vec<String>>)> {
        let mut builder = SchemaBuilder::begin(self.backend.as_mut(), &self.config.group, geometry)?;
        builder.declare_scalar(ITERATION_VAR, DataType::U32)?;
        builder.declare_scalar(SLIDES_VAR, DataType::U32)?;
        builder.declare_axes()?;

        let mut aux_names: Vec<Vec<String>> = Vec::new();
        match pass {
            Pass::Primary => {
                for (i, source) in self.registry.sources_mut().iter().enumerate() {
                    builder.declare_field(i, source.descriptor())?;
                }
            }
            Pass::Ghost => {
                for (w, aux) in self.auxiliaries.iter_mut().enumerate() {
                    let decls = aux.declarations(&self.config.group, &geometry)?;
                    aux_names.push(decls.iter().map(|(d, _)| d.name.clone()).collect());
                    for (decl, bytes) in decls {
                        builder.declare_auxiliary(w, decl, bytes)?;
                    }
                }
            }
        }
        let schema = builder.finish();

        let suffix = match pass {
            Pass::Primary => "",
            Pass::Ghost => GHOST_SUFFIX,
        };
        let path = PathBuf::from(naming::file_name(
            &self.config.file_prefix,
            iteration,
            suffix,
            self.backend.extension(),
        ));
        self.emit(
            iteration,
            EventKind::VariablesDeclared {
                pass,
                variables: schema.variable_count(),
                bytes: schema.total_bytes,
            },
        );
        let ctx = WriteContext::new(
            iteration,
            pass,
            geometry,
            schema,
            path,
            self.config.validate_declarations,
        );
        Ok((ctx, aux_names))
    }

    /// Reserves and writes every declared variable; returns the granted size.
    fn write_pass(
        &mut self,
        ctx: &mut WriteContext,
        file: FileId,
        window: &WindowState,
        aux_names: &[Vec<String>],
    ) -> StratusResult<u64> {
        let reserved = self.backend.reserve(file, ctx.declared_bytes())?;
        self.emit(
            ctx.iteration,
            EventKind::FileOpened {
                pass: ctx.pass,
                path: ctx.path.display().to_string(),
                reserved_bytes: reserved,
            },
        );
        debug!(
            iteration = ctx.iteration,
            file = %ctx.path.display(),
            requested = ctx.declared_bytes(),
            reserved,
            "target opened"
        );

        self.write_scalars(ctx, file, window)?;
        self.write_axes(ctx, file)?;
        match ctx.pass {
            Pass::Primary => self.write_fields(ctx, file)?,
            Pass::Ghost => self.write_auxiliaries(ctx, file, aux_names)?,
        }
        ctx.finish()?;
        Ok(reserved)
    }

    fn write_scalars(
        &mut self,
        ctx: &mut WriteContext,
        file: FileId,
        window: &WindowState,
    ) -> StratusResult<()> {
        // Scalars hold a queue slot but are written by name.
        ctx.next_handle(ITERATION_VAR)?;
        self.backend
            .write_scalar(file, ITERATION_VAR, ScalarValue::U32(window.iteration))?;
        ctx.next_handle(SLIDES_VAR)?;
        self.backend
            .write_scalar(file, SLIDES_VAR, ScalarValue::U32(window.slides))
    }

    fn write_axes(&mut self, ctx: &mut WriteContext, file: FileId) -> StratusResult<()> {
        let geometry = ctx.geometry;
        let written_offset = geometry.written_offset();
        for axis in 0..geometry.dims() {
            for role in AxisRole::TRIPLET {
                let value = match role {
                    AxisRole::LocalSize => geometry.local_size()[axis],
                    AxisRole::GlobalSize => geometry.global_size()[axis],
                    AxisRole::GlobalOffset => written_offset[axis],
                };
                let name = naming::axis_var(role, axis);
                let value = i32::try_from(value).map_err(|_| {
                    StratusError::InvalidConfig(format!("'{name}' = {value} does not fit in i32"))
                })?;
                let handle = ctx.next_handle(&name)?;
                self.backend
                    .write_by_id(file, handle.id, bytemuck::bytes_of(&value))?;
            }
        }
        Ok(())
    }

    fn write_fields(&mut self, ctx: &mut WriteContext, file: FileId) -> StratusResult<()> {
        let cells = ctx.geometry.local_cell_count();
        ctx.staging.ensure(cells, self.registry.max_element_bytes());

        let group = self.config.group.as_str();
        let rank = self.backend.rank();
        let backend = self.backend.as_mut();
        let bus = &self.bus;

        for source in self.registry.sources_mut() {
            source.prepare(ctx.iteration)?;
            let descriptor = source.descriptor().clone();
            let layout = *source.layout();
            let components = descriptor.components();

            source.with_data(&mut |data| {
                if data.dtype() != descriptor.dtype() {
                    return Err(StratusError::Precondition(format!(
                        "Field '{}' buffer holds {}, declared {}",
                        descriptor.name(),
                        data.dtype().name(),
                        descriptor.dtype().name()
                    )));
                }
                for c in 0..components {
                    let name = naming::component_name(group, descriptor.name(), components, c);
                    let handle = ctx.next_handle(&name)?;
                    let target = Target {
                        file,
                        var: handle.id,
                        layout: &layout,
                        geometry: &ctx.geometry,
                        component: c,
                    };
                    let written = match data {
                        HostData::F32(v) => stage_and_write(&mut *backend, &mut ctx.staging, v, &target)?,
                        HostData::F64(v) => stage_and_write(&mut *backend, &mut ctx.staging, v, &target)?,
                    };
                    bus.emit(CycleEvent::new(
                        ctx.iteration,
                        rank,
                        EventKind::FieldWritten {
                            name,
                            cells: written,
                        },
                    ));
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    fn write_auxiliaries(
        &mut self,
        ctx: &mut WriteContext,
        file: FileId,
        names: &[Vec<String>],
    ) -> StratusResult<()> {
        for (aux, names) in self.auxiliaries.iter_mut().zip(names) {
            for (k, name) in names.iter().enumerate() {
                let handle = ctx.next_handle(name)?;
                let payload = aux.payload(k, &ctx.geometry)?;
                self.backend.write_by_id(file, handle.id, &payload)?;
            }
            debug!(writer = aux.name(), variables = names.len(), "auxiliary output written");
        }
        Ok(())
    }
}

/// Where one packed component goes.
struct Target<'a> {
    file: FileId,
    var: VariableId,
    layout: &'a SourceLayout,
    geometry: &'a DomainGeometry,
    component: usize,
}

/// Packs one component into the staging buffer and writes it.
fn stage_and_write<T: Element>(
    backend: &mut dyn OutputBackend,
    staging: &mut StagingBuffer,
    src: &[T],
    target: &Target<'_>,
) -> StratusResult<usize> {
    let cells = target.geometry.local_cell_count();
    let view = staging.slice_mut::<T>(cells)?;
    pack(src, target.layout, target.geometry, target.component, view)?;
    backend.write_by_id(target.file, target.var, staging.bytes::<T>(cells)?)?;
    Ok(cells)
}
