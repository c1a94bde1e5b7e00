//! Synthetic multi-rank run.
//!
//! Each rank is a thread with its own [`FieldWriter`] over a
//! [`ContainerBackend`]; the ranks meet in the backend's collective calls.
//! Field buffers are filled with a deterministic function of the global
//! cell position, component and step so written files can be checked.

use std::thread;

use stratus_backend::{ContainerBackend, LocalComm, LocalGroup};
use stratus_geometry::{decompose, RankDomain, SlidingWindow, StaticWindow, WindowSource};
use stratus_pack::SourceLayout;
use stratus_schema::FieldDescriptor;
use stratus_telemetry::TracingSink;
use stratus_types::{DataType, GridVec, StratusError, StratusResult};
use stratus_writer::{
    CycleReport, DerivedField, FieldRegistry, FieldSegmentWriter, FieldWriter, HostData,
    HostField, SharedHostData,
};
use tracing::{debug, info};

use crate::config::RunConfig;

/// Runs the configured simulation and returns rank 0's cycle reports.
pub fn run(config: &RunConfig) -> StratusResult<Vec<CycleReport>> {
    config.validate()?;
    let domains = decompose(config.global_grid()?, config.rank_grid()?)?;
    let comms = LocalGroup::new(domains.len())?;
    info!(
        ranks = domains.len(),
        steps = config.steps,
        period = config.writer.period,
        "starting run"
    );

    let handles: Vec<_> = domains
        .into_iter()
        .zip(comms)
        .map(|(domain, comm)| {
            let config = config.clone();
            thread::spawn(move || run_rank(&config, domain, comm))
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let result = handle
            .join()
            .map_err(|_| StratusError::backend("run", "rank thread panicked"))?;
        results.push(result);
    }

    let mut root = Vec::new();
    for (rank, result) in results.into_iter().enumerate() {
        let reports = result?;
        if rank == 0 {
            root = reports;
        }
    }
    Ok(root)
}

/// A stored field buffer updated by the simulation each step.
struct Stored {
    data: SharedHostData,
    layout: SourceLayout,
    seed: f64,
}

fn run_rank(config: &RunConfig, domain: RankDomain, comm: LocalComm) -> StratusResult<Vec<CycleReport>> {
    let global = config.global_grid()?;
    let origin = domain.grid_position;

    let window: Box<dyn WindowSource> = if config.window.sliding {
        Box::new(SlidingWindow::new(
            domain,
            global,
            config.window.hidden_cells,
            config.window.slide_period,
        ))
    } else {
        Box::new(StaticWindow::new(domain, global))
    };

    let mut registry = FieldRegistry::new();
    let mut stored = Vec::new();
    let mut segments = Vec::new();

    for (k, field) in config.fields.iter().enumerate() {
        let layout = SourceLayout::with_guard(domain.local_size, config.guard, field.components)?;
        let descriptor =
            FieldDescriptor::new(field.name.as_str(), field.dtype, vec![field.unit; field.components])?;
        let host = HostField::new(descriptor.clone(), layout)?;
        if config.window.sliding && config.window.ghost_output {
            segments.push(FieldSegmentWriter::new(descriptor, layout, host.handle()));
        }
        stored.push(Stored {
            data: host.handle(),
            layout,
            seed: k as f64,
        });
        registry.register(Box::new(host))?;
    }

    for (k, derived) in config.derived.iter().enumerate() {
        let layout = SourceLayout::with_guard(domain.local_size, config.guard, 1)?;
        let seed = 100.0 + k as f64;
        let compute = Box::new(move |step: u32, buf: &mut HostData| -> StratusResult<()> {
            fill_synthetic(buf, &layout, origin, step, seed);
            Ok(())
        });
        let field = DerivedField::new(
            &derived.solver,
            &derived.species,
            DataType::F32,
            derived.unit,
            layout,
            compute,
        )?;
        registry.register(Box::new(field))?;
    }

    let backend = ContainerBackend::new(Box::new(comm));
    let mut writer = FieldWriter::new(config.writer.clone(), Box::new(backend), window, registry)?;
    if domain.rank == 0 {
        writer.add_sink(Box::new(TracingSink));
    }
    for segment in segments {
        writer.add_auxiliary(Box::new(segment));
    }

    writer.load()?;
    let mut reports = Vec::new();
    for step in 0..=config.steps {
        for field in &stored {
            fill_synthetic(&mut field.data.write(), &field.layout, origin, step, field.seed);
        }
        if writer.should_notify(step) {
            let report = writer.notify(step)?;
            debug!(rank = domain.rank, step, path = %report.path.display(), "step written");
            reports.push(report);
        }
    }
    writer.unload()?;
    Ok(reports)
}

/// Value stored for a cell: a function of its global position, component,
/// step and field seed.
pub fn synthetic_value(position: &[i64], component: usize, step: u32, seed: f64) -> f64 {
    let spatial: f64 = position
        .iter()
        .enumerate()
        .map(|(d, &p)| p as f64 * 10f64.powi(d as i32 * 3))
        .sum();
    seed * 1.0e6 + spatial + component as f64 * 0.25 + step as f64 * 0.5
}

/// Fills every cell of a padded buffer, guard cells included.
fn fill_synthetic(buf: &mut HostData, layout: &SourceLayout, origin: GridVec, step: u32, seed: f64) {
    let cells = layout.padded.cell_count();
    let dims = layout.dims();
    let mut position = vec![0i64; dims];

    for cell in 0..cells {
        let mut rest = cell as i64;
        for d in 0..dims {
            let extent = layout.padded[d];
            position[d] = origin[d] + rest % extent - layout.guard[d];
            rest /= extent;
        }
        for c in 0..layout.components {
            let value = synthetic_value(&position, c, step, seed);
            let index = cell * layout.components + c;
            match buf {
                HostData::F32(v) => v[index] = value as f32,
                HostData::F64(v) => v[index] = value,
            }
        }
    }
}
