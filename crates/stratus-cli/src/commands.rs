//! CLI command implementations.

use std::path::Path;

use stratus_backend::{Container, StoredVariable};
use stratus_cli::{driver, RunConfig};
use stratus_types::{DataType, ScalarValue};

/// Run a synthetic simulation from a config file.
pub fn run(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("Stratus Run");
    println!("───────────");
    println!("Config: {config_path}");
    println!();

    let config = RunConfig::load(Path::new(config_path))?;
    println!("Grid:     {:?} over {:?} ranks", config.global, config.ranks);
    println!("Steps:    0..={} (output every {})", config.steps, config.writer.period);
    println!(
        "Fields:   {} stored, {} derived",
        config.fields.len(),
        config.derived.len()
    );
    if config.window.sliding {
        println!(
            "Window:   sliding, {} hidden cells, slide every {} steps",
            config.window.hidden_cells, config.window.slide_period
        );
    }
    println!();

    let reports = driver::run(&config)?;
    for report in &reports {
        println!(
            "  step {:>6}  {:<40} {:>4} vars  {:>10} B declared  {:>10} B reserved",
            report.iteration,
            report.path.display(),
            report.variables,
            report.declared_bytes,
            report.reserved_bytes
        );
        if let Some(ghost) = &report.ghost {
            println!(
                "  {:>11}  {:<40} {:>4} vars  {:>10} B declared",
                "ghosts",
                ghost.path.display(),
                ghost.variables,
                ghost.declared_bytes
            );
        }
    }
    println!();
    println!("{} output step(s) written.", reports.len());
    Ok(())
}

/// Inspect a container file.
pub fn inspect(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("Stratus Container Inspector");
    println!("───────────────────────────");
    println!();

    let container = Container::read(Path::new(path))
        .map_err(|e| format!("Failed to read container: {e}"))?;

    println!("Group:      {}", container.group);
    println!("Ranks:      {}", container.ranks);
    for (name, value) in &container.scalars {
        println!("{:<11} {}", format!("{name}:"), format_scalar(value));
    }
    println!("Variables:  {}", container.variables.len());
    println!();

    for var in &container.variables {
        println!(
            "  {:<28} {:<4} shape {:?}  blocks {}{}",
            var.name(),
            var.dtype().name(),
            var.global_shape,
            var.blocks.len(),
            var.decl
                .unit
                .map(|u| format!("  unit {u:e}"))
                .unwrap_or_default()
        );
        if let Some((min, max)) = value_range(&container, var)? {
            println!("  {:<28} range [{min:.4}, {max:.4}]", "");
        }
    }

    Ok(())
}

/// Validate a run config or a container file.
pub fn validate(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("Stratus Validator");
    println!("─────────────────");
    println!();

    if path.ends_with(".toml") {
        println!("Validating config: {path}");
        match RunConfig::load(Path::new(path)) {
            Ok(config) => println!(
                "✅ Config is valid ({} ranks, {} fields).",
                config.rank_count()?,
                config.fields.len() + config.derived.len()
            ),
            Err(e) => println!("❌ Config validation failed: {e}"),
        }
    } else {
        println!("Validating container: {path}");
        match Container::read(Path::new(path)) {
            Ok(container) => println!(
                "✅ Container is valid ({} variables from {} ranks).",
                container.variables.len(),
                container.ranks
            ),
            Err(e) => println!("❌ Container validation failed: {e}"),
        }
    }

    Ok(())
}

fn format_scalar(value: &ScalarValue) -> String {
    match value {
        ScalarValue::U32(v) => v.to_string(),
        ScalarValue::I32(v) => v.to_string(),
        ScalarValue::F64(v) => format!("{v:e}"),
    }
}

/// Min and max of a floating point array, `None` for other variables.
fn value_range(
    container: &Container,
    var: &StoredVariable,
) -> Result<Option<(f64, f64)>, Box<dyn std::error::Error>> {
    if var.decl.is_scalar() {
        return Ok(None);
    }
    let values: Vec<f64> = match var.dtype() {
        DataType::F32 => container
            .assemble::<f32>(var.name())?
            .into_iter()
            .map(f64::from)
            .collect(),
        DataType::F64 => container.assemble::<f64>(var.name())?,
        DataType::I32 | DataType::U32 => return Ok(None),
    };
    if values.is_empty() {
        return Ok(None);
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(Some((min, max)))
}
