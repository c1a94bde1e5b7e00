//! Run configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stratus_geometry::decompose;
use stratus_schema::FieldDescriptor;
use stratus_types::constants::SLIDING_AXIS;
use stratus_types::{DataType, GridVec, StratusError, StratusResult};
use stratus_writer::WriterConfig;

/// Configuration of a synthetic run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Last step; steps `0..=steps` are simulated.
    pub steps: u32,

    /// Global grid extent, 2 or 3 entries.
    pub global: Vec<i64>,

    /// Ranks per axis; same length as `global`.
    pub ranks: Vec<i64>,

    /// Guard cells on every side of each rank's buffer.
    pub guard: i64,

    pub window: WindowConfig,
    pub writer: WriterConfig,
    pub fields: Vec<FieldConfig>,
    pub derived: Vec<DerivedConfig>,
}

/// Moving-window settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub sliding: bool,
    /// Cells at the end of the sliding axis kept out of the visible window.
    pub hidden_cells: i64,
    /// Steps per slide; 0 never slides.
    pub slide_period: u32,
    /// Write the hidden segment of every stored field in a ghost pass.
    pub ghost_output: bool,
}

/// A stored field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(default = "one")]
    pub components: usize,
    #[serde(default = "default_dtype")]
    pub dtype: DataType,
    #[serde(default = "unit")]
    pub unit: f64,
}

/// A derived field computed per species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedConfig {
    pub solver: String,
    pub species: String,
    #[serde(default = "unit")]
    pub unit: f64,
}

fn one() -> usize {
    1
}

fn unit() -> f64 {
    1.0
}

fn default_dtype() -> DataType {
    DataType::F32
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            steps: 4,
            global: vec![64, 64],
            ranks: vec![2, 1],
            guard: 1,
            window: WindowConfig::default(),
            writer: WriterConfig::every(1),
            fields: vec![
                FieldConfig {
                    name: "E".into(),
                    components: 3,
                    dtype: DataType::F32,
                    unit: 1.0,
                },
                FieldConfig {
                    name: "rho".into(),
                    components: 1,
                    dtype: DataType::F32,
                    unit: 1.0,
                },
            ],
            derived: Vec::new(),
        }
    }
}

impl RunConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> StratusResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| StratusError::InvalidConfig(format!("Run config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    pub fn load(path: &Path) -> StratusResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn global_grid(&self) -> StratusResult<GridVec> {
        GridVec::from_slice(&self.global)
    }

    pub fn rank_grid(&self) -> StratusResult<GridVec> {
        GridVec::from_slice(&self.ranks)
    }

    /// Total number of ranks.
    pub fn rank_count(&self) -> StratusResult<usize> {
        Ok(self.rank_grid()?.product().max(0) as usize)
    }

    /// Checks that the grid decomposes and every field is well formed.
    pub fn validate(&self) -> StratusResult<()> {
        let global = self.global_grid()?;
        decompose(global, self.rank_grid()?)?;
        self.writer.validate()?;

        if self.guard < 0 {
            return Err(StratusError::InvalidConfig(format!(
                "guard must be non-negative, got {}",
                self.guard
            )));
        }
        if self.window.sliding {
            let extent = global[SLIDING_AXIS];
            if !(0..=extent).contains(&self.window.hidden_cells) {
                return Err(StratusError::InvalidConfig(format!(
                    "hidden_cells must lie in 0..={extent}, got {}",
                    self.window.hidden_cells
                )));
            }
        }

        let mut names = Vec::new();
        for f in &self.fields {
            FieldDescriptor::new(f.name.as_str(), f.dtype, vec![f.unit; f.components])?;
            names.push(f.name.clone());
        }
        for d in &self.derived {
            if d.solver.is_empty() || d.species.is_empty() {
                return Err(StratusError::InvalidConfig(
                    "Derived fields need a solver and a species".into(),
                ));
            }
            names.push(format!("{}_{}", d.solver, d.species));
        }
        names.sort();
        if let Some(w) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(StratusError::InvalidConfig(format!(
                "Field '{}' configured twice",
                w[0]
            )));
        }
        Ok(())
    }
}
