//! Field descriptors.

use serde::{Deserialize, Serialize};
use stratus_types::constants::MAX_COMPONENTS;
use stratus_types::{DataType, StratusError, StratusResult};

/// Static description of one output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    name: String,
    components: usize,
    dtype: DataType,
    unit_scale: Vec<f64>,
}

impl FieldDescriptor {
    /// Creates a descriptor with one unit scale per component.
    pub fn new(
        name: impl Into<String>,
        dtype: DataType,
        unit_scale: Vec<f64>,
    ) -> StratusResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(StratusError::InvalidConfig("Field name is empty".into()));
        }
        let components = unit_scale.len();
        if components == 0 || components > MAX_COMPONENTS {
            return Err(StratusError::InvalidConfig(format!(
                "Field '{name}' has {components} components, expected 1..={MAX_COMPONENTS}"
            )));
        }
        if !matches!(dtype, DataType::F32 | DataType::F64) {
            return Err(StratusError::InvalidConfig(format!(
                "Field '{name}' must hold floating point data, got {}",
                dtype.name()
            )));
        }
        Ok(Self {
            name,
            components,
            dtype,
            unit_scale,
        })
    }

    /// Single-component field.
    pub fn scalar(name: impl Into<String>, dtype: DataType, unit: f64) -> StratusResult<Self> {
        Self::new(name, dtype, vec![unit])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn element_bytes(&self) -> u64 {
        self.dtype.byte_size() as u64
    }

    /// Unit conversion factor of component `c`.
    pub fn unit(&self, c: usize) -> f64 {
        self.unit_scale[c]
    }

    pub fn unit_scale(&self) -> &[f64] {
        &self.unit_scale
    }
}
