//! Element data types and scalar values written to the output container.

use serde::{Deserialize, Serialize};

/// On-disk element type of a declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    F32,
    F64,
    I32,
    U32,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn byte_size(self) -> usize {
        match self {
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 => 8,
        }
    }

    /// Short lowercase name, as printed by inspection tooling.
    pub fn name(self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::I32 => "i32",
            DataType::U32 => "u32",
        }
    }
}

/// Plain element types that can be packed and written as raw bytes.
pub trait Element: bytemuck::Pod + Send + Sync {
    /// The matching on-disk type.
    const DTYPE: DataType;
}

impl Element for f32 {
    const DTYPE: DataType = DataType::F32;
}

impl Element for f64 {
    const DTYPE: DataType = DataType::F64;
}

impl Element for i32 {
    const DTYPE: DataType = DataType::I32;
}

impl Element for u32 {
    const DTYPE: DataType = DataType::U32;
}

/// A single global value (iteration index, slide counter).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    U32(u32),
    I32(i32),
    F64(f64),
}

impl ScalarValue {
    /// The on-disk type of this value.
    pub fn dtype(&self) -> DataType {
        match self {
            ScalarValue::U32(_) => DataType::U32,
            ScalarValue::I32(_) => DataType::I32,
            ScalarValue::F64(_) => DataType::F64,
        }
    }

    /// Returns the value as `i64` when it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            ScalarValue::U32(v) => Some(v as i64),
            ScalarValue::I32(v) => Some(v as i64),
            ScalarValue::F64(_) => None,
        }
    }
}
