//! Self-describing container format.
//!
//! One container holds the output of one step: the global scalars and, for
//! every declared variable, its type, unit, global shape and the blocks
//! contributed by each rank. Serialized with `bincode` behind a magic and
//! version header.
//!
//! Arrays are laid out with the first axis varying fastest, matching the
//! order in which the packer walks cells.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use stratus_types::{DataType, Element, ScalarValue, StratusError, StratusResult};

use crate::backend::VariableDecl;

const MAGIC: [u8; 4] = *b"STRC";
const VERSION: u32 = 1;

/// One rank's contribution to a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub rank: usize,
    /// Offset of the block in the global array (empty for single values).
    pub offset: Vec<u64>,
    /// Extent of the block (empty for single values).
    pub size: Vec<u64>,
    /// Raw little-endian element data.
    pub data: Vec<u8>,
}

impl Block {
    /// Number of elements in the block.
    pub fn element_count(&self) -> u64 {
        self.size.iter().product()
    }
}

/// A variable as stored in a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVariable {
    pub decl: VariableDecl,
    /// Resolved global extent (empty for per-rank single values).
    pub global_shape: Vec<u64>,
    /// Blocks ordered by rank.
    pub blocks: Vec<Block>,
}

impl StoredVariable {
    pub fn name(&self) -> &str {
        &self.decl.name
    }

    pub fn dtype(&self) -> DataType {
        self.decl.dtype
    }
}

/// Contents of one output step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub group: String,
    pub ranks: usize,
    pub scalars: BTreeMap<String, ScalarValue>,
    pub variables: Vec<StoredVariable>,
}

#[derive(Serialize, Deserialize)]
struct ContainerFile {
    magic: [u8; 4],
    version: u32,
    container: Container,
}

impl Container {
    /// Encodes the container with its header.
    pub fn to_bytes(&self) -> StratusResult<Vec<u8>> {
        let file = ContainerFile {
            magic: MAGIC,
            version: VERSION,
            container: self.clone(),
        };
        bincode::serialize(&file)
            .map_err(|e| StratusError::Serialization(format!("Container encoding failed: {e}")))
    }

    /// Decodes a container, checking magic and version.
    pub fn from_bytes(data: &[u8]) -> StratusResult<Self> {
        let file: ContainerFile = bincode::deserialize(data)
            .map_err(|e| StratusError::Serialization(format!("Container decoding failed: {e}")))?;
        if file.magic != MAGIC {
            return Err(StratusError::Serialization("Not a Stratus container".into()));
        }
        if file.version != VERSION {
            return Err(StratusError::Serialization(format!(
                "Unsupported container version {}",
                file.version
            )));
        }
        Ok(file.container)
    }

    /// Reads a container file.
    pub fn read(path: &Path) -> StratusResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Looks up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&StoredVariable> {
        self.variables.iter().find(|v| v.decl.name == name)
    }

    /// Integer value each rank wrote for a single-value variable, by rank.
    pub fn rank_values(&self, name: &str) -> StratusResult<Vec<i64>> {
        let var = self.require(name)?;
        if !var.decl.is_scalar() {
            return Err(StratusError::Serialization(format!(
                "Variable '{name}' is an array"
            )));
        }
        var.blocks
            .iter()
            .map(|b| decode_integer(var.decl.dtype, &b.data))
            .collect()
    }

    /// Reconstructs the dense global array of a variable as elements of `T`.
    ///
    /// Cells not covered by any block are left at zero.
    pub fn assemble<T: Element + Default>(&self, name: &str) -> StratusResult<Vec<T>> {
        let var = self.require(name)?;
        if var.decl.dtype != T::DTYPE {
            return Err(StratusError::Serialization(format!(
                "Variable '{name}' is {}, requested {}",
                var.decl.dtype.name(),
                T::DTYPE.name()
            )));
        }
        if var.decl.is_scalar() {
            return Err(StratusError::Serialization(format!(
                "Variable '{name}' is not an array"
            )));
        }

        let shape = &var.global_shape;
        let total: u64 = shape.iter().product();
        let mut out = vec![T::default(); total as usize];
        let elem = std::mem::size_of::<T>();

        for block in &var.blocks {
            let count = block.element_count() as usize;
            if block.data.len() != count * elem {
                return Err(StratusError::Serialization(format!(
                    "Block of rank {} in '{name}' holds {} bytes, expected {}",
                    block.rank,
                    block.data.len(),
                    count * elem
                )));
            }
            for (i, chunk) in block.data.chunks_exact(elem).enumerate() {
                let global = global_index(i as u64, &block.size, &block.offset, shape)?;
                out[global] = bytemuck::pod_read_unaligned(chunk);
            }
        }

        Ok(out)
    }

    fn require(&self, name: &str) -> StratusResult<&StoredVariable> {
        self.variable(name).ok_or_else(|| {
            StratusError::Serialization(format!("Container has no variable '{name}'"))
        })
    }
}

/// Maps the `i`-th element of a block to its index in the global array.
fn global_index(mut i: u64, size: &[u64], offset: &[u64], shape: &[u64]) -> StratusResult<usize> {
    let mut index = 0u64;
    let mut stride = 1u64;
    for d in 0..shape.len() {
        let local = i % size[d];
        i /= size[d];
        let coord = offset[d] + local;
        if coord >= shape[d] {
            return Err(StratusError::Serialization(format!(
                "Block cell at axis {d} coordinate {coord} lies outside global extent {}",
                shape[d]
            )));
        }
        index += coord * stride;
        stride *= shape[d];
    }
    Ok(index as usize)
}

fn decode_integer(dtype: DataType, data: &[u8]) -> StratusResult<i64> {
    let value = match dtype {
        DataType::I32 if data.len() == 4 => bytemuck::pod_read_unaligned::<i32>(data) as i64,
        DataType::U32 if data.len() == 4 => bytemuck::pod_read_unaligned::<u32>(data) as i64,
        _ => {
            return Err(StratusError::Serialization(format!(
                "Expected a single integer, got {} bytes of {}",
                data.len(),
                dtype.name()
            )))
        }
    };
    Ok(value)
}
