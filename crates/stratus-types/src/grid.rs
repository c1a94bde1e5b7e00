//! Runtime-dimensioned grid vectors.
//!
//! Simulations run in 2 or 3 dimensions. The dimensionality is a runtime
//! property of a run, so offsets and extents carry it with them instead of
//! being fixed at compile time. A 2D vector has no third component at all;
//! it is never padded with a trailing zero or one.

use std::fmt;
use std::ops::{Add, Index, IndexMut, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{StratusError, StratusResult};

/// A 2D or 3D integer vector (sizes, offsets, positions).
///
/// Components are signed: window offsets can be negative before the
/// sliding-axis clamp is applied. Serialized as a plain list of its active
/// components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<i64>", try_from = "Vec<i64>")]
pub struct GridVec {
    dims: u8,
    v: [i64; 3],
}

impl GridVec {
    /// Creates a 2D vector.
    pub fn new2(x: i64, y: i64) -> Self {
        Self { dims: 2, v: [x, y, 0] }
    }

    /// Creates a 3D vector.
    pub fn new3(x: i64, y: i64, z: i64) -> Self {
        Self { dims: 3, v: [x, y, z] }
    }

    /// All-zero vector of the given dimensionality.
    pub fn zeros(dims: usize) -> Self {
        Self::splat(dims, 0)
    }

    /// Vector with every component set to `value`.
    pub fn splat(dims: usize, value: i64) -> Self {
        assert!(dims == 2 || dims == 3, "GridVec supports 2 or 3 dimensions, got {dims}");
        let mut v = [0; 3];
        v[..dims].fill(value);
        Self { dims: dims as u8, v }
    }

    /// Builds a vector from a slice of length 2 or 3.
    pub fn from_slice(values: &[i64]) -> StratusResult<Self> {
        match values.len() {
            2 => Ok(Self::new2(values[0], values[1])),
            3 => Ok(Self::new3(values[0], values[1], values[2])),
            n => Err(StratusError::InvalidConfig(format!(
                "Grid vectors must have 2 or 3 components, got {n}"
            ))),
        }
    }

    /// Number of dimensions (2 or 3).
    #[inline]
    pub fn dims(&self) -> usize {
        self.dims as usize
    }

    /// The active components.
    #[inline]
    pub fn as_slice(&self) -> &[i64] {
        &self.v[..self.dims()]
    }

    /// Iterates over the active components.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.as_slice().iter().copied()
    }

    /// Returns a copy with `axis` replaced by `value`.
    pub fn with(mut self, axis: usize, value: i64) -> Self {
        self[axis] = value;
        self
    }

    /// Product of all components (cell count for an extent).
    pub fn product(&self) -> i64 {
        self.iter().product()
    }

    /// Cell count of a non-negative extent, or 0 if any component is negative.
    pub fn cell_count(&self) -> usize {
        if self.is_non_negative() {
            self.product() as usize
        } else {
            0
        }
    }

    /// True when no component is negative.
    pub fn is_non_negative(&self) -> bool {
        self.iter().all(|c| c >= 0)
    }

    /// Component-wise `self <= other`.
    pub fn all_le(&self, other: &GridVec) -> bool {
        self.dims == other.dims && self.iter().zip(other.iter()).all(|(a, b)| a <= b)
    }

    /// Component-wise maximum.
    pub fn max(&self, other: &GridVec) -> GridVec {
        self.zip_with(other, i64::max)
    }

    /// Components converted to `u64`. Fails on negative components.
    pub fn to_u64(&self) -> StratusResult<Vec<u64>> {
        self.iter()
            .map(|c| {
                u64::try_from(c).map_err(|_| {
                    StratusError::InvalidConfig(format!("Negative extent component in {self}"))
                })
            })
            .collect()
    }

    /// Fails unless `other` has the same dimensionality.
    pub fn check_dims(&self, other: &GridVec, what: &str) -> StratusResult<()> {
        if self.dims != other.dims {
            return Err(StratusError::InvalidConfig(format!(
                "{what}: dimensionality mismatch ({}D vs {}D)",
                self.dims, other.dims
            )));
        }
        Ok(())
    }

    fn zip_with(&self, other: &GridVec, f: impl Fn(i64, i64) -> i64) -> GridVec {
        assert_eq!(self.dims, other.dims, "GridVec dimensionality mismatch");
        let mut out = *self;
        for d in 0..self.dims() {
            out.v[d] = f(self.v[d], other.v[d]);
        }
        out
    }
}

impl Index<usize> for GridVec {
    type Output = i64;

    fn index(&self, axis: usize) -> &i64 {
        &self.as_slice()[axis]
    }
}

impl IndexMut<usize> for GridVec {
    fn index_mut(&mut self, axis: usize) -> &mut i64 {
        let dims = self.dims();
        &mut self.v[..dims][axis]
    }
}

impl Add for GridVec {
    type Output = GridVec;

    fn add(self, rhs: GridVec) -> GridVec {
        self.zip_with(&rhs, |a, b| a + b)
    }
}

impl Sub for GridVec {
    type Output = GridVec;

    fn sub(self, rhs: GridVec) -> GridVec {
        self.zip_with(&rhs, |a, b| a - b)
    }
}

impl From<GridVec> for Vec<i64> {
    fn from(v: GridVec) -> Self {
        v.as_slice().to_vec()
    }
}

impl TryFrom<Vec<i64>> for GridVec {
    type Error = StratusError;

    fn try_from(values: Vec<i64>) -> StratusResult<Self> {
        Self::from_slice(&values)
    }
}

impl fmt::Display for GridVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, c) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c}")?;
        }
        write!(f, "]")
    }
}
