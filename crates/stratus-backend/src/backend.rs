//! Output backend trait.
//!
//! The [`OutputBackend`] trait is the transactional API the write cycle
//! drives. Every call is collective: all ranks of the group issue the same
//! calls in the same order, and a call may block until every rank has
//! reached it.
//!
//! # Implementations
//! - [`ContainerBackend`](crate::container_backend::ContainerBackend): self-describing container files
//! - [`RecordingBackend`](crate::recording::RecordingBackend): call recorder for tests

use std::path::Path;

use serde::{Deserialize, Serialize};
use stratus_types::{DataType, FileId, GroupId, ScalarValue, StratusResult, VariableId};

/// Declaration of one variable in a group.
///
/// Shape expressions are comma-joined variable names, one per dimension,
/// resolved against the per-rank values written for those variables.
/// An empty local shape declares a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub dtype: DataType,
    pub local_shape: String,
    pub global_shape: String,
    pub global_offset: String,
    /// Conversion factor to physical units, if the variable carries one.
    pub unit: Option<f64>,
}

impl VariableDecl {
    /// A single value per rank.
    pub fn scalar(name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            dtype,
            local_shape: String::new(),
            global_shape: String::new(),
            global_offset: String::new(),
            unit: None,
        }
    }

    /// A block of a global array.
    pub fn array(
        name: impl Into<String>,
        dtype: DataType,
        local_shape: impl Into<String>,
        global_shape: impl Into<String>,
        global_offset: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            dtype,
            local_shape: local_shape.into(),
            global_shape: global_shape.into(),
            global_offset: global_offset.into(),
            unit: None,
        }
    }

    /// Attaches a unit conversion factor.
    pub fn with_unit(mut self, unit: f64) -> Self {
        self.unit = Some(unit);
        self
    }

    /// True for single-value declarations.
    pub fn is_scalar(&self) -> bool {
        self.local_shape.is_empty()
    }
}

/// Trait for collective self-describing output backends.
///
/// A write cycle calls these methods in order:
///
/// ```text
/// backend.declare_group(..)?;
/// backend.declare_variable(..)?;   // every variable, before open
/// backend.agree("declare", local_failure)?;
/// let file = backend.open(..)?;
/// backend.reserve(file, total)?;
/// backend.write_scalar(..)? / backend.write_by_id(..)?;
/// backend.close(file)?;              // or abort(file, reason) after a local failure
/// backend.barrier()?;
/// ```
///
/// A rank that fails between `open` and `close` must still call `abort` so
/// the other ranks' `close` can complete; they then see the failure.
pub trait OutputBackend: Send {
    /// Returns the backend name (e.g. "container", "recording").
    fn name(&self) -> &str;

    /// File extension of the targets this backend writes.
    fn extension(&self) -> &str;

    /// Rank of this participant in the collective group.
    fn rank(&self) -> usize;

    /// Number of participants in the collective group.
    fn size(&self) -> usize;

    /// Initializes the backend with an initial buffer of `buffer_mb` MiB.
    fn init(&mut self, buffer_mb: u64) -> StratusResult<()>;

    /// Releases backend resources. No call other than `init` is valid afterwards.
    fn finalize(&mut self) -> StratusResult<()>;

    /// Declares (or re-declares, dropping earlier variables) a variable group.
    fn declare_group(&mut self, name: &str) -> StratusResult<GroupId>;

    /// Declares a variable. Must precede `open` for the group.
    fn declare_variable(&mut self, group: GroupId, decl: VariableDecl) -> StratusResult<VariableId>;

    /// Combines every rank's local outcome of `phase`.
    ///
    /// Returns `Err` on every rank if any rank passes a failure.
    fn agree(&mut self, phase: &'static str, failure: Option<String>) -> StratusResult<()>;

    /// Collectively opens (creating or truncating) an output target.
    fn open(&mut self, group: GroupId, path: &Path) -> StratusResult<FileId>;

    /// Reserves room for `total_bytes` of payload; returns the granted size.
    fn reserve(&mut self, file: FileId, total_bytes: u64) -> StratusResult<u64>;

    /// Writes a declared global scalar by name.
    fn write_scalar(&mut self, file: FileId, name: &str, value: ScalarValue) -> StratusResult<()>;

    /// Writes this rank's payload for a declared variable.
    fn write_by_id(&mut self, file: FileId, var: VariableId, data: &[u8]) -> StratusResult<()>;

    /// Collectively closes a target. Data is durable once this returns.
    fn close(&mut self, file: FileId) -> StratusResult<()>;

    /// Takes this rank's part in the collective close of `file` as a
    /// failure, discarding the target. Pairs with `close` on other ranks,
    /// which then return `Err`. Returns `Ok` once the target is discarded.
    fn abort(&mut self, file: FileId, reason: &str) -> StratusResult<()>;

    /// Blocks until every rank of the group reaches the barrier.
    fn barrier(&mut self) -> StratusResult<()>;
}
