//! Per-pass write state.

use std::path::PathBuf;

use stratus_geometry::DomainGeometry;
use stratus_pack::StagingBuffer;
use stratus_schema::{DeclaredSchema, Handle};
use stratus_telemetry::Pass;
use stratus_types::{FileId, StratusResult};

/// State of one pass of a cycle: iteration, active geometry, the declared
/// schema with its handle queue, and the staging buffer shared by every
/// field. Owned by the pass that created it and dropped when it ends.
pub struct WriteContext {
    pub iteration: u32,
    pub pass: Pass,
    pub geometry: DomainGeometry,
    pub schema: DeclaredSchema,
    pub staging: StagingBuffer,
    pub path: PathBuf,
    pub file: Option<FileId>,
    validate: bool,
}

impl WriteContext {
    pub fn new(
        iteration: u32,
        pass: Pass,
        geometry: DomainGeometry,
        schema: DeclaredSchema,
        path: PathBuf,
        validate: bool,
    ) -> Self {
        Self {
            iteration,
            pass,
            geometry,
            schema,
            staging: StagingBuffer::new(),
            path,
            file: None,
            validate,
        }
    }

    /// Takes the next handle; with validation on, checks it was declared
    /// under `name`.
    pub fn next_handle(&mut self, name: &str) -> StratusResult<Handle> {
        if self.validate {
            self.schema.queue.pop_expecting(name)
        } else {
            self.schema.queue.pop_front()
        }
    }

    /// Bytes requested for this pass.
    pub fn declared_bytes(&self) -> u64 {
        self.schema.total_bytes
    }

    /// Checks that every declared handle was written.
    pub fn finish(&self) -> StratusResult<()> {
        self.schema.queue.finish()
    }
}
