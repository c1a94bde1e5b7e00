//! Recording backend for tests.
//!
//! Logs every call, with the payload bytes of each write, into a shared
//! [`CallLog`] that outlives the backend once the writer has taken
//! ownership of it. A failure can be injected for any single operation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use stratus_types::{FileId, GroupId, ScalarValue, StratusError, StratusResult, VariableId};

use crate::backend::{OutputBackend, VariableDecl};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Init { buffer_mb: u64 },
    Finalize,
    DeclareGroup { name: String, group: GroupId },
    DeclareVariable { group: GroupId, decl: VariableDecl, var: VariableId },
    Agree { phase: &'static str, failure: Option<String> },
    Open { group: GroupId, path: PathBuf, file: FileId },
    Reserve { file: FileId, total_bytes: u64 },
    WriteScalar { file: FileId, name: String, value: ScalarValue },
    Write { file: FileId, var: VariableId, data: Vec<u8> },
    Close { file: FileId },
    Abort { file: FileId, reason: String },
    Barrier,
}

impl BackendCall {
    /// Short operation name, as accepted by [`RecordingBackend::fail_on`].
    pub fn op(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Finalize => "finalize",
            Self::DeclareGroup { .. } => "declare_group",
            Self::DeclareVariable { .. } => "declare_variable",
            Self::Agree { .. } => "agree",
            Self::Open { .. } => "open",
            Self::Reserve { .. } => "reserve",
            Self::WriteScalar { .. } => "write_scalar",
            Self::Write { .. } => "write",
            Self::Close { .. } => "close",
            Self::Abort { .. } => "abort",
            Self::Barrier => "barrier",
        }
    }
}

/// Shared, cloneable view of the calls a [`RecordingBackend`] received.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<BackendCall>>>);

impl CallLog {
    /// Copy of every call so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.0.lock().clone()
    }

    /// Operation names in call order.
    pub fn ops(&self) -> Vec<&'static str> {
        self.0.lock().iter().map(BackendCall::op).collect()
    }

    /// Number of calls of one operation.
    pub fn count(&self, op: &str) -> usize {
        self.0.lock().iter().filter(|c| c.op() == op).count()
    }

    /// Declarations in call order.
    pub fn declarations(&self) -> Vec<VariableDecl> {
        self.0
            .lock()
            .iter()
            .filter_map(|c| match c {
                BackendCall::DeclareVariable { decl, .. } => Some(decl.clone()),
                _ => None,
            })
            .collect()
    }

    /// Payload written for the variable `var`, looked up by declared name.
    ///
    /// Returns the most recent write if the variable was written in several steps.
    pub fn payload(&self, name: &str) -> Option<Vec<u8>> {
        let calls = self.0.lock();
        let var = calls.iter().rev().find_map(|c| match c {
            BackendCall::DeclareVariable { decl, var, .. } if decl.name == name => Some(*var),
            _ => None,
        })?;
        calls.iter().rev().find_map(|c| match c {
            BackendCall::Write { var: v, data, .. } if *v == var => Some(data.clone()),
            _ => None,
        })
    }

    /// Opened paths in call order.
    pub fn opened_paths(&self) -> Vec<PathBuf> {
        self.0
            .lock()
            .iter()
            .filter_map(|c| match c {
                BackendCall::Open { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forgets every recorded call.
    pub fn clear(&self) {
        self.0.lock().clear();
    }

    fn push(&self, call: BackendCall) {
        self.0.lock().push(call);
    }
}

/// Backend that records calls without producing output.
pub struct RecordingBackend {
    rank: usize,
    size: usize,
    log: CallLog,
    fail_on: Option<&'static str>,
    buffer_bytes: u64,
    next_group: u32,
    next_var: u32,
    next_file: u32,
}

impl RecordingBackend {
    /// A single-rank recorder.
    pub fn new() -> Self {
        Self::with_rank(0, 1)
    }

    /// A recorder posing as `rank` of a group of `size`.
    pub fn with_rank(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size,
            log: CallLog::default(),
            fail_on: None,
            buffer_bytes: 0,
            next_group: 0,
            next_var: 0,
            next_file: 0,
        }
    }

    /// Makes every call of operation `op` fail after being recorded.
    pub fn fail_on(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    /// Handle to the call log.
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn record(&self, call: BackendCall) -> StratusResult<()> {
        let op = call.op();
        self.log.push(call);
        if self.fail_on == Some(op) {
            return Err(StratusError::backend(op, "injected failure"));
        }
        Ok(())
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn extension(&self) -> &str {
        "rec"
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn init(&mut self, buffer_mb: u64) -> StratusResult<()> {
        self.buffer_bytes = buffer_mb * 1024 * 1024;
        self.record(BackendCall::Init { buffer_mb })
    }

    fn finalize(&mut self) -> StratusResult<()> {
        self.record(BackendCall::Finalize)
    }

    fn declare_group(&mut self, name: &str) -> StratusResult<GroupId> {
        let group = GroupId(self.next_group);
        self.next_group += 1;
        self.next_var = 0;
        self.record(BackendCall::DeclareGroup {
            name: name.to_string(),
            group,
        })?;
        Ok(group)
    }

    fn declare_variable(&mut self, group: GroupId, decl: VariableDecl) -> StratusResult<VariableId> {
        let var = VariableId(self.next_var);
        self.next_var += 1;
        self.record(BackendCall::DeclareVariable { group, decl, var })?;
        Ok(var)
    }

    fn agree(&mut self, phase: &'static str, failure: Option<String>) -> StratusResult<()> {
        self.record(BackendCall::Agree {
            phase,
            failure: failure.clone(),
        })?;
        match failure {
            Some(message) => Err(StratusError::backend(phase, message)),
            None => Ok(()),
        }
    }

    fn open(&mut self, group: GroupId, path: &Path) -> StratusResult<FileId> {
        let file = FileId(self.next_file);
        self.next_file += 1;
        self.record(BackendCall::Open {
            group,
            path: path.to_path_buf(),
            file,
        })?;
        Ok(file)
    }

    fn reserve(&mut self, file: FileId, total_bytes: u64) -> StratusResult<u64> {
        self.record(BackendCall::Reserve { file, total_bytes })?;
        Ok(total_bytes.max(self.buffer_bytes))
    }

    fn write_scalar(&mut self, file: FileId, name: &str, value: ScalarValue) -> StratusResult<()> {
        self.record(BackendCall::WriteScalar {
            file,
            name: name.to_string(),
            value,
        })
    }

    fn write_by_id(&mut self, file: FileId, var: VariableId, data: &[u8]) -> StratusResult<()> {
        self.record(BackendCall::Write {
            file,
            var,
            data: data.to_vec(),
        })
    }

    fn close(&mut self, file: FileId) -> StratusResult<()> {
        self.record(BackendCall::Close { file })
    }

    fn abort(&mut self, file: FileId, reason: &str) -> StratusResult<()> {
        self.record(BackendCall::Abort {
            file,
            reason: reason.to_string(),
        })
    }

    fn barrier(&mut self) -> StratusResult<()> {
        self.record(BackendCall::Barrier)
    }
}
