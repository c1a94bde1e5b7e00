//! Container file backend.
//!
//! Every rank buffers its payloads between `open` and `close`. On `close`
//! the payloads are gathered on rank 0, checked for matching declarations,
//! merged into one [`Container`] and written to a temporary file that is
//! renamed onto the target path only after the write succeeded, so a failed
//! step never leaves a partial file under the final name. The outcome is
//! broadcast so that every rank fails or succeeds together.
//!
//! A rank that fails locally after `open` sends a failed contribution
//! through `abort` instead; the matching `close` on the other ranks then
//! fails and the temporary file is removed.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stratus_types::{
    DataType, FileId, GroupId, ScalarValue, StratusError, StratusResult, VariableId,
};
use tracing::debug;

use crate::backend::{OutputBackend, VariableDecl};
use crate::comm::Communicator;
use crate::container::{Block, Container, StoredVariable};

const EXTENSION: &str = "stc";
const MIB: u64 = 1024 * 1024;

struct GroupState {
    name: String,
    decls: Vec<VariableDecl>,
}

struct OpenFile {
    group: GroupId,
    path: PathBuf,
    tmp_path: PathBuf,
    /// Granted reservation; writes are charged against it.
    reserved: Option<u64>,
    written: u64,
    scalars: BTreeMap<String, ScalarValue>,
    payloads: Vec<Option<Vec<u8>>>,
}

/// What one rank sends to rank 0 on close.
#[derive(Serialize, Deserialize)]
enum Contribution {
    Ready {
        decls: Vec<VariableDecl>,
        scalars: BTreeMap<String, ScalarValue>,
        entries: Vec<Entry>,
    },
    Failed(String),
}

#[derive(Serialize, Deserialize)]
enum Entry {
    /// Written through `write_scalar`; stored once, from rank 0.
    Global,
    /// One value per rank.
    RankValue(Vec<u8>),
    /// A block of a global array.
    Array { global_shape: Vec<u64>, block: Block },
}

/// Backend writing one self-describing container file per step.
pub struct ContainerBackend {
    comm: Box<dyn Communicator>,
    initialized: bool,
    buffer_bytes: u64,
    groups: Vec<GroupState>,
    files: HashMap<FileId, OpenFile>,
    next_file: u32,
}

impl ContainerBackend {
    /// Creates a backend that synchronizes through `comm`.
    pub fn new(comm: Box<dyn Communicator>) -> Self {
        Self {
            comm,
            initialized: false,
            buffer_bytes: 0,
            groups: Vec::new(),
            files: HashMap::new(),
            next_file: 0,
        }
    }

    fn ensure_initialized(&self, op: &'static str) -> StratusResult<()> {
        if !self.initialized {
            return Err(StratusError::Protocol(format!(
                "Backend '{op}' called before init"
            )));
        }
        Ok(())
    }

    fn group(&self, id: GroupId) -> StratusResult<&GroupState> {
        self.groups
            .get(id.index())
            .ok_or_else(|| StratusError::Protocol(format!("Unknown group {}", id.0)))
    }

    fn file_mut(&mut self, id: FileId) -> StratusResult<&mut OpenFile> {
        self.files
            .get_mut(&id)
            .ok_or_else(|| StratusError::Protocol(format!("File {} is not open", id.0)))
    }

    /// Runs `op` on rank 0 and shares its outcome with every rank.
    fn root_outcome(
        &self,
        op: &'static str,
        run: impl FnOnce() -> StratusResult<()>,
    ) -> StratusResult<()> {
        let status = if self.comm.rank() == 0 {
            match run() {
                Ok(()) => Vec::new(),
                Err(e) => format!("{e}").into_bytes(),
            }
        } else {
            Vec::new()
        };

        let status = self.comm.broadcast(status)?;
        if status.is_empty() {
            Ok(())
        } else {
            Err(StratusError::backend(
                op,
                String::from_utf8_lossy(&status).into_owned(),
            ))
        }
    }

    fn take_file(&mut self, id: FileId) -> StratusResult<OpenFile> {
        self.files
            .remove(&id)
            .ok_or_else(|| StratusError::Protocol(format!("File {} is not open", id.0)))
    }

    /// Gathers every rank's contribution for `open` and, on rank 0, merges
    /// them into the target. A failed contribution from any rank removes the
    /// temporary file and fails the close on every rank.
    fn settle(&self, open: OpenFile, contribution: Contribution) -> StratusResult<()> {
        let group_name = self.group(open.group)?.name.clone();
        let bytes = bincode::serialize(&contribution)
            .map_err(|e| StratusError::Serialization(format!("Contribution encoding failed: {e}")))?;
        let gathered = self.comm.gather(bytes)?;

        let OpenFile { path, tmp_path, .. } = open;
        self.root_outcome("close", || {
            let result = gathered
                .ok_or_else(|| StratusError::Protocol("Rank 0 received no contributions".into()))
                .and_then(|payloads| self.merge(&group_name, payloads))
                .and_then(|container| container.to_bytes())
                .and_then(|encoded| {
                    std::fs::write(&tmp_path, &encoded)?;
                    std::fs::rename(&tmp_path, &path)?;
                    Ok(encoded.len())
                });
            match result {
                Ok(len) => {
                    debug!(file = %path.display(), bytes = len, "container written");
                    Ok(())
                }
                Err(e) => {
                    let _ = std::fs::remove_file(&tmp_path);
                    Err(e)
                }
            }
        })
    }

    fn local_contribution(&self, file: &OpenFile) -> StratusResult<Contribution> {
        let decls = &self.group(file.group)?.decls;
        let mut entries = Vec::with_capacity(decls.len());

        for (idx, decl) in decls.iter().enumerate() {
            if decl.is_scalar() && file.scalars.contains_key(&decl.name) {
                entries.push(Entry::Global);
                continue;
            }

            let data = file.payloads[idx].clone().ok_or_else(|| {
                StratusError::Protocol(format!(
                    "Variable '{}' was declared but never written",
                    decl.name
                ))
            })?;

            if decl.is_scalar() {
                entries.push(Entry::RankValue(data));
                continue;
            }

            let local = resolve_shape(&decl.local_shape, decls, file)?;
            let global = resolve_shape(&decl.global_shape, decls, file)?;
            let offset = resolve_shape(&decl.global_offset, decls, file)?;
            if local.len() != global.len() || local.len() != offset.len() {
                return Err(StratusError::Protocol(format!(
                    "Shape expressions of '{}' disagree on dimensionality",
                    decl.name
                )));
            }

            let expected = local.iter().product::<u64>() * decl.dtype.byte_size() as u64;
            if data.len() as u64 != expected {
                return Err(StratusError::backend(
                    "close",
                    format!(
                        "'{}' holds {} bytes, its local shape needs {expected}",
                        decl.name,
                        data.len()
                    ),
                ));
            }

            entries.push(Entry::Array {
                global_shape: global,
                block: Block {
                    rank: self.comm.rank(),
                    offset,
                    size: local,
                    data,
                },
            });
        }

        Ok(Contribution::Ready {
            decls: decls.clone(),
            scalars: file.scalars.clone(),
            entries,
        })
    }

    fn merge(&self, group: &str, payloads: Vec<Vec<u8>>) -> StratusResult<Container> {
        let mut contributions = Vec::with_capacity(payloads.len());
        for (rank, bytes) in payloads.iter().enumerate() {
            let c: Contribution = bincode::deserialize(bytes).map_err(|e| {
                StratusError::Serialization(format!("Bad contribution from rank {rank}: {e}"))
            })?;
            match c {
                Contribution::Failed(message) => {
                    return Err(StratusError::backend("close", format!("rank {rank}: {message}")))
                }
                Contribution::Ready { decls, scalars, entries } => {
                    contributions.push((decls, scalars, entries))
                }
            }
        }

        let (root_decls, root_scalars, _) = &contributions[0];
        let mut variables: Vec<StoredVariable> = root_decls
            .iter()
            .map(|decl| StoredVariable {
                decl: decl.clone(),
                global_shape: Vec::new(),
                blocks: Vec::new(),
            })
            .collect();

        for (rank, (decls, scalars, entries)) in contributions.iter().enumerate() {
            if decls != root_decls {
                return Err(StratusError::Protocol(format!(
                    "Rank {rank} declared a different variable sequence than rank 0"
                )));
            }
            if scalars.keys().ne(root_scalars.keys()) {
                return Err(StratusError::Protocol(format!(
                    "Rank {rank} wrote a different set of global scalars than rank 0"
                )));
            }

            for (var, entry) in variables.iter_mut().zip(entries) {
                match entry {
                    Entry::Global => {}
                    Entry::RankValue(data) => var.blocks.push(Block {
                        rank,
                        offset: Vec::new(),
                        size: Vec::new(),
                        data: data.clone(),
                    }),
                    Entry::Array { global_shape, block } => {
                        if var.blocks.is_empty() {
                            var.global_shape = global_shape.clone();
                        } else if &var.global_shape != global_shape {
                            return Err(StratusError::Protocol(format!(
                                "Rank {rank} reports global shape {global_shape:?} for '{}', rank 0 {:?}",
                                var.decl.name, var.global_shape
                            )));
                        }
                        var.blocks.push(block.clone());
                    }
                }
            }
        }

        // Global scalars live in the scalar table, not as variables.
        variables.retain(|v| !(v.decl.is_scalar() && root_scalars.contains_key(&v.decl.name)));

        Ok(Container {
            group: group.to_string(),
            ranks: contributions.len(),
            scalars: root_scalars.clone(),
            variables,
        })
    }
}

/// Resolves a comma-joined shape expression against this rank's written values.
fn resolve_shape(expr: &str, decls: &[VariableDecl], file: &OpenFile) -> StratusResult<Vec<u64>> {
    expr.split(',')
        .map(str::trim)
        .map(|token| {
            let idx = decls
                .iter()
                .position(|d| d.name == token && d.is_scalar())
                .ok_or_else(|| {
                    StratusError::Protocol(format!(
                        "Shape token '{token}' does not name a declared value"
                    ))
                })?;
            let data = file.payloads[idx].as_deref().ok_or_else(|| {
                StratusError::Protocol(format!("Shape token '{token}' was never written"))
            })?;
            let value = match (decls[idx].dtype, data.len()) {
                (DataType::I32, 4) => bytemuck::pod_read_unaligned::<i32>(data) as i64,
                (DataType::U32, 4) => bytemuck::pod_read_unaligned::<u32>(data) as i64,
                _ => {
                    return Err(StratusError::Protocol(format!(
                        "Shape token '{token}' is not a 32-bit integer"
                    )))
                }
            };
            u64::try_from(value).map_err(|_| {
                StratusError::Protocol(format!("Shape token '{token}' is negative ({value})"))
            })
        })
        .collect()
}

impl OutputBackend for ContainerBackend {
    fn name(&self) -> &str {
        "container"
    }

    fn extension(&self) -> &str {
        EXTENSION
    }

    fn rank(&self) -> usize {
        self.comm.rank()
    }

    fn size(&self) -> usize {
        self.comm.size()
    }

    fn init(&mut self, buffer_mb: u64) -> StratusResult<()> {
        self.buffer_bytes = buffer_mb * MIB;
        self.initialized = true;
        debug!(rank = self.comm.rank(), buffer_mb, "container backend initialized");
        Ok(())
    }

    fn finalize(&mut self) -> StratusResult<()> {
        if !self.files.is_empty() {
            return Err(StratusError::Protocol(format!(
                "{} file(s) still open at finalize",
                self.files.len()
            )));
        }
        self.groups.clear();
        self.initialized = false;
        Ok(())
    }

    fn declare_group(&mut self, name: &str) -> StratusResult<GroupId> {
        self.ensure_initialized("declare_group")?;

        if let Some(idx) = self.groups.iter().position(|g| g.name == name) {
            let id = GroupId(idx as u32);
            if self.files.values().any(|f| f.group == id) {
                return Err(StratusError::Protocol(format!(
                    "Group '{name}' re-declared while a file is open"
                )));
            }
            self.groups[idx].decls.clear();
            return Ok(id);
        }

        self.groups.push(GroupState {
            name: name.to_string(),
            decls: Vec::new(),
        });
        Ok(GroupId((self.groups.len() - 1) as u32))
    }

    fn declare_variable(&mut self, group: GroupId, decl: VariableDecl) -> StratusResult<VariableId> {
        self.ensure_initialized("declare_variable")?;
        self.group(group)?;

        if self.files.values().any(|f| f.group == group) {
            return Err(StratusError::Protocol(format!(
                "Variable '{}' declared after its group was opened",
                decl.name
            )));
        }

        let state = &mut self.groups[group.index()];
        if state.decls.iter().any(|d| d.name == decl.name) {
            return Err(StratusError::Protocol(format!(
                "Variable '{}' declared twice",
                decl.name
            )));
        }
        state.decls.push(decl);
        Ok(VariableId((state.decls.len() - 1) as u32))
    }

    fn agree(&mut self, phase: &'static str, failure: Option<String>) -> StratusResult<()> {
        let local = bincode::serialize(&failure)
            .map_err(|e| StratusError::Serialization(format!("Status encoding failed: {e}")))?;
        let gathered = self.comm.gather(local)?;

        let mut verdict: Option<String> = None;
        if let Some(statuses) = gathered {
            for (rank, bytes) in statuses.iter().enumerate() {
                let status: Option<String> = bincode::deserialize(bytes).map_err(|e| {
                    StratusError::Serialization(format!("Bad status from rank {rank}: {e}"))
                })?;
                if let Some(message) = status {
                    if verdict.is_none() {
                        verdict = Some(format!("rank {rank}: {message}"));
                    }
                }
            }
        }

        let verdict = bincode::serialize(&verdict)
            .map_err(|e| StratusError::Serialization(format!("Status encoding failed: {e}")))?;
        let verdict: Option<String> = bincode::deserialize(&self.comm.broadcast(verdict)?)
            .map_err(|e| StratusError::Serialization(format!("Bad status from rank 0: {e}")))?;
        match verdict {
            Some(message) => Err(StratusError::backend(phase, message)),
            None => Ok(()),
        }
    }

    fn open(&mut self, group: GroupId, path: &Path) -> StratusResult<FileId> {
        self.ensure_initialized("open")?;
        let var_count = self.group(group)?.decls.len();
        if self.files.values().any(|f| f.group == group) {
            return Err(StratusError::Protocol(
                "Group already has an open file".into(),
            ));
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".partial");
        let tmp_path = PathBuf::from(tmp_name);

        self.root_outcome("open", || {
            std::fs::File::create(&tmp_path)?;
            Ok(())
        })?;

        let id = FileId(self.next_file);
        self.next_file += 1;
        self.files.insert(
            id,
            OpenFile {
                group,
                path: path.to_path_buf(),
                tmp_path,
                reserved: None,
                written: 0,
                scalars: BTreeMap::new(),
                payloads: vec![None; var_count],
            },
        );
        debug!(rank = self.comm.rank(), file = %path.display(), "opened container");
        Ok(id)
    }

    fn reserve(&mut self, file: FileId, total_bytes: u64) -> StratusResult<u64> {
        let buffer = self.buffer_bytes;
        let open = self.file_mut(file)?;
        if open.reserved.is_some() {
            return Err(StratusError::Protocol("Reserve called twice".into()));
        }
        let granted = total_bytes.max(buffer);
        open.reserved = Some(granted);
        Ok(granted)
    }

    fn write_scalar(&mut self, file: FileId, name: &str, value: ScalarValue) -> StratusResult<()> {
        let group = self.file_mut(file)?.group;
        let decl = self
            .group(group)?
            .decls
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or_else(|| StratusError::Protocol(format!("Scalar '{name}' was not declared")))?;
        if !decl.is_scalar() || decl.dtype != value.dtype() {
            return Err(StratusError::Protocol(format!(
                "Scalar '{name}' written as {}, declared as {}",
                value.dtype().name(),
                decl.dtype.name()
            )));
        }

        let open = self.file_mut(file)?;
        charge(open, decl.dtype.byte_size() as u64)?;
        if open.scalars.insert(name.to_string(), value).is_some() {
            return Err(StratusError::Protocol(format!("Scalar '{name}' written twice")));
        }
        Ok(())
    }

    fn write_by_id(&mut self, file: FileId, var: VariableId, data: &[u8]) -> StratusResult<()> {
        let group = self.file_mut(file)?.group;
        let decl = self
            .group(group)?
            .decls
            .get(var.index())
            .cloned()
            .ok_or_else(|| StratusError::Protocol(format!("Unknown variable id {}", var.0)))?;

        let elem = decl.dtype.byte_size();
        if data.len() % elem != 0 || (decl.is_scalar() && data.len() != elem) {
            return Err(StratusError::backend(
                "write",
                format!("{} bytes do not fit variable '{}'", data.len(), decl.name),
            ));
        }

        let open = self.file_mut(file)?;
        charge(open, data.len() as u64)?;
        let slot = &mut open.payloads[var.index()];
        if slot.is_some() {
            return Err(StratusError::Protocol(format!(
                "Variable '{}' written twice",
                decl.name
            )));
        }
        *slot = Some(data.to_vec());
        Ok(())
    }

    fn close(&mut self, file: FileId) -> StratusResult<()> {
        let open = self.take_file(file)?;
        let contribution = self
            .local_contribution(&open)
            .unwrap_or_else(|e| Contribution::Failed(e.to_string()));
        self.settle(open, contribution)
    }

    fn abort(&mut self, file: FileId, reason: &str) -> StratusResult<()> {
        let open = self.take_file(file)?;
        debug!(rank = self.comm.rank(), file = %open.path.display(), reason, "aborting container");
        match self.settle(open, Contribution::Failed(reason.to_string())) {
            // The failure is this rank's own; the other ranks see it from `close`.
            Err(StratusError::Backend { op: "close", .. }) | Ok(()) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn barrier(&mut self) -> StratusResult<()> {
        self.comm.barrier()
    }
}

/// Accounts `bytes` against the file's reservation.
fn charge(open: &mut OpenFile, bytes: u64) -> StratusResult<()> {
    let reserved = open
        .reserved
        .ok_or_else(|| StratusError::Protocol("Write before reserve".into()))?;
    open.written += bytes;
    if open.written > reserved {
        return Err(StratusError::backend(
            "write",
            format!("{} bytes written, only {reserved} reserved", open.written),
        ));
    }
    Ok(())
}
