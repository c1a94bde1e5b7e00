//! Integration tests for stratus-backend.

use std::path::Path;
use std::thread;

use stratus_backend::{
    BackendCall, Communicator, Container, ContainerBackend, LocalGroup, OutputBackend,
    RecordingBackend, VariableDecl,
};
use stratus_types::{DataType, ScalarValue, StratusError, VariableId};

fn i32_bytes(v: i32) -> Vec<u8> {
    v.to_le_bytes().to_vec()
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

struct Ids {
    local: VariableId,
    global: VariableId,
    offset: VariableId,
    field: VariableId,
}

/// Declares `iteration`, one axis triplet and a 1-D f32 field.
fn declare_line(backend: &mut dyn OutputBackend) -> (stratus_types::GroupId, Ids) {
    let group = backend.declare_group("fields").unwrap();
    backend
        .declare_variable(group, VariableDecl::scalar("iteration", DataType::U32))
        .unwrap();
    let local = backend
        .declare_variable(group, VariableDecl::scalar("size_local_x", DataType::I32))
        .unwrap();
    let global = backend
        .declare_variable(group, VariableDecl::scalar("size_global_x", DataType::I32))
        .unwrap();
    let offset = backend
        .declare_variable(group, VariableDecl::scalar("offset_global_x", DataType::I32))
        .unwrap();
    let field = backend
        .declare_variable(
            group,
            VariableDecl::array(
                "fields_rho",
                DataType::F32,
                "size_local_x",
                "size_global_x",
                "offset_global_x",
            )
            .with_unit(2.5),
        )
        .unwrap();
    (group, Ids { local, global, offset, field })
}

/// Writes one rank's block of a line of `global` cells.
fn write_line(
    backend: &mut dyn OutputBackend,
    path: &Path,
    offset: i32,
    values: &[f32],
    global: i32,
) -> Result<(), StratusError> {
    let (group, ids) = declare_line(backend);
    let file = backend.open(group, path)?;
    backend.reserve(file, 1024)?;
    backend.write_scalar(file, "iteration", ScalarValue::U32(7))?;
    backend.write_by_id(file, ids.local, &i32_bytes(values.len() as i32))?;
    backend.write_by_id(file, ids.global, &i32_bytes(global))?;
    backend.write_by_id(file, ids.offset, &i32_bytes(offset))?;
    backend.write_by_id(file, ids.field, &f32_bytes(values))?;
    backend.close(file)?;
    backend.barrier()
}

// ─── Communicator Tests ──────────────────────────────────────

#[test]
fn local_group_rejects_zero_ranks() {
    assert!(LocalGroup::new(0).is_err());
}

#[test]
fn gather_orders_by_rank() {
    let comms = LocalGroup::new(3).unwrap();
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let payload = vec![comm.rank() as u8; comm.rank() + 1];
                comm.gather(payload).unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(
        results[0],
        Some(vec![vec![0], vec![1, 1], vec![2, 2, 2]])
    );
    assert_eq!(results[1], None);
    assert_eq!(results[2], None);
}

#[test]
fn broadcast_shares_root_payload() {
    let comms = LocalGroup::new(2).unwrap();
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| thread::spawn(move || comm.broadcast(vec![comm.rank() as u8 + 10]).unwrap()))
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), vec![10]);
    }
}

// ─── RecordingBackend Tests ──────────────────────────────────

#[test]
fn recording_logs_calls_in_order() {
    let mut backend = RecordingBackend::new();
    let log = backend.log();
    backend.init(1).unwrap();
    let (group, ids) = declare_line(&mut backend);
    let file = backend.open(group, Path::new("out.rec")).unwrap();
    assert_eq!(backend.reserve(file, 10).unwrap(), 1024 * 1024);
    backend.write_by_id(file, ids.field, &[1, 2, 3, 4]).unwrap();
    backend.close(file).unwrap();

    assert_eq!(
        log.ops(),
        vec![
            "init",
            "declare_group",
            "declare_variable",
            "declare_variable",
            "declare_variable",
            "declare_variable",
            "declare_variable",
            "open",
            "reserve",
            "write",
            "close"
        ]
    );
    assert_eq!(log.declarations().len(), 5);
    assert_eq!(log.payload("fields_rho"), Some(vec![1, 2, 3, 4]));
    assert_eq!(log.opened_paths(), vec![Path::new("out.rec").to_path_buf()]);
}

#[test]
fn recording_injected_failure_is_still_logged() {
    let mut backend = RecordingBackend::new().fail_on("open");
    let log = backend.log();
    backend.init(1).unwrap();
    let group = backend.declare_group("fields").unwrap();

    let err = backend.open(group, Path::new("x.rec")).unwrap_err();
    assert!(matches!(err, StratusError::Backend { op: "open", .. }));
    assert_eq!(log.count("open"), 1);
    assert!(matches!(log.calls().last(), Some(BackendCall::Open { .. })));
}

// ─── ContainerBackend Tests ──────────────────────────────────

#[test]
fn single_rank_container_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("line_7.stc");

    let mut backend = ContainerBackend::new(Box::new(LocalGroup::solo()));
    backend.init(1).unwrap();
    write_line(&mut backend, &path, 0, &[1.0, 2.0, 3.0], 3).unwrap();
    backend.finalize().unwrap();

    let container = Container::read(&path).unwrap();
    assert_eq!(container.group, "fields");
    assert_eq!(container.ranks, 1);
    assert_eq!(container.scalars.get("iteration"), Some(&ScalarValue::U32(7)));
    assert!(container.variable("iteration").is_none());
    assert_eq!(container.rank_values("size_local_x").unwrap(), vec![3]);

    let rho = container.variable("fields_rho").unwrap();
    assert_eq!(rho.global_shape, vec![3]);
    assert_eq!(rho.decl.unit, Some(2.5));
    assert_eq!(container.assemble::<f32>("fields_rho").unwrap(), vec![1.0, 2.0, 3.0]);
}

#[test]
fn two_ranks_merge_into_one_container() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("line_7.stc");

    let comms = LocalGroup::new(2).unwrap();
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            let path = path.clone();
            thread::spawn(move || {
                let rank = comm.rank();
                let mut backend = ContainerBackend::new(Box::new(comm));
                backend.init(1).unwrap();
                let (offset, values): (i32, Vec<f32>) = if rank == 0 {
                    (0, vec![0.0, 1.0])
                } else {
                    (2, vec![2.0, 3.0, 4.0])
                };
                write_line(&mut backend, &path, offset, &values, 5)
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap().unwrap();
    }

    let container = Container::read(&path).unwrap();
    assert_eq!(container.ranks, 2);
    assert_eq!(container.rank_values("offset_global_x").unwrap(), vec![0, 2]);
    assert_eq!(
        container.assemble::<f32>("fields_rho").unwrap(),
        vec![0.0, 1.0, 2.0, 3.0, 4.0]
    );
}

#[test]
fn disagreeing_global_shape_fails_on_every_rank() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.stc");

    let comms = LocalGroup::new(2).unwrap();
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            let path = path.clone();
            thread::spawn(move || {
                let rank = comm.rank() as i32;
                let mut backend = ContainerBackend::new(Box::new(comm));
                backend.init(1).unwrap();
                write_line(&mut backend, &path, rank, &[1.0], 2 + rank)
            })
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap().is_err());
    }
    assert!(!path.exists());
}

#[test]
fn declare_after_open_is_a_protocol_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = ContainerBackend::new(Box::new(LocalGroup::solo()));
    backend.init(1).unwrap();
    let group = backend.declare_group("fields").unwrap();
    backend.open(group, &dir.path().join("a.stc")).unwrap();

    let err = backend
        .declare_variable(group, VariableDecl::scalar("late", DataType::I32))
        .unwrap_err();
    assert!(err.is_fatal_protocol());
}

#[test]
fn write_before_reserve_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = ContainerBackend::new(Box::new(LocalGroup::solo()));
    backend.init(1).unwrap();
    let (group, ids) = declare_line(&mut backend);
    let file = backend.open(group, &dir.path().join("a.stc")).unwrap();

    let err = backend.write_by_id(file, ids.local, &i32_bytes(1)).unwrap_err();
    assert!(matches!(err, StratusError::Protocol(_)));
}

#[test]
fn writes_beyond_reservation_fail() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = ContainerBackend::new(Box::new(LocalGroup::solo()));
    backend.init(0).unwrap();
    let (group, ids) = declare_line(&mut backend);
    let file = backend.open(group, &dir.path().join("a.stc")).unwrap();
    backend.reserve(file, 8).unwrap();

    backend.write_by_id(file, ids.local, &i32_bytes(1)).unwrap();
    backend.write_by_id(file, ids.global, &i32_bytes(1)).unwrap();
    let err = backend.write_by_id(file, ids.offset, &i32_bytes(0)).unwrap_err();
    assert!(matches!(err, StratusError::Backend { op: "write", .. }));
}

#[test]
fn writes_are_charged_against_the_granted_size() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = ContainerBackend::new(Box::new(LocalGroup::solo()));
    backend.init(1).unwrap();
    let (group, ids) = declare_line(&mut backend);
    let file = backend.open(group, &dir.path().join("a.stc")).unwrap();
    assert_eq!(backend.reserve(file, 4).unwrap(), 1024 * 1024);

    backend.write_by_id(file, ids.local, &i32_bytes(1)).unwrap();
    backend.write_by_id(file, ids.global, &i32_bytes(1)).unwrap();
    backend.write_by_id(file, ids.offset, &i32_bytes(0)).unwrap();
}

#[test]
fn double_write_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = ContainerBackend::new(Box::new(LocalGroup::solo()));
    backend.init(1).unwrap();
    let (group, ids) = declare_line(&mut backend);
    let file = backend.open(group, &dir.path().join("a.stc")).unwrap();
    backend.reserve(file, 1024).unwrap();

    backend.write_by_id(file, ids.local, &i32_bytes(1)).unwrap();
    assert!(backend.write_by_id(file, ids.local, &i32_bytes(1)).is_err());
}

#[test]
fn scalar_type_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = ContainerBackend::new(Box::new(LocalGroup::solo()));
    backend.init(1).unwrap();
    let (group, _) = declare_line(&mut backend);
    let file = backend.open(group, &dir.path().join("a.stc")).unwrap();
    backend.reserve(file, 1024).unwrap();

    assert!(backend
        .write_scalar(file, "iteration", ScalarValue::I32(7))
        .is_err());
    assert!(backend
        .write_scalar(file, "missing", ScalarValue::U32(7))
        .is_err());
}

#[test]
fn unwritten_variable_fails_close_without_leaving_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.stc");
    let mut backend = ContainerBackend::new(Box::new(LocalGroup::solo()));
    backend.init(1).unwrap();
    let (group, ids) = declare_line(&mut backend);
    let file = backend.open(group, &path).unwrap();
    backend.reserve(file, 1024).unwrap();
    backend.write_by_id(file, ids.local, &i32_bytes(1)).unwrap();

    assert!(backend.close(file).is_err());
    assert!(!path.exists());
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn open_in_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = ContainerBackend::new(Box::new(LocalGroup::solo()));
    backend.init(1).unwrap();
    let group = backend.declare_group("fields").unwrap();

    let err = backend
        .open(group, &dir.path().join("nope").join("a.stc"))
        .unwrap_err();
    assert!(matches!(err, StratusError::Backend { op: "open", .. }));
}

#[test]
fn redeclaring_group_drops_variables() {
    let mut backend = ContainerBackend::new(Box::new(LocalGroup::solo()));
    backend.init(1).unwrap();
    let (first, _) = declare_line(&mut backend);
    let (second, ids) = declare_line(&mut backend);
    assert_eq!(first, second);
    assert_eq!(ids.field, VariableId(4));
}

#[test]
fn calls_before_init_are_rejected() {
    let mut backend = ContainerBackend::new(Box::new(LocalGroup::solo()));
    assert!(backend.declare_group("fields").is_err());
}

#[test]
fn corrupt_container_is_rejected() {
    assert!(Container::from_bytes(b"garbage").is_err());
}

// ─── Collective Failure Tests ────────────────────────────────

#[test]
fn agree_reports_the_first_failing_rank_everywhere() {
    let comms = LocalGroup::new(3).unwrap();
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            thread::spawn(move || {
                let rank = comm.rank();
                let mut backend = ContainerBackend::new(Box::new(comm));
                backend.init(1).unwrap();
                let failure = (rank > 0).then(|| format!("rank-local problem {rank}"));
                let first = backend.agree("declare", failure);
                let second = backend.agree("declare", None);
                (first, second)
            })
        })
        .collect();

    for h in handles {
        let (first, second) = h.join().unwrap();
        match first {
            Err(StratusError::Backend { op: "declare", message }) => {
                assert_eq!(message, "rank 1: rank-local problem 1");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(second.is_ok());
    }
}

#[test]
fn abort_on_one_rank_fails_close_on_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("line_3.stc");

    let comms = LocalGroup::new(2).unwrap();
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            let path = path.clone();
            thread::spawn(move || {
                let rank = comm.rank();
                let mut backend = ContainerBackend::new(Box::new(comm));
                backend.init(1).unwrap();
                let (group, ids) = declare_line(&mut backend);
                let file = backend.open(group, &path).unwrap();
                backend.reserve(file, 1024).unwrap();
                backend.write_scalar(file, "iteration", ScalarValue::U32(3)).unwrap();
                let outcome = if rank == 1 {
                    backend.abort(file, "field buffer too small")
                } else {
                    backend.write_by_id(file, ids.local, &i32_bytes(1)).unwrap();
                    backend.write_by_id(file, ids.global, &i32_bytes(2)).unwrap();
                    backend.write_by_id(file, ids.offset, &i32_bytes(0)).unwrap();
                    backend.write_by_id(file, ids.field, &f32_bytes(&[1.0])).unwrap();
                    backend.close(file)
                };
                // Both files are settled, so nothing is left open.
                let finalized = backend.finalize();
                (rank, outcome, finalized)
            })
        })
        .collect();

    for h in handles {
        let (rank, outcome, finalized) = h.join().unwrap();
        if rank == 1 {
            outcome.unwrap();
        } else {
            let err = outcome.unwrap_err();
            assert!(matches!(err, StratusError::Backend { op: "close", .. }));
            assert!(err.to_string().contains("rank 1: field buffer too small"));
        }
        finalized.unwrap();
    }
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn aborted_file_can_be_redeclared_and_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = ContainerBackend::new(Box::new(LocalGroup::solo()));
    backend.init(1).unwrap();
    let (group, _) = declare_line(&mut backend);
    let file = backend.open(group, &dir.path().join("a.stc")).unwrap();
    backend.abort(file, "pack failed").unwrap();
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());

    let path = dir.path().join("b.stc");
    write_line(&mut backend, &path, 0, &[4.0, 5.0], 2).unwrap();
    assert!(path.exists());
    backend.finalize().unwrap();
}

#[test]
fn recording_logs_agree_and_abort() {
    let mut backend = RecordingBackend::new();
    let log = backend.log();
    backend.init(1).unwrap();
    backend.agree("declare", None).unwrap();
    let err = backend.agree("declare", Some("bad".into())).unwrap_err();
    assert!(matches!(err, StratusError::Backend { op: "declare", .. }));
    let group = backend.declare_group("fields").unwrap();
    let file = backend.open(group, Path::new("x.rec")).unwrap();
    backend.abort(file, "bad").unwrap();

    assert_eq!(log.ops(), vec!["init", "agree", "agree", "declare_group", "open", "abort"]);
    assert!(matches!(
        log.calls().last(),
        Some(BackendCall::Abort { reason, .. }) if reason == "bad"
    ));
}
