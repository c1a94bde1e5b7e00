//! Collective communication between ranks.
//!
//! [`LocalGroup`] runs every rank as a thread of one process. Payloads are
//! plain bytes so that a message-passing implementation can slot in behind
//! the same trait.

use std::sync::{Arc, Barrier};

use parking_lot::Mutex;
use stratus_types::{StratusError, StratusResult};

/// A fixed-size group of ranks that synchronize collectively.
pub trait Communicator: Send {
    /// Rank of this participant.
    fn rank(&self) -> usize;

    /// Number of participants.
    fn size(&self) -> usize;

    /// Blocks until every rank has reached the barrier.
    fn barrier(&self) -> StratusResult<()>;

    /// Collects one payload per rank on rank 0, ordered by rank.
    /// Other ranks receive `None`.
    fn gather(&self, payload: Vec<u8>) -> StratusResult<Option<Vec<Vec<u8>>>>;

    /// Returns rank 0's payload on every rank.
    fn broadcast(&self, payload: Vec<u8>) -> StratusResult<Vec<u8>>;
}

struct Shared {
    size: usize,
    barrier: Barrier,
    slots: Mutex<Vec<Option<Vec<u8>>>>,
    root: Mutex<Vec<u8>>,
}

/// Factory for an in-process collective group.
pub struct LocalGroup;

impl LocalGroup {
    /// Creates `size` connected communicators, one per rank.
    pub fn new(size: usize) -> StratusResult<Vec<LocalComm>> {
        if size == 0 {
            return Err(StratusError::InvalidConfig(
                "A collective group needs at least one rank".into(),
            ));
        }
        let shared = Arc::new(Shared {
            size,
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![None; size]),
            root: Mutex::new(Vec::new()),
        });
        Ok((0..size)
            .map(|rank| LocalComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect())
    }

    /// A single-rank group.
    pub fn solo() -> LocalComm {
        let shared = Arc::new(Shared {
            size: 1,
            barrier: Barrier::new(1),
            slots: Mutex::new(vec![None]),
            root: Mutex::new(Vec::new()),
        });
        LocalComm { rank: 0, shared }
    }
}

/// One rank's endpoint of a [`LocalGroup`].
pub struct LocalComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) -> StratusResult<()> {
        self.shared.barrier.wait();
        Ok(())
    }

    fn gather(&self, payload: Vec<u8>) -> StratusResult<Option<Vec<Vec<u8>>>> {
        self.shared.slots.lock()[self.rank] = Some(payload);
        self.shared.barrier.wait();

        let collected = if self.rank == 0 {
            let mut slots = self.shared.slots.lock();
            slots
                .iter_mut()
                .enumerate()
                .map(|(rank, slot)| {
                    slot.take().ok_or_else(|| {
                        StratusError::Protocol(format!("Rank {rank} did not contribute to gather"))
                    })
                })
                .collect::<StratusResult<Vec<_>>>()
                .map(Some)
        } else {
            Ok(None)
        };

        // Slots must be drained before any rank starts the next gather.
        self.shared.barrier.wait();
        collected
    }

    fn broadcast(&self, payload: Vec<u8>) -> StratusResult<Vec<u8>> {
        if self.rank == 0 {
            *self.shared.root.lock() = payload;
        }
        self.shared.barrier.wait();
        let value = self.shared.root.lock().clone();
        self.shared.barrier.wait();
        Ok(value)
    }
}
