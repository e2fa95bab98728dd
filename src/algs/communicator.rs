//! Thin façade over intra-process or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! Point-to-point handles are **waitable**; the collectives built on top of
//! them (`barrier`, `allreduce_*`) block until every rank has contributed.
//!
//! Backends:
//! - [`NoComm`]: a world of one rank, collectives return the local value.
//! - [`LocalComm`]: several ranks inside one process (one thread per rank)
//!   sharing a mailbox; what the tests use to run multi-rank pipelines.
//! - `MpiComm` (feature `mpi-support`): MPI world communicator with native
//!   reductions.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;

use crate::mesh_error::ParMeshError;

/// Tag reserved for the gather half of the default reductions.
const REDUCE_TAG: u16 = 0xC000;
/// Tag reserved for the broadcast half of the default reductions.
const BCAST_TAG: u16 = 0xC001;
/// Rank that folds contributions in the default reductions.
const ROOT: usize = 0;

/// Communication interface: point-to-point messages plus the two reductions
/// the pipeline checkpoints need.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// This process' rank in `[0, size)`.
    fn rank(&self) -> usize;
    /// Number of ranks.
    fn size(&self) -> usize;

    /// Fold one `i32` per rank with `op` and hand the result to every rank.
    ///
    /// The default gathers on rank 0 and broadcasts back. `op` must be
    /// commutative and associative.
    fn allreduce_i32(&self, value: i32, op: fn(i32, i32) -> i32) -> Result<i32, ParMeshError> {
        let size = self.size();
        if size <= 1 {
            return Ok(value);
        }
        if self.rank() == ROOT {
            let mut acc = value;
            for peer in (0..size).filter(|&p| p != ROOT) {
                let mut buf = [0u8; 4];
                let got = self.irecv(peer, REDUCE_TAG, &mut buf).wait();
                acc = op(acc, decode_i32(got, peer)?);
            }
            let bytes = acc.to_le_bytes();
            for peer in (0..size).filter(|&p| p != ROOT) {
                self.isend(peer, BCAST_TAG, &bytes).wait();
            }
            Ok(acc)
        } else {
            self.isend(ROOT, REDUCE_TAG, &value.to_le_bytes()).wait();
            let mut buf = [0u8; 4];
            let got = self.irecv(ROOT, BCAST_TAG, &mut buf).wait();
            decode_i32(got, ROOT)
        }
    }

    /// Minimum of `value` over all ranks.
    fn allreduce_min_i32(&self, value: i32) -> Result<i32, ParMeshError> {
        self.allreduce_i32(value, std::cmp::min)
    }

    /// Maximum of `value` over all ranks.
    fn allreduce_max_i32(&self, value: i32) -> Result<i32, ParMeshError> {
        self.allreduce_i32(value, std::cmp::max)
    }

    /// Block until every rank has reached the barrier.
    fn barrier(&self) -> Result<(), ParMeshError> {
        self.allreduce_max_i32(0).map(|_| ())
    }
}

fn decode_i32(got: Option<Vec<u8>>, peer: usize) -> Result<i32, ParMeshError> {
    got.as_deref()
        .and_then(|b| b.get(..4))
        .and_then(|b| b.try_into().ok())
        .map(i32::from_le_bytes)
        .ok_or(ParMeshError::CommFailure {
            peer,
            reason: "truncated reduction message",
        })
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Compile-time no-op comm for pure serial runs.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
}

// --- LocalComm: several ranks inside one process ---
type Key = (usize, usize, u16); // (src, dst, tag)
type Mailbox = DashMap<Key, VecDeque<Bytes>>;

/// One rank of an in-process world. Messages between a given `(src, dst,
/// tag)` triple are delivered in FIFO order.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl LocalComm {
    /// Build the `size` ranks of a fresh world; hand one to each thread.
    pub fn world(size: usize) -> Vec<Self> {
        let mailbox = Arc::new(Mailbox::new());
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }
}

pub struct LocalHandle {
    key: Key,
    len: usize,
    mailbox: Arc<Mailbox>,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            if let Some(mut queue) = self.mailbox.get_mut(&self.key) {
                if let Some(bytes) = queue.pop_front() {
                    let n = self.len.min(bytes.len());
                    return Some(bytes[..n].to_vec());
                }
            }
            std::thread::yield_now();
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        self.mailbox
            .entry((self.rank, peer, tag))
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> LocalHandle {
        LocalHandle {
            key: (peer, self.rank, tag),
            len: buf.len(),
            mailbox: Arc::clone(&self.mailbox),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::mesh_error::ParMeshError;
    use mpi::collective::SystemOperation;
    use mpi::environment::Universe;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// MPI world communicator. Dropping it finalizes MPI.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
        _universe: Universe,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, ParMeshError> {
            let universe = mpi::initialize().ok_or(ParMeshError::MpiInit)?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }
    }

    /// Completed blocking transfer.
    pub struct MpiHandle(Option<Vec<u8>>);

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag));
            MpiHandle(None)
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            self.world
                .process_at_rank(peer as i32)
                .receive_into_with_tag(buf, i32::from(tag));
            MpiHandle(Some(buf.to_vec()))
        }

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.size
        }

        fn allreduce_min_i32(&self, value: i32) -> Result<i32, ParMeshError> {
            let mut out = 0i32;
            self.world
                .all_reduce_into(&value, &mut out, SystemOperation::min());
            Ok(out)
        }

        fn allreduce_max_i32(&self, value: i32) -> Result<i32, ParMeshError> {
            let mut out = 0i32;
            self.world
                .all_reduce_into(&value, &mut out, SystemOperation::max());
            Ok(out)
        }

        fn barrier(&self) -> Result<(), ParMeshError> {
            self.world.barrier();
            Ok(())
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(LocalComm: Send, Sync, Clone);
    assert_impl_all!(NoComm: Send, Sync, Clone);

    #[test]
    fn local_roundtrip_two_ranks() {
        let world = LocalComm::world(2);
        let mut recv_buf = [0u8; 4];
        let recv_handle = world[1].irecv(0, 7, &mut recv_buf);
        world[0].isend(1, 7, &[1, 2, 3, 4]).wait();

        let data = recv_handle.wait().expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn local_fifo_order_and_truncation() {
        let world = LocalComm::world(2);
        for i in 0..5u8 {
            world[0].isend(1, 3, &[i, i, i]);
        }
        let mut out = Vec::new();
        for _ in 0..5 {
            let mut b = [0u8; 1];
            out.push(world[1].irecv(0, 3, &mut b).wait().unwrap());
        }
        assert_eq!(out, (0u8..5).map(|i| vec![i]).collect::<Vec<_>>());
    }

    #[test]
    fn nocomm_reductions_are_identity() {
        let comm = NoComm;
        assert_eq!(comm.allreduce_min_i32(-3).unwrap(), -3);
        assert_eq!(comm.allreduce_max_i32(9).unwrap(), 9);
        comm.barrier().unwrap();
    }

    #[test]
    fn local_reductions_reach_every_rank() {
        let results: Vec<(i32, i32)> = std::thread::scope(|s| {
            let handles: Vec<_> = LocalComm::world(4)
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let v = comm.rank() as i32 * 10 - 5;
                        let lo = comm.allreduce_min_i32(v).unwrap();
                        let hi = comm.allreduce_max_i32(v).unwrap();
                        (lo, hi)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.iter().all(|&r| r == (-5, 25)));
    }

    #[test]
    fn truncated_reduction_message_is_an_error() {
        assert_eq!(
            decode_i32(Some(vec![1, 2]), 3),
            Err(ParMeshError::CommFailure {
                peer: 3,
                reason: "truncated reduction message"
            })
        );
    }
}
