//! In-process SPMD world: one thread per rank, crossbeam channels between.
//!
//! [`ThreadComm::world`] builds `size` communicators joined by one
//! unbounded channel per ordered rank pair. Per-pair channels (rather
//! than one inbox per rank) keep a fast rank's next-collective message
//! from overtaking a slow rank's current one: each pair is FIFO and all
//! ranks issue collectives in the same order, so messages always match.

use std::io;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tally_core::CommError;
use tracing::debug;

use crate::communicator::{Communicator, Message};

/// One rank's endpoint in a thread-backed world.
///
/// Dropping a `ThreadComm` hangs up its outgoing channels, so a peer
/// blocked in `recv` on this rank gets [`CommError::Disconnected`]
/// rather than waiting forever.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    /// `outgoing[dest]` feeds the `(self.rank → dest)` channel.
    outgoing: Vec<Sender<Message>>,
    /// `incoming[source]` drains the `(source → self.rank)` channel.
    incoming: Vec<Receiver<Message>>,
}

impl ThreadComm {
    /// Build a fully connected world of `size` ranks.
    ///
    /// The returned vector is indexed by rank.
    ///
    /// # Panics
    ///
    /// Panics if `size == 0`.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        assert!(size >= 1, "a communicator world needs at least one rank");
        let mut senders: Vec<Vec<Sender<Message>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut receivers: Vec<Vec<Receiver<Message>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();

        for source in senders.iter_mut() {
            for dest_inbox in receivers.iter_mut() {
                let (tx, rx) = unbounded();
                source.push(tx);
                dest_inbox.push(rx);
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (outgoing, incoming))| ThreadComm {
                rank,
                size,
                outgoing,
                incoming,
            })
            .collect()
    }

    fn check_rank(&self, rank: usize) -> Result<(), CommError> {
        if rank < self.size {
            Ok(())
        } else {
            Err(CommError::InvalidRank {
                rank,
                size: self.size,
            })
        }
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, message: Message) -> Result<(), CommError> {
        self.check_rank(dest)?;
        self.outgoing[dest]
            .send(message)
            .map_err(|_| CommError::Disconnected { peer: dest })
    }

    fn recv(&self, source: usize) -> Result<Message, CommError> {
        self.check_rank(source)?;
        self.incoming[source]
            .recv()
            .map_err(|_| CommError::Disconnected { peer: source })
    }
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

/// Run `f` once per rank on a fresh `size`-rank [`ThreadComm`] world.
///
/// Each rank runs on its own named thread (`tally-rank-N`). Returns the
/// per-rank results indexed by rank once every rank has finished. A
/// panic on any rank is resumed on the caller after all ranks have been
/// joined.
///
/// # Errors
///
/// Returns the OS error if a rank thread cannot be spawned. Ranks that
/// were already running observe the missing peer as
/// [`CommError::Disconnected`] and finish.
///
/// # Panics
///
/// Panics if `size == 0`, or re-raises a rank's panic.
pub fn run_spmd<R, F>(size: usize, f: F) -> io::Result<Vec<R>>
where
    F: Fn(Arc<dyn Communicator>) -> R + Sync,
    R: Send,
{
    let comms = ThreadComm::world(size);
    debug!(size, "starting SPMD world");
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(size);
        for comm in comms {
            let f = &f;
            let handle = thread::Builder::new()
                .name(format!("tally-rank-{}", comm.rank))
                .spawn_scoped(scope, move || f(Arc::new(comm)))?;
            handles.push(handle);
        }

        let mut results = Vec::with_capacity(size);
        let mut panic_payload = None;
        for handle in handles {
            match handle.join() {
                Ok(r) => results.push(r),
                Err(payload) => {
                    panic_payload.get_or_insert(payload);
                }
            }
        }
        if let Some(payload) = panic_payload {
            std::panic::resume_unwind(payload);
        }
        Ok(results)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::CollectiveOp;

    #[test]
    fn world_ranks_are_indexed() {
        let world = ThreadComm::world(3);
        let ranks: Vec<usize> = world.iter().map(|c| c.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
        assert!(world.iter().all(|c| c.size() == 3));
    }

    #[test]
    fn point_to_point_is_fifo_per_pair() {
        let world = ThreadComm::world(2);
        for i in 0..5u32 {
            world[0]
                .send(1, Message::new(CollectiveOp::Broadcast, i))
                .unwrap();
        }
        for i in 0..5u32 {
            let got = world[1]
                .recv(0)
                .unwrap()
                .open::<u32>(CollectiveOp::Broadcast, 0)
                .unwrap();
            assert_eq!(got, i);
        }
    }

    #[test]
    fn dropped_peer_reports_disconnected() {
        let mut world = ThreadComm::world(2);
        let rank1 = world.pop().unwrap();
        drop(world);
        assert_eq!(
            rank1.recv(0).unwrap_err(),
            CommError::Disconnected { peer: 0 }
        );
    }

    #[test]
    fn out_of_range_rank_rejected() {
        let world = ThreadComm::world(2);
        assert_eq!(
            world[0].recv(5).unwrap_err(),
            CommError::InvalidRank { rank: 5, size: 2 }
        );
    }

    #[test]
    fn run_spmd_returns_results_by_rank() {
        let results = run_spmd(4, |comm| comm.rank() * 10).unwrap();
        assert_eq!(results, vec![0, 10, 20, 30]);
    }
}
