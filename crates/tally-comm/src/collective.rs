//! Typed collectives rooted at [`ROOT_RANK`].
//!
//! Every function here must be called by every rank of the world, in the
//! same order, or the world deadlocks (no timeout). With one rank they
//! complete without touching the communicator.

use tally_core::{CommError, ROOT_RANK};
use tracing::trace;

use crate::communicator::{CollectiveOp, Communicator, Message};

/// Replace `value` on every rank with rank 0's `value`.
pub fn broadcast<T>(comm: &dyn Communicator, value: &mut T) -> Result<(), CommError>
where
    T: Clone + Send + 'static,
{
    let (rank, size) = (comm.rank(), comm.size());
    if size <= 1 {
        return Ok(());
    }
    trace!(rank, size, "broadcast");
    if rank == ROOT_RANK {
        for dest in (0..size).filter(|&r| r != ROOT_RANK) {
            comm.send(dest, Message::new(CollectiveOp::Broadcast, value.clone()))?;
        }
    } else {
        *value = comm
            .recv(ROOT_RANK)?
            .open::<T>(CollectiveOp::Broadcast, ROOT_RANK)?;
    }
    Ok(())
}

/// Distribute rank 0's `input` one element per rank into `out`.
///
/// Rank 0 must pass exactly `size` entries; every other rank must pass
/// none. Both are checked locally before anything is sent.
pub fn scatter<T>(comm: &dyn Communicator, input: Vec<T>, out: &mut T) -> Result<(), CommError>
where
    T: Send + 'static,
{
    let (rank, size) = (comm.rank(), comm.size());
    let expected = if rank == ROOT_RANK { size } else { 0 };
    if input.len() != expected {
        return Err(CommError::CountMismatch {
            op: CollectiveOp::Scatter.name(),
            expected,
            actual: input.len(),
        });
    }
    trace!(rank, size, "scatter");
    if rank == ROOT_RANK {
        for (dest, item) in input.into_iter().enumerate() {
            if dest == ROOT_RANK {
                *out = item;
            } else {
                comm.send(dest, Message::new(CollectiveOp::Scatter, item))?;
            }
        }
    } else {
        *out = comm
            .recv(ROOT_RANK)?
            .open::<T>(CollectiveOp::Scatter, ROOT_RANK)?;
    }
    Ok(())
}

/// Collect every rank's `local` into `out` on rank 0, ordered by rank.
///
/// `out` is left untouched on every rank except rank 0.
pub fn gather<T>(comm: &dyn Communicator, local: T, out: &mut Vec<T>) -> Result<(), CommError>
where
    T: Send + 'static,
{
    let (rank, size) = (comm.rank(), comm.size());
    trace!(rank, size, "gather");
    if rank == ROOT_RANK {
        let mut gathered = Vec::with_capacity(size);
        let mut local = Some(local);
        for source in 0..size {
            if source == ROOT_RANK {
                if let Some(v) = local.take() {
                    gathered.push(v);
                }
            } else {
                gathered.push(
                    comm.recv(source)?
                        .open::<T>(CollectiveOp::Gather, source)?,
                );
            }
        }
        *out = gathered;
    } else {
        comm.send(ROOT_RANK, Message::new(CollectiveOp::Gather, local))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::run_spmd;
    use crate::serial::SerialComm;

    #[test]
    fn serial_collectives_are_identity() {
        let comm = SerialComm::new();
        let mut v = 7;
        broadcast(&comm, &mut v).unwrap();
        assert_eq!(v, 7);

        let mut out = 0;
        scatter(&comm, vec![11], &mut out).unwrap();
        assert_eq!(out, 11);

        let mut all = Vec::new();
        gather(&comm, 3, &mut all).unwrap();
        assert_eq!(all, vec![3]);
    }

    #[test]
    fn broadcast_copies_root_value() {
        let results = run_spmd(3, |comm| {
            let mut v = if comm.rank() == 0 { 42 } else { -1 };
            broadcast(&*comm, &mut v).unwrap();
            v
        })
        .unwrap();
        assert_eq!(results, vec![42, 42, 42]);
    }

    #[test]
    fn scatter_delivers_one_element_per_rank() {
        let results = run_spmd(3, |comm| {
            let input = if comm.rank() == 0 {
                vec![10, 20, 30]
            } else {
                Vec::new()
            };
            let mut out = 0;
            scatter(&*comm, input, &mut out).unwrap();
            out
        })
        .unwrap();
        assert_eq!(results, vec![10, 20, 30]);
    }

    #[test]
    fn scatter_rejects_wrong_root_length() {
        let comm = SerialComm::new();
        let mut out = 0;
        let err = scatter(&comm, vec![1, 2], &mut out).unwrap_err();
        assert_eq!(
            err,
            CommError::CountMismatch {
                op: "scatter",
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn gather_orders_by_rank_on_root_only() {
        let results = run_spmd(4, |comm| {
            let mut out = vec![-1.0];
            gather(&*comm, comm.rank() as f64, &mut out).unwrap();
            out
        })
        .unwrap();
        assert_eq!(results[0], vec![0.0, 1.0, 2.0, 3.0]);
        for untouched in &results[1..] {
            assert_eq!(untouched, &vec![-1.0]);
        }
    }

    #[test]
    fn back_to_back_collectives_stay_matched() {
        let results = run_spmd(3, |comm| {
            let mut sums = Vec::new();
            for step in 0..20 {
                let mut gathered = Vec::new();
                gather(&*comm, comm.rank() + step, &mut gathered).unwrap();
                let mut total: usize = gathered.iter().sum();
                broadcast(&*comm, &mut total).unwrap();
                sums.push(total);
            }
            sums
        })
        .unwrap();
        let expected: Vec<usize> = (0..20).map(|s| 3 * s + 3).collect();
        for sums in results {
            assert_eq!(sums, expected);
        }
    }
}
