use std::{sync::Arc, thread};

use crate::{
    error::{OptimizeErr, Result},
    storage::SharedReductionBuffer,
    synchronization::{BarrierSync, Synchronizer},
};

/// Runs `entry` on one OS thread per worker of the pool sharing `shared`.
///
/// Every thread gets its own `BarrierSync` and they all run the same protocol in lock-step.
/// A worker that panics or stops early leaves its peers blocked on the next barrier.
///
/// # Arguments
/// * `shared` - The buffer every worker reduces through.
/// * `entry` - The worker's body.
///
/// # Returns
/// The workers' results in rank order, or an error if a thread couldn't be spawned or
/// panicked.
pub fn spawn<T, F>(shared: &Arc<SharedReductionBuffer>, entry: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(BarrierSync) -> T + Sync,
{
    let contexts = (0..shared.workers())
        .map(|rank| shared.context(rank))
        .collect::<Result<Vec<_>>>()?;

    thread::scope(|s| -> Result<Vec<T>> {
        let entry = &entry;

        let handles = contexts
            .into_iter()
            .map(|sync| {
                let rank = sync.rank();
                thread::Builder::new()
                    .name(format!("worker-{rank}"))
                    .spawn_scoped(s, move || entry(sync))
                    .map(|handle| (rank, handle))
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        handles
            .into_iter()
            .map(|(rank, handle)| {
                handle
                    .join()
                    .map_err(|_| OptimizeErr::WorkerPanicked { rank })
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::{
        partition::partition,
        storage::{Phase, init_parallel_objects},
    };

    #[test]
    fn results_come_back_in_rank_order() {
        let shared = init_parallel_objects(NonZeroUsize::new(4).unwrap(), 2);

        let ranks = spawn(&shared, |sync| (sync.rank(), sync.range())).unwrap();
        let expected = partition(2, NonZeroUsize::new(4).unwrap());

        for (rank, (got, range)) in ranks.into_iter().enumerate() {
            assert_eq!(got, rank);
            assert_eq!(range, expected[rank]);
        }
    }

    #[test]
    fn workers_reduce_together() {
        let shared = init_parallel_objects(NonZeroUsize::new(3).unwrap(), 2);

        let sums = spawn(&shared, |sync| {
            let local = [sync.rank() as f64, 1.];
            sync.reduce_vector(Phase::Gradient, &local).unwrap()
        })
        .unwrap();

        for sum in sums {
            assert_eq!(sum, [3., 3.]);
        }
    }
}
