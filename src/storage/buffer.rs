use std::{num::NonZeroUsize, sync::Arc};

use parking_lot::RwLock;

use super::{
    ScalarAccumulator,
    barriers::{BarrierSet, GATHER, Phase, REDUCE, RELEASE},
};
use crate::{
    error::{OptimizeErr, Result},
    partition::{WorkRange, partition},
    synchronization::BarrierSync,
};

/// Shared scratch memory used to sum per-worker partial results.
///
/// It holds an `N x W` matrix where column `r` belongs to the worker of rank `r`, the reduced
/// vector split in one shard per worker range, a scalar accumulator per scalar phase and the
/// barriers gating every phase.
///
/// Workers never write the same location concurrently: each one writes its own column, then
/// its own shard of the output, and scalars are only touched under their mutex.
#[derive(Debug)]
pub struct SharedReductionBuffer {
    nparams: usize,
    ranges: Box<[WorkRange]>,
    columns: Box<[RwLock<Box<[f64]>>]>,
    flat: Box<[RwLock<Box<[f64]>>]>,
    baseline: ScalarAccumulator,
    loss: ScalarAccumulator,
    constraint: ScalarAccumulator,
    backtrack: ScalarAccumulator,
    barriers: BarrierSet,
}

/// Allocates the shared reduction objects before any worker starts.
///
/// # Arguments
/// * `workers` - The amount of workers in the pool.
/// * `nparams` - The length of the parameter vector.
///
/// # Returns
/// The buffer, ready to be handed to every worker.
pub fn init_parallel_objects(workers: NonZeroUsize, nparams: usize) -> Arc<SharedReductionBuffer> {
    Arc::new(SharedReductionBuffer::new(workers, nparams))
}

impl SharedReductionBuffer {
    /// Creates a new `SharedReductionBuffer`.
    ///
    /// # Arguments
    /// * `workers` - The amount of workers in the pool.
    /// * `nparams` - The length of every reduced vector.
    ///
    /// # Returns
    /// A new `SharedReductionBuffer` instance.
    pub fn new(workers: NonZeroUsize, nparams: usize) -> Self {
        let ranges = partition(nparams, workers);

        let columns = (0..workers.get())
            .map(|_| RwLock::new(vec![0.; nparams].into_boxed_slice()))
            .collect();

        let flat = ranges
            .iter()
            .map(|range| RwLock::new(vec![0.; range.len()].into_boxed_slice()))
            .collect();

        Self {
            nparams,
            ranges: ranges.into_boxed_slice(),
            columns,
            flat,
            baseline: ScalarAccumulator::new(Phase::Baseline.scalars()),
            loss: ScalarAccumulator::new(Phase::Loss.scalars()),
            constraint: ScalarAccumulator::new(Phase::Constraint.scalars()),
            backtrack: ScalarAccumulator::new(Phase::Backtrack.scalars()),
            barriers: BarrierSet::new(workers.get()),
        }
    }

    /// Returns the amount of workers sharing this buffer.
    pub fn workers(&self) -> usize {
        self.ranges.len()
    }

    /// Returns the length of the reduced vectors.
    pub fn len(&self) -> usize {
        self.nparams
    }

    pub fn is_empty(&self) -> bool {
        self.nparams == 0
    }

    /// Returns the range of the reduced vector owned by `rank`.
    pub fn range(&self, rank: usize) -> Option<WorkRange> {
        self.ranges.get(rank).copied()
    }

    /// Builds the execution context of the worker with the given rank.
    ///
    /// # Arguments
    /// * `rank` - The rank of the worker, must be smaller than the amount of workers.
    ///
    /// # Returns
    /// The worker's synchronizer or an `InvalidRank` error.
    pub fn context(self: &Arc<Self>, rank: usize) -> Result<BarrierSync> {
        BarrierSync::new(Arc::clone(self), rank)
    }

    /// Sums `local` across every worker.
    ///
    /// # Arguments
    /// * `phase` - The phase whose barriers gate this reduction.
    /// * `rank` - The rank of the calling worker.
    /// * `local` - This worker's contribution.
    ///
    /// # Returns
    /// The element-wise sum of every contribution, identical on every worker, or a
    /// `SizeMismatch` error if `local` doesn't have the buffer's length.
    pub(crate) fn reduce_vector(
        &self,
        phase: Phase,
        rank: usize,
        local: &[f64],
    ) -> Result<Vec<f64>> {
        self.check_len("local contribution", local.len())?;

        self.gather(phase, rank, local);
        self.barriers.wait(phase, REDUCE);
        Ok(self.pull())
    }

    /// Sums `local` across every worker and adds `coeff * x` once to the result.
    ///
    /// The leader of the reduce barrier performs the addition and a release barrier keeps
    /// everyone from reading before it's done.
    ///
    /// # Arguments
    /// * `rank` - The rank of the calling worker.
    /// * `local` - This worker's contribution.
    /// * `coeff` - The regularization coefficient.
    /// * `x` - The vector to regularize with, identical on every worker.
    ///
    /// # Returns
    /// The regularized sum or a `SizeMismatch` error.
    pub(crate) fn reduce_regularized(
        &self,
        rank: usize,
        local: &[f64],
        coeff: f64,
        x: &[f64],
    ) -> Result<Vec<f64>> {
        self.check_len("local contribution", local.len())?;
        self.check_len("regularization vector", x.len())?;

        self.gather(Phase::Hvp, rank, local);

        if self.barriers.wait(Phase::Hvp, REDUCE).is_leader() {
            self.add_scaled(coeff, x);
        }

        self.barriers.wait(Phase::Hvp, RELEASE);
        Ok(self.pull())
    }

    /// Sums `local * weight` across every worker.
    ///
    /// Rank 0 resets the accumulator with its own contribution before the gather barrier, the
    /// rest add theirs after it. The accumulator must not be reused before every worker passes
    /// the phase's `RELEASE` barrier.
    ///
    /// # Arguments
    /// * `phase` - A scalar phase.
    /// * `rank` - The rank of the calling worker.
    /// * `local` - This worker's scalars, exactly `phase.scalars()` of them.
    /// * `weight` - The weight of this worker's contribution.
    /// * `out` - Where the reduced scalars are written.
    ///
    /// # Returns
    /// A `SizeMismatch` error if `local` or `out` don't match the accumulator, or
    /// `Unsupported` if `phase` doesn't reduce scalars.
    pub(crate) fn reduce_scalars(
        &self,
        phase: Phase,
        rank: usize,
        local: &[f64],
        weight: f64,
        out: &mut [f64],
    ) -> Result<()> {
        let acc = self.accumulator(phase)?;

        if local.len() != acc.len() || out.len() != acc.len() {
            return Err(OptimizeErr::SizeMismatch {
                what: "scalar reduction",
                got: local.len().max(out.len()),
                expected: acc.len(),
            });
        }

        if rank == 0 {
            acc.reset(local, weight);
            self.barriers.wait(phase, GATHER);
        } else {
            self.barriers.wait(phase, GATHER);
            acc.add(local, weight);
        }

        self.barriers.wait(phase, REDUCE);
        acc.read(out);
        Ok(())
    }

    /// Blocks until every worker reaches the `RELEASE` barrier of `phase`.
    pub(crate) fn release(&self, phase: Phase) {
        self.barriers.wait(phase, RELEASE);
    }

    fn accumulator(&self, phase: Phase) -> Result<&ScalarAccumulator> {
        match phase {
            Phase::Baseline => Ok(&self.baseline),
            Phase::Loss => Ok(&self.loss),
            Phase::Constraint => Ok(&self.constraint),
            Phase::Backtrack => Ok(&self.backtrack),
            Phase::Gradient | Phase::Hvp => Err(OptimizeErr::Unsupported(
                "scalar reductions over a vector phase",
            )),
        }
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.nparams {
            return Err(OptimizeErr::SizeMismatch {
                what,
                got,
                expected: self.nparams,
            });
        }

        Ok(())
    }

    /// Writes `local` in this worker's column and sums the owned rows of every column.
    fn gather(&self, phase: Phase, rank: usize, local: &[f64]) {
        self.columns[rank].write().copy_from_slice(local);
        self.barriers.wait(phase, GATHER);

        let range = self.ranges[rank].as_range();
        let mut shard = self.flat[rank].write();
        shard.fill(0.);

        for column in self.columns.iter() {
            let column = column.read();

            shard
                .iter_mut()
                .zip(&column[range.clone()])
                .for_each(|(acc, v)| *acc += v);
        }
    }

    fn add_scaled(&self, coeff: f64, x: &[f64]) {
        for (shard, range) in self.flat.iter().zip(self.ranges.iter()) {
            shard
                .write()
                .iter_mut()
                .zip(&x[range.as_range()])
                .for_each(|(acc, v)| *acc += coeff * v);
        }
    }

    /// Gathers every shard of the reduced vector into a local buffer.
    fn pull(&self) -> Vec<f64> {
        let mut out = vec![0.; self.nparams];

        for (shard, range) in self.flat.iter().zip(self.ranges.iter()) {
            out[range.as_range()].copy_from_slice(&shard.read());
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn buffer(workers: usize, nparams: usize) -> SharedReductionBuffer {
        SharedReductionBuffer::new(NonZeroUsize::new(workers).unwrap(), nparams)
    }

    #[test]
    fn single_worker_reduction_is_identity() {
        let buf = buffer(1, 5);
        let local = [1., 2., 3., 4., 5.];

        let out = buf.reduce_vector(Phase::Gradient, 0, &local).unwrap();
        assert_eq!(out, local);
    }

    #[test]
    fn regularization_is_applied_once() {
        const WORKERS: usize = 3;
        let buf = buffer(WORKERS, 4);
        let x = [1., 1., 2., 2.];

        let outs: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..WORKERS)
                .map(|rank| {
                    let buf = &buf;
                    s.spawn(move || buf.reduce_regularized(rank, &[1.; 4], 0.5, &x).unwrap())
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for out in outs {
            assert_eq!(out, [3.5, 3.5, 4., 4.]);
        }
    }

    #[test]
    fn size_mismatch_is_reported_before_synchronizing() {
        let buf = buffer(2, 3);

        let err = buf.reduce_vector(Phase::Gradient, 0, &[1.; 2]).unwrap_err();
        assert!(matches!(
            err,
            OptimizeErr::SizeMismatch {
                got: 2,
                expected: 3,
                ..
            }
        ));

        let mut out = [0.; 2];
        let err = buf
            .reduce_scalars(Phase::Loss, 0, &[1.; 2], 1., &mut out)
            .unwrap_err();
        assert!(matches!(err, OptimizeErr::SizeMismatch { .. }));
    }

    #[test]
    fn vector_phases_reject_scalar_reductions() {
        let buf = buffer(1, 3);
        let mut out = [0.];

        let err = buf
            .reduce_scalars(Phase::Hvp, 0, &[1.], 1., &mut out)
            .unwrap_err();
        assert!(matches!(err, OptimizeErr::Unsupported(_)));
    }

    #[test]
    fn accumulators_match_phase_arity() {
        let buf = buffer(1, 3);

        for phase in Phase::ALL {
            let arity = phase.scalars();
            if arity == 0 {
                continue;
            }

            let local = vec![1.; arity];
            let mut out = vec![0.; arity];
            buf.reduce_scalars(phase, 0, &local, 0.5, &mut out).unwrap();
            assert_eq!(out, vec![0.5; arity], "{phase:?}");

            let mut wider = vec![0.; arity + 1];
            let err = buf
                .reduce_scalars(phase, 0, &vec![1.; arity + 1], 1., &mut wider)
                .unwrap_err();
            assert!(matches!(err, OptimizeErr::SizeMismatch { .. }), "{phase:?}");
        }
    }

    #[test]
    fn context_rejects_out_of_range_rank() {
        let buf = Arc::new(buffer(2, 3));

        assert!(buf.context(1).is_ok());
        assert!(matches!(
            buf.context(2).unwrap_err(),
            OptimizeErr::InvalidRank {
                rank: 2,
                workers: 2
            }
        ));
    }
}
