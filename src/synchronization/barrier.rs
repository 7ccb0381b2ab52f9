use std::sync::Arc;

use super::Synchronizer;
use crate::{
    error::{OptimizeErr, Result},
    partition::WorkRange,
    storage::{Phase, SharedReductionBuffer},
};

/// Synchronizes a worker with its peers through a `SharedReductionBuffer`.
#[derive(Debug, Clone)]
pub struct BarrierSync {
    rank: usize,
    range: WorkRange,
    avg_fac: f64,
    shared: Arc<SharedReductionBuffer>,
}

impl BarrierSync {
    /// Creates a new `BarrierSync` synchronizer.
    ///
    /// # Arguments
    /// * `shared` - The buffer shared by the whole pool.
    /// * `rank` - The rank of this worker.
    ///
    /// # Returns
    /// A new `BarrierSync` instance weighting contributions by `1 / workers`, or an
    /// `InvalidRank` error.
    pub fn new(shared: Arc<SharedReductionBuffer>, rank: usize) -> Result<Self> {
        let workers = shared.workers();
        let Some(range) = shared.range(rank) else {
            return Err(OptimizeErr::InvalidRank { rank, workers });
        };

        Ok(Self {
            rank,
            range,
            avg_fac: 1. / workers as f64,
            shared,
        })
    }

    /// Overrides the averaging weight, useful when shards have uneven sizes.
    pub fn with_avg_fac(mut self, avg_fac: f64) -> Self {
        self.avg_fac = avg_fac;
        self
    }

    /// The range of every reduced vector this worker sums.
    pub fn range(&self) -> WorkRange {
        self.range
    }
}

impl Synchronizer for BarrierSync {
    fn rank(&self) -> usize {
        self.rank
    }

    fn workers(&self) -> usize {
        self.shared.workers()
    }

    fn avg_fac(&self) -> f64 {
        self.avg_fac
    }

    fn reduce_vector(&self, phase: Phase, local: &[f64]) -> Result<Vec<f64>> {
        self.shared.reduce_vector(phase, self.rank, local)
    }

    fn reduce_hvp(&self, local: &[f64], reg_coeff: f64, direction: &[f64]) -> Result<Vec<f64>> {
        self.shared
            .reduce_regularized(self.rank, local, reg_coeff, direction)
    }

    fn reduce_scalars<const N: usize>(&self, phase: Phase, local: [f64; N]) -> Result<[f64; N]> {
        let mut out = [0.; N];
        self.shared
            .reduce_scalars(phase, self.rank, &local, self.avg_fac, &mut out)?;
        Ok(out)
    }

    fn release(&self, phase: Phase) {
        self.shared.release(phase);
    }
}
