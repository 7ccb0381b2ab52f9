mod finite_difference;

use crate::{
    config::CurvatureSpec,
    error::{OptimizeErr, Result},
    objective::{Accumulate, Objective, Slicer},
    synchronization::Synchronizer,
};

/// The damped curvature operator `v -> H·v + reg_coeff·v`, evaluated by every worker on its
/// own shard and summed across the pool.
///
/// All workers must call `apply` the same amount of times with the same direction.
pub struct ParallelHvp<'a, O: Objective, S> {
    objective: &'a O,
    sync: &'a S,
    params: &'a [f64],
    batch: &'a [O::Sample],
    slicer: Slicer,
    reg_coeff: f64,
    method: CurvatureSpec,
}

impl<'a, O, S> ParallelHvp<'a, O, S>
where
    O: Objective,
    S: Synchronizer,
{
    /// Creates a new `ParallelHvp` operator.
    ///
    /// # Arguments
    /// * `objective` - Evaluates the curvature of the constraint.
    /// * `sync` - This worker's synchronizer.
    /// * `params` - Where the curvature is evaluated.
    /// * `batch` - This worker's (possibly subsampled) shard.
    /// * `slicer` - How evaluator calls are split.
    /// * `reg_coeff` - The damping coefficient.
    /// * `method` - How the local product is computed.
    ///
    /// # Returns
    /// A new `ParallelHvp` instance.
    pub fn new(
        objective: &'a O,
        sync: &'a S,
        params: &'a [f64],
        batch: &'a [O::Sample],
        slicer: Slicer,
        reg_coeff: f64,
        method: CurvatureSpec,
    ) -> Self {
        Self {
            objective,
            sync,
            params,
            batch,
            slicer,
            reg_coeff,
            method,
        }
    }

    /// Computes the damped curvature product along `direction`.
    ///
    /// # Arguments
    /// * `direction` - A flat vector with the same length as the parameters.
    ///
    /// # Returns
    /// The reduced product, identical on every worker, or an error if `direction` has the
    /// wrong length or the objective can't evaluate the selected method.
    pub fn apply(&self, direction: &[f64]) -> Result<Vec<f64>> {
        if direction.len() != self.params.len() {
            return Err(OptimizeErr::SizeMismatch {
                what: "curvature direction",
                got: direction.len(),
                expected: self.params.len(),
            });
        }

        let local = match self.method {
            CurvatureSpec::Exact => self.slicer.eval(self.batch, |chunk| {
                self.objective
                    .curvature_product(self.params, direction, chunk)
            }),
            CurvatureSpec::FiniteDifference { base_eps, symmetric } => {
                finite_difference::product(
                    self.objective,
                    self.params,
                    direction,
                    self.batch,
                    self.slicer,
                    base_eps,
                    symmetric,
                )?
            }
        };

        // weighted like the gradient, the reduced operator is the mean curvature over all shards
        let local = local.scale(self.sync.avg_fac());
        self.sync.reduce_hvp(&local, self.reg_coeff, direction)
    }
}
