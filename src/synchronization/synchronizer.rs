use crate::{error::Result, storage::Phase};

/// The collective operations a worker needs to take part in an update.
///
/// Every worker of a pool must call the same operations in the same order, otherwise they
/// deadlock on the next barrier. After any reduction every worker reads the same value.
pub trait Synchronizer: Send + Sync {
    /// The rank of this worker, in `[0, workers)`.
    fn rank(&self) -> usize;

    /// The amount of workers taking part in every reduction.
    fn workers(&self) -> usize;

    /// The weight of this worker's contribution to a mean.
    fn avg_fac(&self) -> f64;

    /// Whether this worker speaks for the pool in logs.
    fn is_leader(&self) -> bool {
        self.rank() == 0
    }

    /// Sums `local` element-wise across every worker.
    ///
    /// # Arguments
    /// * `phase` - The phase whose barriers gate this reduction.
    /// * `local` - This worker's contribution, already weighted.
    ///
    /// # Returns
    /// The reduced vector or a `SizeMismatch` error.
    fn reduce_vector(&self, phase: Phase, local: &[f64]) -> Result<Vec<f64>>;

    /// Sums the local curvature products across every worker and adds `reg_coeff * direction`
    /// exactly once.
    ///
    /// # Arguments
    /// * `local` - This worker's curvature product, already weighted.
    /// * `reg_coeff` - The damping coefficient.
    /// * `direction` - The direction the product was evaluated on.
    ///
    /// # Returns
    /// The regularized product or a `SizeMismatch` error.
    fn reduce_hvp(&self, local: &[f64], reg_coeff: f64, direction: &[f64]) -> Result<Vec<f64>>;

    /// Computes the weighted mean of `N` scalars across every worker.
    ///
    /// The accumulator of `phase` must be released with `release` before it's reduced again.
    /// `N` must equal `phase.scalars()`: one for `Baseline`, `Loss` and `Constraint`, two
    /// (loss and constraint) for `Backtrack`.
    ///
    /// # Arguments
    /// * `phase` - A scalar phase.
    /// * `local` - This worker's scalars, each contribution is weighted by `avg_fac`.
    ///
    /// # Returns
    /// The reduced scalars, a `SizeMismatch` error if `N` doesn't match the phase or
    /// `Unsupported` for a vector phase.
    fn reduce_scalars<const N: usize>(&self, phase: Phase, local: [f64; N]) -> Result<[f64; N]>;

    /// Waits for every worker to be done reading the result of `phase`.
    fn release(&self, phase: Phase);
}
