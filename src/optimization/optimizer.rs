use std::num::NonZeroUsize;

use log::{debug, info, warn};
use ndarray::{Array1, ArrayView1};
use rand::{SeedableRng, rngs::StdRng};

use super::{
    line_search::{TrustRegionLineSearch, initial_step_size},
    report::{LineSearchOutcome, UpdateReport},
};
use crate::{
    config::{CurvatureSpec, OptimizerConfig},
    curvature::ParallelHvp,
    error::{OptimizeErr, Result},
    objective::{Accumulate, Objective, Parameterized, Slicer, subsample},
    solve::ConjugateGradient,
    storage::Phase,
    synchronization::{BarrierSync, SoloSync, Synchronizer},
};

/// A conjugate gradient optimizer taking part in a pool of workers through a `BarrierSync`.
pub type ParallelOptimizer<O> = ConjugateGradientOptimizer<O, BarrierSync>;

/// A conjugate gradient optimizer running on its own.
pub type SerialOptimizer<O> = ConjugateGradientOptimizer<O, SoloSync>;

/// Performs constrained updates: the descent direction solves `H·x = g` with conjugate gradient
/// and a backtracking line search keeps the constraint within the trust region.
///
/// Every worker of a pool owns one of these, with its own copy of the objective, and calls the
/// same methods in the same order on its own shard of the data.
pub struct ConjugateGradientOptimizer<O: Objective, S: Synchronizer> {
    objective: O,
    sync: S,
    slicer: Slicer,
    solver: ConjugateGradient,
    line_search: TrustRegionLineSearch,
    curvature: CurvatureSpec,
    reg_coeff: f64,
    subsample_factor: f64,
    constraint_name: String,
    rng: StdRng,
}

fn generate_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

impl<O, S> ConjugateGradientOptimizer<O, S>
where
    O: Objective,
    S: Synchronizer,
{
    /// Creates a new `ConjugateGradientOptimizer`.
    ///
    /// # Arguments
    /// * `objective` - Evaluates the loss, the constraint and their derivatives.
    /// * `sync` - This worker's synchronizer.
    /// * `config` - The optimizer's settings.
    ///
    /// # Returns
    /// A new `ConjugateGradientOptimizer` instance or an `InvalidConfig` error.
    pub fn new(objective: O, sync: S, config: &OptimizerConfig) -> Result<Self> {
        config.validate()?;

        let slices = NonZeroUsize::new(config.num_slices)
            .ok_or_else(|| OptimizeErr::InvalidConfig("num_slices must be at least 1".into()))?;

        let line_search = TrustRegionLineSearch::new(
            config.max_constraint_val,
            config.backtrack_ratio,
            config.max_backtracks,
        )
        .with_accept_violation(config.accept_violation);

        let rank = sync.rank() as u64;

        Ok(Self {
            objective,
            slicer: Slicer::new(slices),
            solver: ConjugateGradient::new(config.cg_iters).with_residual_tol(config.residual_tol),
            line_search,
            curvature: config.curvature,
            reg_coeff: config.reg_coeff,
            subsample_factor: config.subsample_factor,
            constraint_name: config.constraint_name.clone(),
            rng: generate_rng(config.seed.map(|seed| seed.wrapping_add(rank))),
            sync,
        })
    }

    pub fn objective(&self) -> &O {
        &self.objective
    }

    pub fn objective_mut(&mut self) -> &mut O {
        &mut self.objective
    }

    pub fn sync(&self) -> &S {
        &self.sync
    }

    /// Computes the mean loss over every worker's shard.
    ///
    /// # Arguments
    /// * `params` - Where the loss is evaluated, identical on every worker.
    /// * `batch` - This worker's shard.
    ///
    /// # Returns
    /// The reduced loss, identical on every worker.
    pub fn loss(&self, params: &[f64], batch: &[O::Sample]) -> Result<f64> {
        let local = self
            .slicer
            .eval(batch, |chunk| self.objective.loss(params, chunk));

        let [loss] = self.sync.reduce_scalars(Phase::Loss, [local])?;
        self.sync.release(Phase::Loss);
        Ok(loss)
    }

    /// Computes the mean constraint over every worker's shard.
    ///
    /// # Arguments
    /// * `params` - Where the constraint is evaluated, identical on every worker.
    /// * `batch` - This worker's shard.
    ///
    /// # Returns
    /// The reduced constraint, identical on every worker.
    pub fn constraint_val(&self, params: &[f64], batch: &[O::Sample]) -> Result<f64> {
        let local = self
            .slicer
            .eval(batch, |chunk| self.objective.constraint(params, chunk));

        let [constraint] = self.sync.reduce_scalars(Phase::Constraint, [local])?;
        self.sync.release(Phase::Constraint);
        Ok(constraint)
    }

    /// Performs a single constrained update of `target`.
    ///
    /// # Arguments
    /// * `target` - The model being optimized, with the same parameters on every worker.
    /// * `batch` - This worker's shard of the data.
    ///
    /// # Returns
    /// The update's diagnostics, or an error if the objective's output doesn't match the
    /// parameters or it can't evaluate the configured curvature.
    pub fn optimize<T>(&mut self, target: &mut T, batch: &[O::Sample]) -> Result<UpdateReport>
    where
        T: Parameterized + ?Sized,
    {
        let leader = self.sync.is_leader();
        let prev = target.params().to_vec();

        if leader {
            info!("computing loss before");
        }

        let local_loss = self
            .slicer
            .eval(batch, |chunk| self.objective.loss(&prev, chunk));
        let [loss_before] = self.sync.reduce_scalars(Phase::Baseline, [local_loss])?;

        if leader {
            info!("computing descent direction");
        }

        let local_grad = self
            .slicer
            .eval(batch, |chunk| self.objective.gradient(&prev, chunk));

        if local_grad.len() != prev.len() {
            return Err(OptimizeErr::SizeMismatch {
                what: "gradient",
                got: local_grad.len(),
                expected: prev.len(),
            });
        }

        let local_grad = local_grad.scale(self.sync.avg_fac());
        let flat_g = self.sync.reduce_vector(Phase::Gradient, &local_grad)?;

        let sub_batch = subsample(batch, self.subsample_factor, &mut self.rng);
        let hvp = ParallelHvp::new(
            &self.objective,
            &self.sync,
            &prev,
            &sub_batch,
            self.slicer,
            self.reg_coeff,
            self.curvature,
        );

        let direction = self
            .solver
            .solve(
                |p| hvp.apply(&p.to_vec()).map(Array1::from),
                ArrayView1::from(flat_g.as_slice()),
            )?
            .to_vec();

        let hd = hvp.apply(&direction)?;
        let curvature: f64 = direction.iter().zip(&hd).map(|(d, h)| d * h).sum();
        let step_size = initial_step_size(self.line_search.max_constraint_val(), curvature);

        if leader {
            debug!(rank = self.sync.rank(), curvature = curvature; "descent direction computed");

            if !(curvature > 0.) {
                debug!("non positive curvature along the descent direction, using a unit step");
            }
        }

        let step = direction.scale(step_size);
        let result = self
            .line_search
            .search(&self.sync, target, &prev, &step, loss_before, |params| {
                self.slicer.eval(batch, |chunk| {
                    self.objective.loss_and_constraint(params, chunk)
                })
            })?;

        if leader {
            info!("backtrack iters: {}", result.backtracks);
            self.log_outcome(&result.outcome);

            if let Some(constraint) = result.constraint {
                info!("{} after: {constraint:.6}", self.constraint_name);
            }
        }

        Ok(UpdateReport {
            loss_before,
            loss_after: result.loss,
            constraint_after: result.constraint,
            initial_step_size: step_size,
            backtracks: result.backtracks,
            outcome: result.outcome,
        })
    }

    fn log_outcome(&self, outcome: &LineSearchOutcome) {
        match outcome {
            LineSearchOutcome::Accepted => {}
            LineSearchOutcome::AcceptedWithViolation(_) => {
                warn!("line search condition violated, keeping the last trial");
            }
            LineSearchOutcome::Rejected(violations) if violations.is_empty() => {
                warn!("no backtracking trial evaluated, rejecting the step");
            }
            LineSearchOutcome::Rejected(_) => {
                warn!("line search condition violated, rejecting the step");
            }
        }

        for violation in outcome.violations() {
            warn!(constraint = self.constraint_name.as_str(); "{violation}");
        }
    }
}
