use super::report::{LineSearchOutcome, Violation};
use crate::{
    error::{OptimizeErr, Result},
    objective::Parameterized,
    storage::Phase,
    synchronization::Synchronizer,
};

/// Computes the largest step along `d` that keeps the quadratic model of the constraint within
/// `max_constraint_val`, `sqrt(2δ / (dᵀ·A·d + 1e-8))`.
///
/// Falls back to `1` when the curvature along `d` isn't positive or the step isn't finite.
///
/// # Arguments
/// * `max_constraint_val` - The trust region's bound `δ`.
/// * `curvature` - The quadratic form `dᵀ·A·d`.
///
/// # Returns
/// The initial step size.
pub fn initial_step_size(max_constraint_val: f64, curvature: f64) -> f64 {
    if !(curvature > 0.) {
        return 1.;
    }

    let step = (2. * max_constraint_val / (curvature + 1e-8)).sqrt();
    if step.is_finite() { step } else { 1. }
}

/// The result of a line search, identical on every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSearchResult {
    /// The loss at the target's parameters after the search.
    pub loss: f64,
    /// The constraint at the target's parameters, `None` if they were restored.
    pub constraint: Option<f64>,
    pub backtracks: usize,
    pub outcome: LineSearchOutcome,
}

/// Backtracking search along a descent step that only accepts trials improving the loss while
/// staying inside the trust region.
///
/// The accept decision is taken on reduced values, so every worker takes the same one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustRegionLineSearch {
    max_constraint_val: f64,
    backtrack_ratio: f64,
    max_backtracks: usize,
    accept_violation: bool,
}

impl TrustRegionLineSearch {
    /// Creates a new `TrustRegionLineSearch`.
    ///
    /// # Arguments
    /// * `max_constraint_val` - The trust region's bound.
    /// * `backtrack_ratio` - The factor the step shrinks by after every failed trial.
    /// * `max_backtracks` - The amount of trials to evaluate at most.
    ///
    /// # Returns
    /// A new `TrustRegionLineSearch` instance that restores the parameters on failure.
    pub fn new(max_constraint_val: f64, backtrack_ratio: f64, max_backtracks: usize) -> Self {
        Self {
            max_constraint_val,
            backtrack_ratio,
            max_backtracks,
            accept_violation: false,
        }
    }

    /// Keeps the last trial when no trial is acceptable.
    pub fn with_accept_violation(mut self, accept_violation: bool) -> Self {
        self.accept_violation = accept_violation;
        self
    }

    pub fn max_constraint_val(&self) -> f64 {
        self.max_constraint_val
    }

    /// Whether a trial with the given reduced values may be committed.
    pub fn is_acceptable(&self, loss: f64, constraint: f64, loss_before: f64) -> bool {
        self.violations(loss, constraint, loss_before).is_empty()
    }

    /// Lists every condition a trial fails.
    pub fn violations(&self, loss: f64, constraint: f64, loss_before: f64) -> Vec<Violation> {
        let mut violations = Vec::new();

        if !loss.is_finite() {
            violations.push(Violation::LossNotFinite);
        }
        if !constraint.is_finite() {
            violations.push(Violation::ConstraintNotFinite);
        }
        if loss.is_finite() && !(loss < loss_before) {
            violations.push(Violation::LossNotImproving);
        }
        if constraint.is_finite() && !(constraint <= self.max_constraint_val) {
            violations.push(Violation::ConstraintExceeded);
        }

        violations
    }

    /// Evaluates `prev - ratioⁿ·step` for `n = 0, 1, ...` until a trial is acceptable.
    ///
    /// Every worker must call this with the same `prev` and `step`. Each trial is committed to
    /// `target` before `evaluate` runs, and trials that don't end the search release the
    /// backtrack accumulator before the next one.
    ///
    /// # Arguments
    /// * `sync` - This worker's synchronizer.
    /// * `target` - The model being updated, holds `prev` on entry.
    /// * `prev` - The parameters before the update.
    /// * `step` - The full step, already scaled by the initial step size.
    /// * `loss_before` - The reduced loss at `prev`.
    /// * `evaluate` - Computes this worker's `(loss, constraint)` at the given parameters.
    ///
    /// # Returns
    /// The result of the search, or an error if the lengths don't match or a reduction fails.
    pub fn search<S, T, F>(
        &self,
        sync: &S,
        target: &mut T,
        prev: &[f64],
        step: &[f64],
        loss_before: f64,
        mut evaluate: F,
    ) -> Result<LineSearchResult>
    where
        S: Synchronizer,
        T: Parameterized + ?Sized,
        F: FnMut(&[f64]) -> (f64, f64),
    {
        if step.len() != prev.len() {
            return Err(OptimizeErr::SizeMismatch {
                what: "descent step",
                got: step.len(),
                expected: prev.len(),
            });
        }

        if target.param_count() != prev.len() {
            return Err(OptimizeErr::SizeMismatch {
                what: "target parameters",
                got: target.param_count(),
                expected: prev.len(),
            });
        }

        let mut trial = vec![0.; prev.len()];
        let mut last = None;
        let mut backtracks = 0;

        for n in 0..self.max_backtracks {
            let ratio = self.backtrack_ratio.powi(n as i32);

            trial
                .iter_mut()
                .zip(prev.iter().zip(step))
                .for_each(|(t, (p, s))| *t = p - ratio * s);

            target.set_params(&trial);
            let (loss, constraint) = evaluate(&trial);
            let [loss, constraint] = sync.reduce_scalars(Phase::Backtrack, [loss, constraint])?;

            backtracks = n + 1;
            last = Some((loss, constraint));

            if self.is_acceptable(loss, constraint, loss_before) {
                break;
            }

            sync.release(Phase::Backtrack);
        }

        let Some((loss, constraint)) = last else {
            return Ok(LineSearchResult {
                loss: loss_before,
                constraint: None,
                backtracks,
                outcome: LineSearchOutcome::Rejected(Vec::new()),
            });
        };

        let violations = self.violations(loss, constraint, loss_before);

        let result = if violations.is_empty() {
            LineSearchResult {
                loss,
                constraint: Some(constraint),
                backtracks,
                outcome: LineSearchOutcome::Accepted,
            }
        } else if self.accept_violation {
            LineSearchResult {
                loss,
                constraint: Some(constraint),
                backtracks,
                outcome: LineSearchOutcome::AcceptedWithViolation(violations),
            }
        } else {
            target.set_params(prev);
            LineSearchResult {
                loss: loss_before,
                constraint: None,
                backtracks,
                outcome: LineSearchOutcome::Rejected(violations),
            }
        };

        Ok(result)
    }
}
