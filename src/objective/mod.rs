mod least_squares;
mod slicing;

pub use least_squares::{LeastSquares, Observation};
pub use slicing::{Accumulate, Slicer, subsample};

/// Evaluates a differentiable objective and its trust-region constraint on a batch of samples.
///
/// Every method returns the mean over `batch`, so that weighting each worker's result by its
/// share of the data yields the mean over the whole dataset.
pub trait Objective: Send + Sync {
    type Sample: Clone + Send + Sync;

    /// The surrogate loss being minimized.
    fn loss(&self, params: &[f64], batch: &[Self::Sample]) -> f64;

    /// The gradient of `loss` with respect to `params`.
    fn gradient(&self, params: &[f64], batch: &[Self::Sample]) -> Vec<f64>;

    /// The constraint bounded by the trust region.
    fn constraint(&self, params: &[f64], batch: &[Self::Sample]) -> f64;

    /// The product of the constraint's curvature at `params` with `direction`.
    ///
    /// # Arguments
    /// * `params` - Where the curvature is evaluated.
    /// * `direction` - A flat vector with the same length as `params`.
    /// * `batch` - The samples to average over.
    fn curvature_product(
        &self,
        params: &[f64],
        direction: &[f64],
        batch: &[Self::Sample],
    ) -> Vec<f64>;

    /// Evaluates `loss` and `constraint` together, overriding it lets both share work.
    fn loss_and_constraint(&self, params: &[f64], batch: &[Self::Sample]) -> (f64, f64) {
        (self.loss(params, batch), self.constraint(params, batch))
    }

    /// The gradient of `constraint`, required by finite difference curvature products.
    fn constraint_gradient(&self, _params: &[f64], _batch: &[Self::Sample]) -> Option<Vec<f64>> {
        None
    }
}

/// A model whose trainable state is a flat vector of parameters.
pub trait Parameterized {
    fn params(&self) -> &[f64];

    /// Overwrites the parameters.
    ///
    /// # Arguments
    /// * `params` - The new parameters, with the same length as the current ones.
    fn set_params(&mut self, params: &[f64]);

    fn param_count(&self) -> usize {
        self.params().len()
    }
}

/// A bare parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatParams(Vec<f64>);

impl FlatParams {
    pub fn new(params: Vec<f64>) -> Self {
        Self(params)
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl Parameterized for FlatParams {
    fn params(&self) -> &[f64] {
        &self.0
    }

    fn set_params(&mut self, params: &[f64]) {
        self.0.copy_from_slice(params);
    }
}
