use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::Objective;
use crate::error::{OptimizeErr, Result};

/// A labeled sample of a linear regression problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub features: Vec<f64>,
    pub target: f64,
}

/// Linear least squares, constrained to a quadratic neighbourhood of an anchor.
///
/// The loss is the mean of `(x·θ - y)² / 2` and the constraint the mean of
/// `(x·(θ - anchor))² / 2`, the squared Mahalanobis distance to the anchor under the data's
/// second moment. Moving the anchor to the current parameters before every update turns the
/// constraint into a trust region around them.
#[derive(Debug, Clone)]
pub struct LeastSquares {
    anchor: Vec<f64>,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Accumulates the mean of `weight(x) * x` over the batch.
fn weighted_features<F>(batch: &[Observation], dim: usize, weight: F) -> Vec<f64>
where
    F: Fn(&Observation) -> f64,
{
    let mut out = vec![0.; dim];
    if batch.is_empty() {
        return out;
    }

    for obs in batch {
        let w = weight(obs);
        out.iter_mut()
            .zip(&obs.features)
            .for_each(|(acc, x)| *acc += w * x);
    }

    let n = batch.len() as f64;
    out.iter_mut().for_each(|acc| *acc /= n);
    out
}

fn mean<F>(batch: &[Observation], f: F) -> f64
where
    F: Fn(&Observation) -> f64,
{
    if batch.is_empty() {
        return 0.;
    }

    batch.iter().map(f).sum::<f64>() / batch.len() as f64
}

impl LeastSquares {
    /// Creates a new `LeastSquares` objective anchored at the origin.
    ///
    /// # Arguments
    /// * `dim` - The amount of features of every observation.
    ///
    /// # Returns
    /// A new `LeastSquares` instance.
    pub fn new(dim: usize) -> Self {
        Self {
            anchor: vec![0.; dim],
        }
    }

    pub fn anchor(&self) -> &[f64] {
        &self.anchor
    }

    /// Moves the center of the constraint.
    pub fn set_anchor(&mut self, anchor: &[f64]) {
        self.anchor.clear();
        self.anchor.extend_from_slice(anchor);
    }

    fn offset(&self, params: &[f64], obs: &Observation) -> f64 {
        obs.features
            .iter()
            .zip(params.iter().zip(&self.anchor))
            .map(|(x, (p, a))| x * (p - a))
            .sum()
    }

    /// Generates a synthetic regression dataset.
    ///
    /// Features are standard normal and targets follow a random linear model plus gaussian
    /// noise.
    ///
    /// # Arguments
    /// * `rng` - The random source.
    /// * `n` - The amount of observations.
    /// * `dim` - The amount of features.
    /// * `noise` - The standard deviation of the target noise.
    ///
    /// # Returns
    /// The observations and the weights that generated them, an `InvalidConfig` error if
    /// `noise` is negative or a `Distribution` error if it isn't finite.
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        n: usize,
        dim: usize,
        noise: f64,
    ) -> Result<(Vec<Observation>, Vec<f64>)> {
        if noise < 0. {
            return Err(OptimizeErr::InvalidConfig(format!(
                "noise must be non negative, got {noise}"
            )));
        }

        let standard = Normal::new(0., 1.)?;
        let noise = Normal::new(0., noise)?;

        let weights: Vec<f64> = standard.sample_iter(&mut *rng).take(dim).collect();

        let observations = (0..n)
            .map(|_| {
                let features: Vec<f64> = standard.sample_iter(&mut *rng).take(dim).collect();
                let target = dot(&features, &weights) + noise.sample(rng);
                Observation { features, target }
            })
            .collect();

        Ok((observations, weights))
    }
}

impl Objective for LeastSquares {
    type Sample = Observation;

    fn loss(&self, params: &[f64], batch: &[Observation]) -> f64 {
        mean(batch, |obs| {
            let residual = dot(&obs.features, params) - obs.target;
            0.5 * residual * residual
        })
    }

    fn gradient(&self, params: &[f64], batch: &[Observation]) -> Vec<f64> {
        weighted_features(batch, params.len(), |obs| {
            dot(&obs.features, params) - obs.target
        })
    }

    fn constraint(&self, params: &[f64], batch: &[Observation]) -> f64 {
        mean(batch, |obs| {
            let offset = self.offset(params, obs);
            0.5 * offset * offset
        })
    }

    fn curvature_product(
        &self,
        params: &[f64],
        direction: &[f64],
        batch: &[Observation],
    ) -> Vec<f64> {
        weighted_features(batch, params.len(), |obs| dot(&obs.features, direction))
    }

    fn constraint_gradient(&self, params: &[f64], batch: &[Observation]) -> Option<Vec<f64>> {
        Some(weighted_features(batch, params.len(), |obs| {
            self.offset(params, obs)
        }))
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn batch() -> Vec<Observation> {
        vec![
            Observation {
                features: vec![1., 0.],
                target: 1.,
            },
            Observation {
                features: vec![0., 2.],
                target: 2.,
            },
        ]
    }

    #[test]
    fn loss_and_gradient_are_batch_means() {
        let obj = LeastSquares::new(2);
        let params = [0., 0.];

        // residuals -1 and -2
        assert_eq!(obj.loss(&params, &batch()), 1.25);
        assert_eq!(obj.gradient(&params, &batch()), [-0.5, -2.]);
    }

    #[test]
    fn constraint_is_measured_from_the_anchor() {
        let mut obj = LeastSquares::new(2);
        let params = [1., 1.];

        assert_eq!(obj.constraint(&params, &batch()), 1.25);

        obj.set_anchor(&params);
        assert_eq!(obj.anchor(), params);
        assert_eq!(obj.constraint(&params, &batch()), 0.);
        assert_eq!(obj.constraint_gradient(&params, &batch()), Some(vec![0., 0.]));
    }

    #[test]
    fn curvature_product_is_the_second_moment() {
        let obj = LeastSquares::new(2);

        let hv = obj.curvature_product(&[5., 5.], &[1., 1.], &batch());
        assert_eq!(hv, [0.5, 2.]);
    }

    #[test]
    fn empty_batch_evaluates_to_zero() {
        let obj = LeastSquares::new(2);

        assert_eq!(obj.loss(&[1., 1.], &[]), 0.);
        assert_eq!(obj.gradient(&[1., 1.], &[]), [0., 0.]);
    }

    #[test]
    fn generated_targets_follow_the_weights() {
        let mut rng = StdRng::seed_from_u64(3);
        let (data, weights) = LeastSquares::generate(&mut rng, 64, 4, 0.).unwrap();

        assert_eq!(data.len(), 64);
        assert_eq!(weights.len(), 4);

        let obj = LeastSquares::new(4);
        assert!(obj.loss(&weights, &data) < 1e-20);
    }

    #[test]
    fn invalid_noise_is_rejected() {
        let mut rng = StdRng::seed_from_u64(3);

        let err = LeastSquares::generate(&mut rng, 4, 2, -1.).unwrap_err();
        assert!(matches!(err, OptimizeErr::InvalidConfig(_)));

        let err = LeastSquares::generate(&mut rng, 4, 2, f64::NAN).unwrap_err();
        assert!(matches!(err, OptimizeErr::Distribution(_)));
    }
}
