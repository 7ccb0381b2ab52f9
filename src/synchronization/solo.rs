use super::Synchronizer;
use crate::{
    error::{OptimizeErr, Result},
    storage::Phase,
};

/// Runs the collective protocol without peers, every reduction is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoloSync;

impl SoloSync {
    /// Creates a new `SoloSync` synchronizer.
    ///
    /// # Returns
    /// A new `SoloSync` instance.
    pub fn new() -> Self {
        Self
    }
}

impl Synchronizer for SoloSync {
    fn rank(&self) -> usize {
        0
    }

    fn workers(&self) -> usize {
        1
    }

    fn avg_fac(&self) -> f64 {
        1.
    }

    fn reduce_vector(&self, _phase: Phase, local: &[f64]) -> Result<Vec<f64>> {
        Ok(local.to_vec())
    }

    fn reduce_hvp(&self, local: &[f64], reg_coeff: f64, direction: &[f64]) -> Result<Vec<f64>> {
        if local.len() != direction.len() {
            return Err(OptimizeErr::SizeMismatch {
                what: "curvature product",
                got: local.len(),
                expected: direction.len(),
            });
        }

        Ok(local
            .iter()
            .zip(direction)
            .map(|(hv, v)| hv + reg_coeff * v)
            .collect())
    }

    fn reduce_scalars<const N: usize>(&self, _phase: Phase, local: [f64; N]) -> Result<[f64; N]> {
        Ok(local)
    }

    fn release(&self, _phase: Phase) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hvp_is_regularized_locally() {
        let sync = SoloSync::new();

        let out = sync.reduce_hvp(&[1., 2.], 0.5, &[2., 4.]).unwrap();
        assert_eq!(out, [2., 4.]);

        let err = sync.reduce_hvp(&[1.], 0.5, &[2., 4.]).unwrap_err();
        assert!(matches!(err, OptimizeErr::SizeMismatch { .. }));
    }
}
