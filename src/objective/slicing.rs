use std::{borrow::Cow, num::NonZeroUsize};

use rand::{Rng, seq::index};
use rayon::prelude::*;

/// A partial result that can be weighted and summed with others.
pub trait Accumulate: Send + Sized {
    fn scale(self, factor: f64) -> Self;

    fn accumulate(self, other: Self) -> Self;
}

impl Accumulate for f64 {
    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    fn accumulate(self, other: Self) -> Self {
        self + other
    }
}

impl Accumulate for Vec<f64> {
    fn scale(mut self, factor: f64) -> Self {
        self.iter_mut().for_each(|x| *x *= factor);
        self
    }

    fn accumulate(mut self, other: Self) -> Self {
        self.iter_mut().zip(other).for_each(|(x, y)| *x += y);
        self
    }
}

impl<A: Accumulate, B: Accumulate> Accumulate for (A, B) {
    fn scale(self, factor: f64) -> Self {
        (self.0.scale(factor), self.1.scale(factor))
    }

    fn accumulate(self, other: Self) -> Self {
        (self.0.accumulate(other.0), self.1.accumulate(other.1))
    }
}

impl<T: Accumulate> Accumulate for Option<T> {
    fn scale(self, factor: f64) -> Self {
        self.map(|x| x.scale(factor))
    }

    fn accumulate(self, other: Self) -> Self {
        Some(self?.accumulate(other?))
    }
}

/// Splits evaluator calls in bounded chunks of the batch.
#[derive(Debug, Clone, Copy)]
pub struct Slicer {
    slices: NonZeroUsize,
}

impl Slicer {
    /// Creates a new `Slicer`.
    ///
    /// # Arguments
    /// * `slices` - The amount of chunks every batch is split in.
    ///
    /// # Returns
    /// A new `Slicer` instance.
    pub fn new(slices: NonZeroUsize) -> Self {
        Self { slices }
    }

    /// Evaluates the batch mean `f` chunk by chunk.
    ///
    /// Chunks hold `max(1, n / slices)` samples and run on the rayon pool. Each result is
    /// weighted by its chunk length, they're summed in chunk order and divided by `n`.
    ///
    /// # Arguments
    /// * `batch` - The samples to evaluate.
    /// * `f` - Computes the mean of some quantity over a chunk.
    ///
    /// # Returns
    /// The mean over the whole batch.
    pub fn eval<S, T, F>(&self, batch: &[S], f: F) -> T
    where
        S: Sync,
        T: Accumulate,
        F: Fn(&[S]) -> T + Sync,
    {
        let n = batch.len();
        let size = (n / self.slices.get()).max(1);

        if size >= n {
            return f(batch);
        }

        let partials: Vec<T> = batch
            .par_chunks(size)
            .map(|chunk| f(chunk).scale(chunk.len() as f64))
            .collect();

        let mut partials = partials.into_iter();
        let Some(first) = partials.next() else {
            return f(batch);
        };

        partials.fold(first, T::accumulate).scale(1. / n as f64)
    }
}

impl Default for Slicer {
    fn default() -> Self {
        Self::new(NonZeroUsize::MIN)
    }
}

/// Draws `floor(n * factor)` distinct samples, at least one, from `batch`.
///
/// # Arguments
/// * `batch` - The samples to draw from.
/// * `factor` - The fraction to keep, the whole batch is borrowed when it's `1` or more.
/// * `rng` - The random source.
///
/// # Returns
/// The subsampled batch.
pub fn subsample<'a, S: Clone, R: Rng + ?Sized>(
    batch: &'a [S],
    factor: f64,
    rng: &mut R,
) -> Cow<'a, [S]> {
    let n = batch.len();
    if factor >= 1. || n == 0 {
        return Cow::Borrowed(batch);
    }

    let amount = ((n as f64 * factor).floor() as usize).clamp(1, n);

    index::sample(rng, n, amount)
        .iter()
        .map(|i| batch[i].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn slicer(slices: usize) -> Slicer {
        Slicer::new(NonZeroUsize::new(slices).unwrap())
    }

    fn mean(xs: &[f64]) -> f64 {
        if xs.is_empty() {
            return 0.;
        }

        xs.iter().sum::<f64>() / xs.len() as f64
    }

    #[test]
    fn sliced_mean_matches_unsliced() {
        let batch: Vec<f64> = (0..103).map(|i| (i as f64).sin()).collect();
        let expected = mean(&batch);

        for slices in [1, 2, 3, 7, 103, 500] {
            let got = slicer(slices).eval(&batch, mean);
            assert!((got - expected).abs() < 1e-12, "slices={slices}");
        }
    }

    #[test]
    fn sliced_vectors_and_pairs_are_weighted() {
        let batch = [1., 2., 3., 4., 5.];

        let got = slicer(2).eval(&batch, |chunk| (mean(chunk), vec![mean(chunk); 2]));
        assert!((got.0 - 3.).abs() < 1e-12);
        assert!(got.1.iter().all(|x| (x - 3.).abs() < 1e-12));
    }

    #[test]
    fn missing_partial_result_propagates() {
        let batch = [1., 2., 3., 4.];

        let got: Option<f64> = slicer(4).eval(&batch, |chunk| (chunk[0] < 3.).then_some(1.));
        assert!(got.is_none());
    }

    #[test]
    fn empty_batch_is_evaluated_once() {
        let batch: [f64; 0] = [];
        assert_eq!(slicer(4).eval(&batch, mean), 0.);
    }

    #[test]
    fn subsample_draws_distinct_samples() {
        let batch: Vec<usize> = (0..10).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let sub = subsample(&batch, 0.35, &mut rng);
        assert_eq!(sub.len(), 3);

        let mut seen = sub.to_vec();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 3);

        assert!(matches!(subsample(&batch, 1., &mut rng), Cow::Borrowed(_)));
        assert_eq!(subsample(&batch, 0.01, &mut rng).len(), 1);
    }
}
