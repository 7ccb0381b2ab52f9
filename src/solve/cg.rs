use ndarray::{Array1, ArrayView1};

/// Matrix-free conjugate gradient for symmetric positive definite systems.
///
/// The solver knows nothing about where `A·p` comes from, so a parallel operator only has to
/// guarantee every worker sees the same products for all of them to follow the same path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConjugateGradient {
    iters: usize,
    residual_tol: Option<f64>,
}

impl ConjugateGradient {
    /// Creates a new `ConjugateGradient` solver.
    ///
    /// # Arguments
    /// * `iters` - The amount of iterations to run.
    ///
    /// # Returns
    /// A new `ConjugateGradient` instance without early stopping.
    pub fn new(iters: usize) -> Self {
        Self {
            iters,
            residual_tol: None,
        }
    }

    /// Stops as soon as the squared residual norm drops below `tol`.
    pub fn with_residual_tol(mut self, tol: Option<f64>) -> Self {
        self.residual_tol = tol;
        self
    }

    /// Approximately solves `A·x = b` starting from `x = 0`.
    ///
    /// # Arguments
    /// * `apply` - Computes `A·p`.
    /// * `b` - The right hand side.
    ///
    /// # Returns
    /// The approximate solution, or the first error returned by `apply`.
    pub fn solve<F, E>(&self, mut apply: F, b: ArrayView1<f64>) -> Result<Array1<f64>, E>
    where
        F: FnMut(ArrayView1<f64>) -> Result<Array1<f64>, E>,
    {
        let mut x = Array1::zeros(b.len());
        let mut r = b.to_owned();
        let mut p = r.clone();
        let mut rdotr = r.dot(&r);

        for _ in 0..self.iters {
            if rdotr == 0. || self.residual_tol.is_some_and(|tol| rdotr < tol) {
                break;
            }

            let z = apply(p.view())?;
            let alpha = rdotr / p.dot(&z);

            x.scaled_add(alpha, &p);
            r.scaled_add(-alpha, &z);

            let new_rdotr = r.dot(&r);
            let beta = new_rdotr / rdotr;

            p *= beta;
            p += &r;
            rdotr = new_rdotr;
        }

        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use ndarray::{Array2, array};

    use super::*;

    fn tridiagonal() -> Array2<f64> {
        Array2::from_shape_fn((5, 5), |(i, j)| match i.abs_diff(j) {
            0 => 4.,
            1 => -1.,
            _ => 0.,
        })
    }

    #[test]
    fn solves_spd_system_in_n_iterations() {
        let a = tridiagonal();
        let b = array![1., 2., 3., 4., 5.];

        let x = ConjugateGradient::new(5)
            .solve(|p| Ok::<_, Infallible>(a.dot(&p)), b.view())
            .unwrap();

        let residual = &a.dot(&x) - &b;
        assert!(residual.dot(&residual).sqrt() < 1e-6);
    }

    #[test]
    fn runs_exactly_the_configured_iterations() {
        let a = tridiagonal();
        let b = array![1., 0., 0., 0., 1.];
        let mut calls = 0;

        ConjugateGradient::new(3)
            .solve(
                |p| {
                    calls += 1;
                    Ok::<_, Infallible>(a.dot(&p))
                },
                b.view(),
            )
            .unwrap();

        assert_eq!(calls, 3);
    }

    #[test]
    fn zero_rhs_stops_immediately() {
        let b = Array1::zeros(4);

        let x = ConjugateGradient::new(10)
            .solve(|_| -> Result<Array1<f64>, &str> { Err("called") }, b.view())
            .unwrap();

        assert_eq!(x, Array1::<f64>::zeros(4));
    }

    #[test]
    fn residual_tolerance_stops_early() {
        let a = tridiagonal();
        let b = array![1., 2., 3., 4., 5.];
        let mut calls = 0;

        let x = ConjugateGradient::new(50)
            .with_residual_tol(Some(1e-20))
            .solve(
                |p| {
                    calls += 1;
                    Ok::<_, Infallible>(a.dot(&p))
                },
                b.view(),
            )
            .unwrap();

        assert!(calls < 50);
        let residual = &a.dot(&x) - &b;
        assert!(residual.dot(&residual) < 1e-18);
    }

    #[test]
    fn operator_errors_are_propagated() {
        let b = array![1., 1.];

        let err = ConjugateGradient::new(5)
            .solve(|_| -> Result<Array1<f64>, &str> { Err("boom") }, b.view())
            .unwrap_err();

        assert_eq!(err, "boom");
    }
}
