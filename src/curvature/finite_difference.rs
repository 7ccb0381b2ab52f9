use crate::{
    error::{OptimizeErr, Result},
    objective::{Objective, Slicer},
};

/// Approximates the constraint's curvature product by differencing its gradient.
///
/// The step is `base_eps / (‖θ‖ + 1e-8)`, so that it stays relative to the parameters' scale.
/// A symmetric difference evaluates the gradient at `θ ± eps·v`, a forward one at `θ + eps·v`
/// and `θ`.
pub(super) fn product<O: Objective>(
    objective: &O,
    params: &[f64],
    direction: &[f64],
    batch: &[O::Sample],
    slicer: Slicer,
    base_eps: f64,
    symmetric: bool,
) -> Result<Vec<f64>> {
    let norm = params.iter().map(|p| p * p).sum::<f64>().sqrt();
    let eps = base_eps / (norm + 1e-8);

    let shifted = |sign: f64| -> Vec<f64> {
        params
            .iter()
            .zip(direction)
            .map(|(p, v)| p + sign * eps * v)
            .collect()
    };

    let gradient_at = |point: &[f64]| {
        slicer
            .eval(batch, |chunk| objective.constraint_gradient(point, chunk))
            .ok_or(OptimizeErr::Unsupported(
                "finite difference curvature without a constraint gradient",
            ))
    };

    let plus = gradient_at(&shifted(1.))?;
    let (minus, span) = if symmetric {
        (gradient_at(&shifted(-1.))?, 2. * eps)
    } else {
        (gradient_at(params)?, eps)
    };

    Ok(plus
        .iter()
        .zip(minus)
        .map(|(p, m)| (p - m) / span)
        .collect())
}
