use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{OptimizeErr, Result};

/// The specification for the curvature product used by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurvatureSpec {
    /// The objective's own `curvature_product`.
    #[default]
    Exact,
    /// Differences of the constraint gradient along the direction.
    FiniteDifference { base_eps: f64, symmetric: bool },
}

/// The specification for a `ConjugateGradientOptimizer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub cg_iters: usize,
    pub reg_coeff: f64,
    pub subsample_factor: f64,
    pub backtrack_ratio: f64,
    pub max_backtracks: usize,
    pub accept_violation: bool,
    pub max_constraint_val: f64,
    pub num_slices: usize,
    pub residual_tol: Option<f64>,
    pub curvature: CurvatureSpec,
    pub constraint_name: String,
    pub seed: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            cg_iters: 10,
            reg_coeff: 1e-5,
            subsample_factor: 1.,
            backtrack_ratio: 0.8,
            max_backtracks: 15,
            accept_violation: false,
            max_constraint_val: 0.01,
            num_slices: 1,
            residual_tol: None,
            curvature: CurvatureSpec::Exact,
            constraint_name: "constraint".into(),
            seed: None,
        }
    }
}

fn invalid(msg: impl Into<String>) -> Result<()> {
    Err(OptimizeErr::InvalidConfig(msg.into()))
}

impl OptimizerConfig {
    /// Parses and validates a JSON config, missing fields take their default value.
    ///
    /// # Arguments
    /// * `json` - The serialized config.
    ///
    /// # Returns
    /// The config or the parsing/validation error.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Checks every field holds a usable value.
    ///
    /// # Returns
    /// An `InvalidConfig` error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(self.subsample_factor > 0. && self.subsample_factor <= 1.) {
            return invalid(format!(
                "subsample_factor must be in (0, 1], got {}",
                self.subsample_factor
            ));
        }

        if !(self.backtrack_ratio > 0. && self.backtrack_ratio < 1.) {
            return invalid(format!(
                "backtrack_ratio must be in (0, 1), got {}",
                self.backtrack_ratio
            ));
        }

        if !(self.reg_coeff.is_finite() && self.reg_coeff >= 0.) {
            return invalid(format!(
                "reg_coeff must be finite and non negative, got {}",
                self.reg_coeff
            ));
        }

        if !(self.max_constraint_val.is_finite() && self.max_constraint_val > 0.) {
            return invalid(format!(
                "max_constraint_val must be finite and positive, got {}",
                self.max_constraint_val
            ));
        }

        if self.num_slices == 0 {
            return invalid("num_slices must be at least 1");
        }

        if let Some(tol) = self.residual_tol
            && !(tol >= 0.)
        {
            return invalid(format!("residual_tol must be non negative, got {tol}"));
        }

        if let CurvatureSpec::FiniteDifference { base_eps, .. } = self.curvature
            && !(base_eps.is_finite() && base_eps > 0.)
        {
            return invalid(format!(
                "finite difference base_eps must be finite and positive, got {base_eps}"
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = OptimizerConfig::from_json("{}").unwrap();
        assert_eq!(config, OptimizerConfig::default());
        assert_eq!(config.cg_iters, 10);
        assert_eq!(config.max_backtracks, 15);
        assert_eq!(config.curvature, CurvatureSpec::Exact);
    }

    #[test]
    fn parses_finite_difference_curvature() {
        let json = r#"{
            "cg_iters": 20,
            "max_constraint_val": 0.1,
            "curvature": { "finite_difference": { "base_eps": 1e-5, "symmetric": true } },
            "constraint_name": "mean_kl",
            "seed": 42
        }"#;

        let config = OptimizerConfig::from_json(json).unwrap();
        assert_eq!(config.cg_iters, 20);
        assert_eq!(config.max_constraint_val, 0.1);
        assert_eq!(
            config.curvature,
            CurvatureSpec::FiniteDifference {
                base_eps: 1e-5,
                symmetric: true
            }
        );
        assert_eq!(config.constraint_name, "mean_kl");
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let cases = [
            r#"{ "subsample_factor": 0.0 }"#,
            r#"{ "subsample_factor": 1.5 }"#,
            r#"{ "backtrack_ratio": 1.0 }"#,
            r#"{ "reg_coeff": -1.0 }"#,
            r#"{ "max_constraint_val": 0.0 }"#,
            r#"{ "num_slices": 0 }"#,
            r#"{ "residual_tol": -1.0 }"#,
            r#"{ "curvature": { "finite_difference": { "base_eps": 0.0, "symmetric": false } } }"#,
        ];

        for json in cases {
            let err = OptimizerConfig::from_json(json).unwrap_err();
            assert!(matches!(err, OptimizeErr::InvalidConfig(_)), "{json}");
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = OptimizerConfig::from_json("{ cg_iters: }").unwrap_err();
        assert!(matches!(err, OptimizeErr::Json(_)));
    }
}
