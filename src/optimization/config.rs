//! Configuration of a fit.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::lm::LmConfig;
use crate::utils::finite_difference::FiniteDifference;

use super::grouping::LinkMethod;

/// Everything that controls a fit apart from the model and the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Settings of the nonlinear solver
    pub lm: LmConfig,

    /// Jacobian approximation of the residual with respect to the free variables
    pub finite_difference: FiniteDifference,

    /// Solve datasets with aligned global values as one linear problem. Default: false
    pub link_clp: bool,

    /// Largest distance at which global values are considered equal. Default: 0
    pub link_tolerance: f64,

    /// Direction in which global values snap when linking. Default: nearest
    pub link_method: LinkMethod,

    /// Relative singular value cutoff of the linear solves. Default: 1e-10
    pub rank_tolerance: f64,

    /// Solve independent problems on the rayon thread pool. Default: true
    pub parallel: bool,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            lm: LmConfig::default(),
            finite_difference: FiniteDifference::default(),
            link_clp: false,
            link_tolerance: 0.0,
            link_method: LinkMethod::Nearest,
            rank_tolerance: 1e-10,
            parallel: true,
        }
    }
}

impl OptimizationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.lm.max_iterations = max_iterations;
        self
    }

    pub fn with_lm(mut self, lm: LmConfig) -> Self {
        self.lm = lm;
        self
    }

    pub fn with_finite_difference(mut self, finite_difference: FiniteDifference) -> Self {
        self.finite_difference = finite_difference;
        self
    }

    /// Link CLPs of datasets whose global values are within `tolerance`.
    pub fn with_linking(mut self, tolerance: f64, method: LinkMethod) -> Self {
        self.link_clp = true;
        self.link_tolerance = tolerance;
        self.link_method = method;
        self
    }

    pub fn with_rank_tolerance(mut self, tolerance: f64) -> Self {
        self.rank_tolerance = tolerance;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self.finite_difference.parallel = parallel;
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
