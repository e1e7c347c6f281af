//! Result of a fit.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lm::ConvergenceStatus;
use crate::variables::VariableStore;

/// Terminal state of a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStatus {
    /// A convergence criterion was met
    Converged,
    /// The iteration budget ran out; the best point so far is reported
    MaxIterations,
    /// The solver could not reduce the cost any further; the best point so
    /// far is reported
    Failed,
    /// The model was evaluated at the initial variables without optimizing
    Evaluated,
}

impl FitStatus {
    pub(crate) fn from_convergence(status: ConvergenceStatus) -> Self {
        match status {
            s if s.is_converged() => FitStatus::Converged,
            ConvergenceStatus::MaxIterationsReached => FitStatus::MaxIterations,
            _ => FitStatus::Failed,
        }
    }
}

/// Per-dataset outcome of a fit.
#[derive(Debug, Clone)]
pub struct DatasetResult {
    pub label: String,
    pub model_axis: Array1<f64>,
    pub global_axis: Array1<f64>,
    pub data: Array2<f64>,
    pub weight: Option<Array2<f64>>,
    /// Model prediction without weights
    pub fitted: Array2<f64>,
    pub weighted_residual: Array2<f64>,
    pub clp_labels: Vec<String>,
    /// One row per global index, one column per CLP label
    pub clps: Array2<f64>,
}

impl DatasetResult {
    /// `data - fitted`, without weights.
    pub fn residual(&self) -> Array2<f64> {
        &self.data - &self.fitted
    }

    /// CLP values of one label along the global axis.
    pub fn clp(&self, label: &str) -> Option<Array1<f64>> {
        self.clp_labels
            .iter()
            .position(|l| l == label)
            .map(|col| self.clps.column(col).to_owned())
    }

    /// Root mean square of the weighted residual.
    pub fn root_mean_square_error(&self) -> f64 {
        let n = self.weighted_residual.len();
        if n == 0 {
            return 0.0;
        }
        (self.weighted_residual.iter().map(|r| r * r).sum::<f64>() / n as f64).sqrt()
    }
}

/// Diagnostics of the optimization run.
#[derive(Debug, Clone)]
pub struct FitDiagnostics {
    pub iterations: usize,
    pub function_evaluations: usize,
    pub jacobian_evaluations: usize,
    /// Cost at the start and after every accepted step
    pub cost_history: Vec<f64>,
    pub termination_reason: String,
    /// Linear problems at the solution whose matrix was rank deficient
    pub rank_deficient_problems: usize,
    pub max_condition_number: f64,
}

/// Everything a fit produces.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub status: FitStatus,
    pub initial_variables: VariableStore,
    /// Optimized variables; standard errors are set when they could be estimated
    pub variables: VariableStore,
    pub free_names: Vec<String>,
    pub datasets: Vec<DatasetResult>,
    /// Full weighted residual vector, in the layout the optimizer used
    pub residual: Array1<f64>,
    pub chi_square: f64,
    pub reduced_chi_square: f64,
    pub n_data: usize,
    pub covariance: Option<Array2<f64>>,
    pub correlation: Option<Array2<f64>>,
    pub diagnostics: FitDiagnostics,
}

impl FitResult {
    pub fn is_converged(&self) -> bool {
        self.status == FitStatus::Converged
    }

    pub fn dataset(&self, label: &str) -> Option<&DatasetResult> {
        self.datasets.iter().find(|d| d.label == label)
    }

    /// CLP values of `clp_label` in dataset `dataset` along its global axis.
    pub fn clp(&self, dataset: &str, clp_label: &str) -> Option<Array1<f64>> {
        self.dataset(dataset).and_then(|d| d.clp(clp_label))
    }

    /// Root mean square of the full weighted residual.
    pub fn root_mean_square_error(&self) -> f64 {
        if self.n_data == 0 {
            0.0
        } else {
            (self.chi_square / self.n_data as f64).sqrt()
        }
    }

    pub fn cost(&self) -> f64 {
        self.chi_square
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Result:")?;
        writeln!(f, "  Status: {:?}", self.status)?;
        writeln!(f, "  Message: {}", self.diagnostics.termination_reason)?;
        writeln!(f, "  Iterations: {}", self.diagnostics.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.diagnostics.function_evaluations)?;
        writeln!(f, "  Data points: {}", self.n_data)?;
        writeln!(f, "  Free variables: {}", self.free_names.len())?;
        writeln!(f, "  Chi-square: {:.6e}", self.chi_square)?;
        writeln!(f, "  Reduced chi-square: {:.6e}", self.reduced_chi_square)?;
        writeln!(f, "  RMSE: {:.6e}", self.root_mean_square_error())?;
        if self.diagnostics.rank_deficient_problems > 0 {
            writeln!(
                f,
                "  Rank deficient linear problems: {}",
                self.diagnostics.rank_deficient_problems
            )?;
        }
        writeln!(f, "  Variables:")?;
        for variable in self.variables.iter() {
            match (variable.is_free(), variable.standard_error) {
                (true, Some(error)) => writeln!(
                    f,
                    "    {:<24} {:>14.6e} +/- {:.3e}",
                    variable.name(),
                    variable.value(),
                    error
                )?,
                (true, None) => {
                    writeln!(f, "    {:<24} {:>14.6e}", variable.name(), variable.value())?
                }
                (false, _) => writeln!(
                    f,
                    "    {:<24} {:>14.6e} ({})",
                    variable.name(),
                    variable.value(),
                    if variable.is_derived() { "derived" } else { "fixed" }
                )?,
            }
        }
        Ok(())
    }
}
