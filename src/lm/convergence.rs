//! Convergence criteria for the Levenberg-Marquardt loop.

use serde::{Deserialize, Serialize};

/// Possible convergence states for an optimization algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// The algorithm is still running.
    Running,

    /// The algorithm has converged due to a small parameter change.
    ParameterConvergence,

    /// The algorithm has converged due to a small function value change.
    FunctionValueConvergence,

    /// The algorithm has converged due to a small gradient.
    GradientConvergence,

    /// The algorithm has terminated due to reaching the maximum number of iterations.
    MaxIterationsReached,

    /// The algorithm has terminated due to a numerical error.
    NumericalError,
}

impl ConvergenceStatus {
    /// Returns true if the optimization has terminated (either converged or failed).
    pub fn is_terminated(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    /// Returns true if the optimization has converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence
                | ConvergenceStatus::FunctionValueConvergence
                | ConvergenceStatus::GradientConvergence
        )
    }

    /// Returns a description of the convergence status.
    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::Running => "Optimization is still running",
            ConvergenceStatus::ParameterConvergence => "Converged: small parameter change",
            ConvergenceStatus::FunctionValueConvergence => "Converged: small cost reduction",
            ConvergenceStatus::GradientConvergence => "Converged: small gradient",
            ConvergenceStatus::MaxIterationsReached => "Terminated: maximum iterations reached",
            ConvergenceStatus::NumericalError => {
                "Terminated: damping reached its maximum without reducing the cost"
            }
        }
    }
}

/// Criteria for determining when an optimization algorithm has converged.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    pub xtol: f64,
    pub ftol: f64,
    pub gtol: f64,
}

impl ConvergenceCriteria {
    pub fn new(xtol: f64, ftol: f64, gtol: f64) -> Self {
        Self { xtol, ftol, gtol }
    }

    /// Gradient test on the max-norm of `J^T r`.
    pub fn gradient_converged(&self, gradient_max_norm: f64) -> bool {
        gradient_max_norm <= self.gtol
    }

    /// Step test `||dx|| <= xtol * (||x|| + xtol)`.
    pub fn step_converged(&self, step_norm: f64, params_norm: f64) -> bool {
        step_norm <= self.xtol * (params_norm + self.xtol)
    }

    /// Relative cost reduction test `(cost - new_cost) <= ftol * cost`.
    pub fn cost_converged(&self, cost: f64, new_cost: f64) -> bool {
        cost - new_cost <= self.ftol * cost
    }
}
