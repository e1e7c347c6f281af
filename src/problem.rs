//! Problem definition trait.
//!
//! This module defines the `Problem` trait, which represents a nonlinear
//! least squares problem to be solved with the Levenberg-Marquardt algorithm.

use ndarray::{Array1, Array2};

use crate::error::Result;
use crate::utils::finite_difference::FiniteDifference;

/// A nonlinear least squares problem over a flat parameter vector.
pub trait Problem: Sync {
    /// Evaluate the residuals at the given parameters.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values at which to evaluate the residuals
    ///
    /// # Returns
    ///
    /// * A vector of residuals, or an error if the evaluation fails
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the Jacobian matrix at the given parameters.
    ///
    /// The default implementation uses forward finite differences that respect
    /// [`Problem::bounds`].
    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        let bounds = self.bounds();
        FiniteDifference::default().jacobian(
            |p| self.eval(p),
            params,
            None,
            bounds.as_ref().map(|(lower, upper)| (lower, upper)),
        )
    }

    /// Lower and upper bounds of the parameters, if any.
    ///
    /// The optimizer never evaluates the problem outside these bounds.
    fn bounds(&self) -> Option<(Array1<f64>, Array1<f64>)> {
        None
    }

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}
