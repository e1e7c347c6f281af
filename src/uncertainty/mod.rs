//! # Uncertainty Calculation
//!
//! Standard errors of the free variables from the linearized problem at the
//! solution: `covar = redchi * pinv(J^T J)` with `redchi = chi^2 / (N - n)`.
//! The Jacobian is taken with respect to the free variables of the full
//! separable problem, so the CLPs are implicitly re-estimated for every
//! perturbation.

mod covariance;

pub use covariance::{calculate_correlation, calculate_covariance, standard_errors_from_covariance};

use log::warn;
use ndarray::{Array1, Array2};

use crate::error::{KinFitError, Result};

/// Goodness-of-fit statistics and, if there are degrees of freedom left,
/// the covariance of the free variables.
#[derive(Debug, Clone)]
pub struct UncertaintyResult {
    /// Sum of squared weighted residuals
    pub chi_square: f64,
    /// `chi_square / degrees_of_freedom`, NaN without degrees of freedom
    pub reduced_chi_square: f64,
    pub n_data: usize,
    pub n_free: usize,
    pub covariance: Option<Array2<f64>>,
    pub correlation: Option<Array2<f64>>,
    pub standard_errors: Option<Array1<f64>>,
}

impl UncertaintyResult {
    pub fn degrees_of_freedom(&self) -> usize {
        self.n_data.saturating_sub(self.n_free)
    }
}

/// Fit statistics from the residual alone.
pub fn fit_statistics(residual: &Array1<f64>, n_free: usize) -> UncertaintyResult {
    let chi_square = residual.dot(residual);
    let n_data = residual.len();
    let reduced_chi_square = if n_data > n_free {
        chi_square / (n_data - n_free) as f64
    } else {
        f64::NAN
    };
    UncertaintyResult {
        chi_square,
        reduced_chi_square,
        n_data,
        n_free,
        covariance: None,
        correlation: None,
        standard_errors: None,
    }
}

/// Fit statistics plus covariance, correlation and standard errors.
///
/// Without degrees of freedom the statistics are returned without
/// covariance and a warning is logged.
///
/// # Errors
///
/// * `KinFitError::Dimension` if the Jacobian does not match the residual
pub fn estimate_uncertainty(
    jacobian: &Array2<f64>,
    residual: &Array1<f64>,
) -> Result<UncertaintyResult> {
    if jacobian.nrows() != residual.len() {
        return Err(KinFitError::Dimension(format!(
            "Jacobian has {} rows, residual has {} entries",
            jacobian.nrows(),
            residual.len()
        )));
    }
    let mut result = fit_statistics(residual, jacobian.ncols());
    if result.degrees_of_freedom() == 0 {
        warn!(
            "No degrees of freedom ({} data points, {} free variables); skipping standard errors",
            result.n_data, result.n_free
        );
        return Ok(result);
    }

    let covariance = calculate_covariance(jacobian, result.reduced_chi_square)?;
    result.correlation = Some(calculate_correlation(&covariance));
    result.standard_errors = Some(standard_errors_from_covariance(&covariance));
    result.covariance = Some(covariance);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_linear_fit_standard_error() {
        // y = a x fitted to three points: var(a) = redchi / sum(x^2)
        let jacobian = arr2(&[[1.0], [2.0], [3.0]]);
        let residual = arr1(&[0.1, -0.2, 0.1]);
        let result = estimate_uncertainty(&jacobian, &residual).unwrap();
        assert_relative_eq!(result.chi_square, 0.06, epsilon = 1e-12);
        assert_relative_eq!(result.reduced_chi_square, 0.03, epsilon = 1e-12);
        let errors = result.standard_errors.unwrap();
        assert_relative_eq!(errors[0], (0.03f64 / 14.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_no_degrees_of_freedom() {
        let jacobian = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        let residual = arr1(&[0.0, 0.0]);
        let result = estimate_uncertainty(&jacobian, &residual).unwrap();
        assert_eq!(result.degrees_of_freedom(), 0);
        assert!(result.reduced_chi_square.is_nan());
        assert!(result.covariance.is_none());
    }

    #[test]
    fn test_shape_mismatch() {
        let result = estimate_uncertainty(&arr2(&[[1.0]]), &arr1(&[1.0, 2.0]));
        assert!(result.is_err());
    }
}
