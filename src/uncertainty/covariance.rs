//! Covariance and correlation of the free variables from the Jacobian at
//! the solution.

use ndarray::{Array1, Array2};

use crate::error::{KinFitError, Result};
use crate::utils::matrix_convert::{nalgebra_to_ndarray, ndarray_to_nalgebra};

/// Covariance estimate `redchi * pinv(J^T J)`.
///
/// The pseudo-inverse drops singular values below `1e-12 * s_max`, so
/// variables the residual does not depend on get zero variance instead of an
/// error.
pub fn calculate_covariance(jacobian: &Array2<f64>, redchi: f64) -> Result<Array2<f64>> {
    let n = jacobian.ncols();
    if n == 0 {
        return Ok(Array2::zeros((0, 0)));
    }
    if !jacobian.iter().all(|v| v.is_finite()) {
        return Err(KinFitError::LinearAlgebra(
            "Jacobian has non-finite entries".to_string(),
        ));
    }
    let jtj = ndarray_to_nalgebra(jacobian.view()).tr_mul(&ndarray_to_nalgebra(jacobian.view()));
    let s_max = jtj.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let inverse = jtj
        .pseudo_inverse(1e-12 * s_max.max(f64::MIN_POSITIVE))
        .map_err(|e| KinFitError::LinearAlgebra(e.to_string()))?;
    Ok(nalgebra_to_ndarray(&inverse) * redchi)
}

/// `correl[i, j] = covar[i, j] / sqrt(covar[i, i] * covar[j, j])`.
///
/// The diagonal is 1; pairs with a zero variance get a correlation of 0.
pub fn calculate_correlation(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            return 1.0;
        }
        let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
        if denom > 0.0 {
            covar[[i, j]] / denom
        } else {
            0.0
        }
    })
}

/// Square roots of the diagonal; negative or zero variances give 0.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Array1<f64> {
    covar.diag().mapv(|v| if v > 0.0 { v.sqrt() } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn test_covariance_matches_inverse() {
        let jacobian = arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let covar = calculate_covariance(&jacobian, 2.0).unwrap();

        // J^T J = [[35, 44], [44, 56]], det = 24
        assert_relative_eq!(covar[[0, 0]], 2.0 * 56.0 / 24.0, epsilon = 1e-9);
        assert_relative_eq!(covar[[0, 1]], -2.0 * 44.0 / 24.0, epsilon = 1e-9);
        assert_relative_eq!(covar[[1, 0]], covar[[0, 1]], epsilon = 1e-12);
        assert_relative_eq!(covar[[1, 1]], 2.0 * 35.0 / 24.0, epsilon = 1e-9);
    }

    #[test]
    fn test_insensitive_variable_has_zero_variance() {
        let jacobian = arr2(&[[1.0, 0.0], [2.0, 0.0]]);
        let covar = calculate_covariance(&jacobian, 1.0).unwrap();
        assert_relative_eq!(covar[[0, 0]], 0.2, epsilon = 1e-12);
        assert_eq!(covar[[1, 1]], 0.0);
        let correl = calculate_correlation(&covar);
        assert_eq!(correl[[0, 1]], 0.0);
        assert_eq!(standard_errors_from_covariance(&covar)[1], 0.0);
    }

    #[test]
    fn test_non_finite_jacobian() {
        let jacobian = arr2(&[[1.0, f64::NAN], [2.0, 0.0]]);
        assert!(matches!(
            calculate_covariance(&jacobian, 1.0),
            Err(KinFitError::LinearAlgebra(_))
        ));
    }

    #[test]
    fn test_correlation() {
        let covar = arr2(&[[0.1, 0.05], [0.05, 0.2]]);
        let correl = calculate_correlation(&covar);
        assert_eq!(correl[[0, 0]], 1.0);
        let expected = 0.05 / (0.1f64 * 0.2f64).sqrt();
        assert_relative_eq!(correl[[0, 1]], expected, epsilon = 1e-12);
        assert_relative_eq!(correl[[1, 0]], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_standard_errors() {
        let covar = arr2(&[[0.1, 0.05], [0.05, 0.2]]);
        let errors = standard_errors_from_covariance(&covar);
        assert_relative_eq!(errors[0], 0.1f64.sqrt());
        assert_relative_eq!(errors[1], 0.2f64.sqrt());
    }
}
