//! Linear estimation of the conditionally linear parameters.
//!
//! For a fixed set of nonlinear variables every problem is linear in its
//! CLPs: `min ||A c - b||`. Relations and constraints shrink `A` before the
//! solve; the eliminated CLPs are restored afterwards.

use log::trace;
use ndarray::{Array1, Array2};
use std::collections::HashMap;

use crate::error::{KinFitError, Result};
use crate::model::{ClpConstraint, ClpRelation};
use crate::utils::matrix_convert::{
    nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};
use crate::variables::VariableStore;

use super::matrix::MatrixContainer;

/// Constraints and relations that act on the CLPs, together with the
/// variables their factors are read from.
#[derive(Debug, Clone, Copy)]
pub struct ClpRules<'a> {
    pub constraints: &'a [ClpConstraint],
    pub relations: &'a [ClpRelation],
    pub variables: &'a VariableStore,
}

impl<'a> ClpRules<'a> {
    /// No constraints and no relations.
    pub fn none(variables: &'a VariableStore) -> Self {
        Self {
            constraints: &[],
            relations: &[],
            variables,
        }
    }
}

/// Outcome of one linear solve.
#[derive(Debug, Clone)]
pub struct LinearSolution {
    /// Labels of the full (unreduced) matrix
    pub clp_labels: Vec<String>,

    /// CLP values in `clp_labels` order, constrained and related ones restored
    pub clps: Array1<f64>,

    /// `A c - b` in the (weighted) space of the solve
    pub residual: Array1<f64>,

    /// Numerical rank of the reduced matrix
    pub rank: usize,

    /// `true` if the reduced matrix has fewer independent columns than columns
    pub rank_deficient: bool,

    /// Ratio of the largest to the smallest singular value of the reduced matrix
    pub condition_number: f64,
}

impl LinearSolution {
    pub fn clp(&self, label: &str) -> Option<f64> {
        self.clp_labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.clps[i])
    }
}

/// Least-norm least-squares solution of `a x = b` by SVD.
///
/// Singular values at or below `rank_tolerance * s_max` are treated as zero.
/// Returns the solution, the numerical rank and the condition number.
///
/// A matrix or right-hand side with non-finite entries is not decomposed: the
/// solution is all NaN, the rank 0 and the condition number infinite, so the
/// residual built from it is NaN as well.
pub fn least_squares(
    a: &Array2<f64>,
    b: &Array1<f64>,
    rank_tolerance: f64,
) -> Result<(Array1<f64>, usize, f64)> {
    if a.nrows() != b.len() {
        return Err(KinFitError::Dimension(format!(
            "matrix has {} rows, data has {} points",
            a.nrows(),
            b.len()
        )));
    }
    if a.ncols() == 0 {
        return Ok((Array1::zeros(0), 0, 1.0));
    }
    if a.nrows() == 0 {
        return Ok((Array1::zeros(a.ncols()), 0, f64::INFINITY));
    }
    if !a.iter().chain(b.iter()).all(|v| v.is_finite()) {
        trace!("Non-finite entries in the linear problem, skipping the SVD");
        return Ok((Array1::from_elem(a.ncols(), f64::NAN), 0, f64::INFINITY));
    }

    let svd = ndarray_to_nalgebra(a.view()).svd(true, true);
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    let eps = rank_tolerance.max(0.0) * s_max;
    let rank = svd.rank(eps);
    let condition = if s_min > 0.0 {
        s_max / s_min
    } else {
        f64::INFINITY
    };
    let x = svd
        .solve(&ndarray_vec_to_nalgebra(b), eps)
        .map_err(|e| KinFitError::LinearAlgebra(e.to_string()))?;
    Ok((nalgebra_vec_to_ndarray(&x), rank, condition))
}

/// Solve for the CLPs of one problem.
///
/// Applicable relations fold the target column into the source column; then
/// applicable constraints move fixed columns to the right-hand side. The
/// remaining system is solved by [`least_squares`].
///
/// # Errors
///
/// * `KinFitError::Dimension` if the data length does not match the matrix
/// * `KinFitError::Variable` if a relation factor is missing
pub fn solve_clps(
    container: &MatrixContainer,
    data: &Array1<f64>,
    rules: ClpRules<'_>,
    global_value: f64,
    rank_tolerance: f64,
) -> Result<LinearSolution> {
    if container.nrows() != data.len() {
        return Err(KinFitError::Dimension(format!(
            "matrix has {} rows, data has {} points",
            container.nrows(),
            data.len()
        )));
    }
    let mut labels = container.clp_labels.clone();
    let mut columns: Vec<Array1<f64>> = container
        .matrix
        .columns()
        .into_iter()
        .map(|c| c.to_owned())
        .collect();
    let mut rhs = data.clone();
    let mut related: Vec<(String, String, f64)> = Vec::new();
    let mut fixed: Vec<(String, f64)> = Vec::new();

    for relation in rules.relations {
        if !relation.applies(global_value) || relation.source == relation.target {
            continue;
        }
        let source = labels.iter().position(|l| *l == relation.source);
        let target = labels.iter().position(|l| *l == relation.target);
        if let (Some(source), Some(target)) = (source, target) {
            let factor = match &relation.parameter {
                Some(name) => rules.variables.value(name)?,
                None => 1.0,
            };
            let target_column = columns.remove(target);
            let source = if target < source { source - 1 } else { source };
            columns[source].scaled_add(factor, &target_column);
            let target_label = labels.remove(target);
            related.push((target_label, relation.source.clone(), factor));
        }
    }

    for constraint in rules.constraints {
        if !constraint.applies(global_value) {
            continue;
        }
        if let Some(target) = labels.iter().position(|l| *l == constraint.target) {
            let column = columns.remove(target);
            rhs.scaled_add(-constraint.value, &column);
            fixed.push((labels.remove(target), constraint.value));
        }
    }

    let reduced = Array2::from_shape_fn((rhs.len(), columns.len()), |(i, j)| columns[j][i]);
    let (x, rank, condition_number) = least_squares(&reduced, &rhs, rank_tolerance)?;
    let residual = reduced.dot(&x) - &rhs;
    let rank_deficient = rank < reduced.ncols();
    if rank_deficient {
        trace!(
            "Rank deficient CLP problem at {global_value}: rank {rank} of {} columns",
            reduced.ncols()
        );
    }

    let mut values: HashMap<&str, f64> = labels
        .iter()
        .map(String::as_str)
        .zip(x.iter().copied())
        .collect();
    for (label, value) in &fixed {
        values.insert(label, *value);
    }
    for (target, source, factor) in related.iter().rev() {
        let source_value = values.get(source.as_str()).copied().unwrap_or(0.0);
        values.insert(target, factor * source_value);
    }
    let clps = container
        .clp_labels
        .iter()
        .map(|l| values.get(l.as_str()).copied().unwrap_or(0.0))
        .collect();

    Ok(LinearSolution {
        clp_labels: container.clp_labels.clone(),
        clps,
        residual,
        rank,
        rank_deficient,
        condition_number,
    })
}
