//! Fit driver: couples the nonlinear solver to the separable evaluation.
//!
//! A run moves through `Init -> Iterating` and ends in `Converged`,
//! `MaxIterations` or `Failed`. Cancellation aborts the run with
//! [`KinFitError::Cancelled`].

use log::{debug, info, warn};
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use std::fmt;

use crate::data::Dataset;
use crate::error::{KinFitError, Result};
use crate::lm::{CancelToken, LevenbergMarquardt};
use crate::model::Model;
use crate::problem::Problem;
use crate::result::{DatasetResult, FitDiagnostics, FitResult, FitStatus};
use crate::uncertainty::{estimate_uncertainty, fit_statistics, UncertaintyResult};
use crate::utils::finite_difference::FiniteDifference;
use crate::variables::VariableStore;

use super::config::OptimizationConfig;
use super::group::{Evaluation, EvaluationDetail, OptimizationGroup};

/// Model, variables, data and settings of one fit.
#[derive(Debug)]
pub struct Scheme {
    pub model: Model,
    pub variables: VariableStore,
    /// Datasets by label; every dataset model needs an entry
    pub data: HashMap<String, Dataset>,
    pub config: OptimizationConfig,
}

impl Scheme {
    pub fn new(model: Model, variables: VariableStore) -> Self {
        Self {
            model,
            variables,
            data: HashMap::new(),
            config: OptimizationConfig::default(),
        }
    }

    pub fn with_dataset(mut self, label: &str, dataset: Dataset) -> Self {
        self.data.insert(label.to_string(), dataset);
        self
    }

    pub fn with_config(mut self, config: OptimizationConfig) -> Self {
        self.config = config;
        self
    }

    /// Check model references and data presence, and resolve derived variables.
    ///
    /// Returns the variable store the fit starts from.
    pub fn prepare(&self) -> Result<VariableStore> {
        self.model.validate(&self.variables)?;
        for dataset in self.model.datasets() {
            if !self.data.contains_key(&dataset.label) {
                return Err(KinFitError::Configuration(format!(
                    "no data for dataset '{}'",
                    dataset.label
                )));
            }
        }
        let mut variables = self.variables.clone();
        variables.update_derived()?;
        Ok(variables)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Init,
    Iterating,
    Finished(FitStatus),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Init => write!(f, "init"),
            RunState::Iterating => write!(f, "iterating"),
            RunState::Finished(status) => write!(f, "{status:?}"),
        }
    }
}

/// The separable problem as seen by the nonlinear solver: free variables in,
/// weighted residual out.
struct FitProblem<'a> {
    group: &'a OptimizationGroup<'a>,
    template: &'a VariableStore,
    finite_difference: FiniteDifference,
    bounds: (Array1<f64>, Array1<f64>),
}

impl<'a> FitProblem<'a> {
    fn new(
        group: &'a OptimizationGroup<'a>,
        template: &'a VariableStore,
        finite_difference: FiniteDifference,
    ) -> Self {
        Self {
            group,
            template,
            finite_difference,
            bounds: template.bounds(),
        }
    }

    fn variables_at(&self, params: &Array1<f64>) -> Result<VariableStore> {
        let mut variables = self.template.clone();
        variables.from_vector(params)?;
        variables.update_derived()?;
        Ok(variables)
    }
}

impl Problem for FitProblem<'_> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let variables = self.variables_at(params)?;
        Ok(self
            .group
            .evaluate(&variables, EvaluationDetail::Residual)?
            .residual)
    }

    fn parameter_count(&self) -> usize {
        self.template.free_count()
    }

    fn residual_count(&self) -> usize {
        self.group.residual_len()
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        let (lower, upper) = &self.bounds;
        self.finite_difference
            .jacobian(|p| self.eval(p), params, None, Some((lower, upper)))
    }

    fn bounds(&self) -> Option<(Array1<f64>, Array1<f64>)> {
        Some(self.bounds.clone())
    }
}

/// Fit the scheme.
///
/// # Errors
///
/// * `KinFitError::Configuration` for unresolved references in the model
/// * `KinFitError::ExpressionCycle` / `KinFitError::ExpressionEval` for bad
///   derived variables
/// * `KinFitError::Alignment` if linked datasets cannot be aligned
/// * Any error raised while building matrices or solving
pub fn optimize(scheme: &Scheme) -> Result<FitResult> {
    run(scheme, None)
}

/// Fit the scheme, stopping with `KinFitError::Cancelled` once `token` is
/// cancelled. The token is checked before every iteration.
pub fn optimize_with_cancel(scheme: &Scheme, token: CancelToken) -> Result<FitResult> {
    run(scheme, Some(token))
}

/// Evaluate the scheme at its initial variables without optimizing.
pub fn evaluate(scheme: &Scheme) -> Result<FitResult> {
    let variables = scheme.prepare()?;
    let group = OptimizationGroup::new(&scheme.model, &scheme.data, &scheme.config)?;
    let evaluation = group.evaluate(&variables, EvaluationDetail::Full)?;
    let statistics = fit_statistics(&evaluation.residual, variables.free_count());
    let diagnostics = FitDiagnostics {
        iterations: 0,
        function_evaluations: 1,
        jacobian_evaluations: 0,
        cost_history: vec![statistics.chi_square],
        termination_reason: "Evaluated without optimization".to_string(),
        rank_deficient_problems: evaluation.rank_deficient_problems,
        max_condition_number: evaluation.max_condition_number,
    };
    Ok(assemble(
        scheme,
        FitStatus::Evaluated,
        variables.clone(),
        variables,
        evaluation,
        statistics,
        diagnostics,
    ))
}

fn run(scheme: &Scheme, token: Option<CancelToken>) -> Result<FitResult> {
    let mut state = RunState::Init;
    debug!("Fit state: {state}");

    let initial = scheme.prepare()?;
    let group = OptimizationGroup::new(&scheme.model, &scheme.data, &scheme.config)?;
    let problem = FitProblem::new(&group, &initial, scheme.config.finite_difference);
    info!(
        "Fitting {} free variables against {} residuals in {} linear problems",
        problem.parameter_count(),
        problem.residual_count(),
        group.problem_count()
    );

    let mut optimizer = LevenbergMarquardt::with_config(scheme.config.lm.clone())
        .with_calc_jacobian(true);
    if let Some(token) = token {
        optimizer = optimizer.with_cancel_token(token);
    }

    state = RunState::Iterating;
    debug!("Fit state: {state}");
    let outcome = optimizer.minimize(&problem, initial.to_vector())?;
    let status = FitStatus::from_convergence(outcome.status);
    state = RunState::Finished(status);
    debug!("Fit state: {state}");

    let mut variables = problem.variables_at(&outcome.params)?;
    let evaluation = group.evaluate(&variables, EvaluationDetail::Full)?;

    let statistics = match (&outcome.jacobian, status) {
        (Some(jacobian), FitStatus::Converged | FitStatus::MaxIterations)
            if jacobian.iter().all(|v| v.is_finite()) =>
        {
            let statistics = estimate_uncertainty(jacobian, &evaluation.residual)?;
            if let Some(errors) = &statistics.standard_errors {
                variables.set_standard_errors(errors)?;
            }
            statistics
        }
        _ => {
            warn!("Fit failed ({}); standard errors are not estimated", outcome.message);
            fit_statistics(&evaluation.residual, variables.free_count())
        }
    };
    for variable in variables.iter().filter(|v| v.is_free()) {
        if variable.value() <= variable.minimum() || variable.value() >= variable.maximum() {
            warn!(
                "Variable '{}' finished on a bound ({})",
                variable.name(),
                variable.value()
            );
        }
    }
    if evaluation.rank_deficient_problems > 0 {
        warn!(
            "{} linear problems are rank deficient at the solution (max condition number {:.3e})",
            evaluation.rank_deficient_problems, evaluation.max_condition_number
        );
    }

    let diagnostics = FitDiagnostics {
        iterations: outcome.iterations,
        function_evaluations: outcome.func_evals,
        jacobian_evaluations: outcome.jacobian_evals,
        cost_history: outcome.cost_history,
        termination_reason: outcome.message,
        rank_deficient_problems: evaluation.rank_deficient_problems,
        max_condition_number: evaluation.max_condition_number,
    };
    Ok(assemble(
        scheme,
        status,
        initial,
        variables,
        evaluation,
        statistics,
        diagnostics,
    ))
}

fn assemble(
    scheme: &Scheme,
    status: FitStatus,
    initial: VariableStore,
    variables: VariableStore,
    evaluation: Evaluation,
    statistics: UncertaintyResult,
    diagnostics: FitDiagnostics,
) -> FitResult {
    let datasets = evaluation
        .datasets
        .into_iter()
        .filter_map(|ds| {
            let data = scheme.data.get(&ds.label)?;
            Some(DatasetResult {
                model_axis: data.model_axis().clone(),
                global_axis: data.global_axis().clone(),
                data: data.data().clone(),
                weight: ds.weight,
                fitted: ds.fitted,
                weighted_residual: ds.weighted_residual,
                clp_labels: ds.clp_labels,
                clps: ds.clps,
                label: ds.label,
            })
        })
        .collect();

    FitResult {
        status,
        free_names: variables.free_names(),
        initial_variables: initial,
        variables,
        datasets,
        residual: evaluation.residual,
        chi_square: statistics.chi_square,
        reduced_chi_square: statistics.reduced_chi_square,
        n_data: statistics.n_data,
        covariance: statistics.covariance,
        correlation: statistics.correlation,
        diagnostics,
    }
}
