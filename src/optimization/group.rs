//! Evaluation of the full separable problem for one set of variables.

use log::{debug, trace};
use ndarray::{s, Array1, Array2, Axis};
use rayon::prelude::*;
use std::collections::HashMap;

use crate::data::Dataset;
use crate::error::{KinFitError, Result};
use crate::model::{DatasetModel, Model};
use crate::variables::VariableStore;

use super::config::OptimizationConfig;
use super::estimation::{solve_clps, ClpRules, LinearSolution};
use super::grouping::{problem_layout, ProblemSpec};
use super::matrix::{calculate_dataset_matrices, DatasetMatrices, MatrixContainer};

/// A dataset paired with its model, weight and position in the residual.
#[derive(Debug)]
struct PreparedDataset<'a> {
    model: &'a DatasetModel,
    dataset: &'a Dataset,
    model_axis: Vec<f64>,
    global_axis: Vec<f64>,
    weight: Option<Array2<f64>>,
    weighted_data: Array2<f64>,
    offset: usize,
}

/// What an evaluation should keep besides the residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationDetail {
    /// Only the residual vector and solve statistics
    Residual,
    /// Also CLPs and fitted data of every dataset
    Full,
}

/// CLPs and fit of one dataset after an evaluation.
#[derive(Debug, Clone)]
pub struct DatasetEvaluation {
    pub label: String,
    pub clp_labels: Vec<String>,
    /// One row per global index, one column per CLP label
    pub clps: Array2<f64>,
    /// `A c` without weights, model axis by global axis
    pub fitted: Array2<f64>,
    pub weighted_residual: Array2<f64>,
    pub weight: Option<Array2<f64>>,
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Weighted residual, dataset by dataset, each column-major over the
    /// global axis
    pub residual: Array1<f64>,
    /// Empty unless evaluated with [`EvaluationDetail::Full`]
    pub datasets: Vec<DatasetEvaluation>,
    pub rank_deficient_problems: usize,
    pub max_condition_number: f64,
}

/// All datasets of a scheme, split into linear problems.
#[derive(Debug)]
pub struct OptimizationGroup<'a> {
    model: &'a Model,
    datasets: Vec<PreparedDataset<'a>>,
    problems: Vec<ProblemSpec>,
    rank_tolerance: f64,
    parallel: bool,
    residual_len: usize,
}

fn map_ordered<T, R, F>(items: &[T], parallel: bool, f: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync + Send,
{
    if parallel {
        items.par_iter().map(f).collect()
    } else {
        items.iter().map(f).collect()
    }
}

impl<'a> OptimizationGroup<'a> {
    /// # Errors
    ///
    /// * `KinFitError::Configuration` if a dataset model has no data
    /// * `KinFitError::Alignment` if linked global axes cannot be aligned
    pub fn new(
        model: &'a Model,
        data: &'a HashMap<String, Dataset>,
        config: &OptimizationConfig,
    ) -> Result<Self> {
        let mut datasets = Vec::with_capacity(model.datasets().len());
        let mut offset = 0;
        for dataset_model in model.datasets() {
            let dataset = data.get(&dataset_model.label).ok_or_else(|| {
                KinFitError::Configuration(format!(
                    "no data for dataset '{}'",
                    dataset_model.label
                ))
            })?;
            let weight = dataset.effective_weight(&dataset_model.label, model.weights());
            let weighted_data = match &weight {
                Some(weight) => dataset.data() * weight,
                None => dataset.data().clone(),
            };
            datasets.push(PreparedDataset {
                model: dataset_model,
                dataset,
                model_axis: dataset.model_axis().to_vec(),
                global_axis: dataset.global_axis().to_vec(),
                weight,
                weighted_data,
                offset,
            });
            offset += dataset.len();
        }
        for label in data.keys() {
            if model.dataset(label).is_none() {
                debug!("Data for '{label}' has no dataset model and is ignored");
            }
        }

        let axes: Vec<(&str, &[f64])> = datasets
            .iter()
            .map(|d| (d.model.label.as_str(), d.global_axis.as_slice()))
            .collect();
        let problems = problem_layout(
            &axes,
            config.link_clp,
            config.link_tolerance,
            config.link_method,
        )?;
        debug!(
            "{} datasets split into {} linear problems ({} residuals)",
            datasets.len(),
            problems.len(),
            offset
        );

        Ok(Self {
            model,
            datasets,
            problems,
            rank_tolerance: config.rank_tolerance,
            parallel: config.parallel,
            residual_len: offset,
        })
    }

    pub fn residual_len(&self) -> usize {
        self.residual_len
    }

    pub fn problem_count(&self) -> usize {
        self.problems.len()
    }

    /// Build all matrices, solve every linear problem and assemble the
    /// residual.
    pub fn evaluate(&self, variables: &VariableStore, detail: EvaluationDetail) -> Result<Evaluation> {
        let matrices = map_ordered(&self.datasets, self.parallel, |prepared| {
            calculate_dataset_matrices(
                self.model,
                prepared.model,
                &prepared.model_axis,
                &prepared.global_axis,
                variables,
            )
        })?;

        let rules = ClpRules {
            constraints: self.model.clp_constraints(),
            relations: self.model.clp_relations(),
            variables,
        };
        let solutions = map_ordered(&self.problems, self.parallel, |problem| {
            self.solve_problem(problem, &matrices, rules)
        })?;

        let mut residual = Array1::zeros(self.residual_len);
        let mut rank_deficient_problems = 0;
        let mut max_condition_number: f64 = 0.0;
        for (problem, solution) in self.problems.iter().zip(&solutions) {
            let mut row = 0;
            for member in &problem.members {
                let prepared = &self.datasets[member.dataset];
                let n = prepared.model_axis.len();
                let start = prepared.offset + member.global_index * n;
                residual
                    .slice_mut(s![start..start + n])
                    .assign(&solution.residual.slice(s![row..row + n]));
                row += n;
            }
            if solution.rank_deficient {
                rank_deficient_problems += 1;
            }
            max_condition_number = max_condition_number.max(solution.condition_number);
        }
        if rank_deficient_problems > 0 {
            trace!("{rank_deficient_problems} rank deficient linear problems");
        }

        let datasets = match detail {
            EvaluationDetail::Residual => Vec::new(),
            EvaluationDetail::Full => self.collect_datasets(&matrices, &solutions, &residual),
        };

        Ok(Evaluation {
            residual,
            datasets,
            rank_deficient_problems,
            max_condition_number,
        })
    }

    fn solve_problem(
        &self,
        problem: &ProblemSpec,
        matrices: &[DatasetMatrices],
        rules: ClpRules<'_>,
    ) -> Result<LinearSolution> {
        let mut blocks = Vec::with_capacity(problem.members.len());
        let mut data = Vec::new();
        for member in &problem.members {
            let prepared = &self.datasets[member.dataset];
            let container = matrices[member.dataset].at(member.global_index);
            let block = match &prepared.weight {
                Some(weight) => container.weighted(&weight.column(member.global_index).to_owned()),
                None => container.clone(),
            };
            blocks.push(block);
            data.extend(prepared.weighted_data.column(member.global_index).iter().copied());
        }

        let combined = if blocks.len() == 1 {
            blocks.swap_remove(0)
        } else {
            MatrixContainer::stack(&blocks.iter().collect::<Vec<_>>())
        };
        solve_clps(
            &combined,
            &Array1::from(data),
            rules,
            problem.global_value,
            self.rank_tolerance,
        )
    }

    fn collect_datasets(
        &self,
        matrices: &[DatasetMatrices],
        solutions: &[LinearSolution],
        residual: &Array1<f64>,
    ) -> Vec<DatasetEvaluation> {
        let mut evaluations: Vec<DatasetEvaluation> = self
            .datasets
            .iter()
            .map(|prepared| {
                let clp_labels = self.model.dataset_clp_labels(prepared.model);
                let (n_model, n_global) = prepared.dataset.data().dim();
                let block = residual.slice(s![prepared.offset..prepared.offset + n_model * n_global]);
                let mut weighted_residual = Array2::zeros((n_model, n_global));
                for (mut column, chunk) in weighted_residual
                    .axis_iter_mut(Axis(1))
                    .zip(block.exact_chunks(n_model.max(1)))
                {
                    column.assign(&chunk);
                }
                DatasetEvaluation {
                    label: prepared.model.label.clone(),
                    clps: Array2::zeros((n_global, clp_labels.len())),
                    clp_labels,
                    fitted: Array2::zeros((n_model, n_global)),
                    weighted_residual,
                    weight: prepared.weight.clone(),
                }
            })
            .collect();

        for (problem, solution) in self.problems.iter().zip(solutions) {
            for member in &problem.members {
                let container = matrices[member.dataset].at(member.global_index);
                let evaluation = &mut evaluations[member.dataset];
                let member_clps: Array1<f64> = container
                    .clp_labels
                    .iter()
                    .map(|label| solution.clp(label).unwrap_or(0.0))
                    .collect();
                for (label, value) in container.clp_labels.iter().zip(&member_clps) {
                    if let Some(col) = evaluation.clp_labels.iter().position(|l| l == label) {
                        evaluation.clps[[member.global_index, col]] = *value;
                    }
                }
                evaluation
                    .fitted
                    .column_mut(member.global_index)
                    .assign(&container.matrix.dot(&member_clps));
            }
        }
        evaluations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::megacomplexes::{Baseline, DecayMegacomplex};
    use approx::assert_relative_eq;

    fn setup(times: &Array1<f64>) -> (Model, VariableStore, HashMap<String, Dataset>) {
        let mut variables = VariableStore::new();
        variables.add_value("k1", 0.3).unwrap();

        let mut model = Model::new();
        model
            .add_megacomplex("decay", DecayMegacomplex::parallel(&["s1"], &["k1"]))
            .unwrap();
        model.add_megacomplex("baseline", Baseline).unwrap();
        model
            .add_dataset(
                DatasetModel::new("ds")
                    .with_megacomplex("decay")
                    .with_megacomplex("baseline"),
            )
            .unwrap();

        // amplitude 2 at the first wavelength, 3 at the second, baseline 0.5
        let data = Array2::from_shape_fn((times.len(), 2), |(i, j)| {
            (2.0 + j as f64) * (-0.3 * times[i]).exp() + 0.5
        });
        let dataset = Dataset::new(times.clone(), Array1::from(vec![500.0, 600.0]), data).unwrap();
        let mut map = HashMap::new();
        map.insert("ds".to_string(), dataset);
        (model, variables, map)
    }

    #[test]
    fn test_exact_model_has_zero_residual() {
        let times = Array1::linspace(0.0, 10.0, 21);
        let (model, variables, data) = setup(&times);
        let group = OptimizationGroup::new(&model, &data, &OptimizationConfig::default()).unwrap();
        assert_eq!(group.residual_len(), 42);
        assert_eq!(group.problem_count(), 2);

        let evaluation = group.evaluate(&variables, EvaluationDetail::Full).unwrap();
        assert!(evaluation.residual.iter().all(|r| r.abs() < 1e-10));
        let ds = &evaluation.datasets[0];
        assert_eq!(ds.clp_labels, vec!["s1", "ds_baseline"]);
        assert_relative_eq!(ds.clps[[0, 0]], 2.0, epsilon = 1e-10);
        assert_relative_eq!(ds.clps[[1, 0]], 3.0, epsilon = 1e-10);
        assert_relative_eq!(ds.clps[[1, 1]], 0.5, epsilon = 1e-10);
        assert_relative_eq!(ds.fitted[[3, 1]], data["ds"].data()[[3, 1]], epsilon = 1e-10);
    }

    #[test]
    fn test_serial_and_parallel_agree() {
        let times = Array1::linspace(0.0, 10.0, 21);
        let (model, mut variables, data) = setup(&times);
        variables.set_value("k1", 0.4).unwrap();
        let parallel = OptimizationGroup::new(&model, &data, &OptimizationConfig::default())
            .unwrap()
            .evaluate(&variables, EvaluationDetail::Residual)
            .unwrap();
        let serial_config = OptimizationConfig::default().with_parallel(false);
        let serial = OptimizationGroup::new(&model, &data, &serial_config)
            .unwrap()
            .evaluate(&variables, EvaluationDetail::Residual)
            .unwrap();
        assert_eq!(parallel.residual, serial.residual);
        assert!(parallel.residual.iter().any(|r| r.abs() > 1e-6));
    }

    #[test]
    fn test_missing_data() {
        let times = Array1::linspace(0.0, 1.0, 3);
        let (model, _, _) = setup(&times);
        let empty = HashMap::new();
        let result = OptimizationGroup::new(&model, &empty, &OptimizationConfig::default());
        assert!(matches!(result, Err(KinFitError::Configuration(_))));
    }

    #[test]
    fn test_weight_scales_residual() {
        let times = Array1::linspace(0.0, 10.0, 21);
        let (model, mut variables, mut data) = setup(&times);
        variables.set_value("k1", 0.4).unwrap();
        let unweighted = OptimizationGroup::new(&model, &data, &OptimizationConfig::default())
            .unwrap()
            .evaluate(&variables, EvaluationDetail::Residual)
            .unwrap();

        let dataset = data.remove("ds").unwrap();
        let weighted_dataset = dataset
            .with_weight(Array2::from_elem((21, 2), 2.0))
            .unwrap();
        data.insert("ds".to_string(), weighted_dataset);
        let weighted = OptimizationGroup::new(&model, &data, &OptimizationConfig::default())
            .unwrap()
            .evaluate(&variables, EvaluationDetail::Residual)
            .unwrap();
        for (w, u) in weighted.residual.iter().zip(unweighted.residual.iter()) {
            assert_relative_eq!(*w, 2.0 * u, epsilon = 1e-10);
        }
    }
}
