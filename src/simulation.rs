//! Synthetic datasets from a model and known CLPs.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::data::Dataset;
use crate::error::{KinFitError, Result};
use crate::model::Model;
use crate::optimization::matrix::calculate_dataset_matrices;
use crate::variables::VariableStore;

/// Gaussian noise added to simulated data. The same seed gives the same noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Noise {
    pub std_dev: f64,
    pub seed: u64,
}

impl Noise {
    pub fn new(std_dev: f64, seed: u64) -> Self {
        Self { std_dev, seed }
    }
}

/// CLP values for simulation: one row per global index, one column per label.
#[derive(Debug, Clone, PartialEq)]
pub struct ClpMatrix {
    pub labels: Vec<String>,
    pub values: Array2<f64>,
}

impl ClpMatrix {
    pub fn new(labels: &[&str], values: Array2<f64>) -> Result<Self> {
        if values.ncols() != labels.len() {
            return Err(KinFitError::Dimension(format!(
                "CLP matrix has {} columns for {} labels",
                values.ncols(),
                labels.len()
            )));
        }
        Ok(Self {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            values,
        })
    }

    /// The same CLP values at every global index.
    pub fn constant(labels: &[&str], values: &[f64], n_global: usize) -> Result<Self> {
        let row = Array1::from(values.to_vec());
        let values = Array2::from_shape_fn((n_global, row.len()), |(_, j)| row[j]);
        Self::new(labels, values)
    }
}

/// Simulate the dataset `dataset` of `model`: `data[:, g] = A_g c_g`, plus
/// optional Gaussian noise.
///
/// # Errors
///
/// * `KinFitError::Configuration` if the model has no such dataset
/// * `KinFitError::Simulation` if the CLP matrix lacks a label of the dataset
///   matrix or has the wrong number of rows
/// * Errors from building the matrices
pub fn simulate(
    model: &Model,
    dataset: &str,
    variables: &VariableStore,
    model_axis: &Array1<f64>,
    global_axis: &Array1<f64>,
    clp: &ClpMatrix,
    noise: Option<Noise>,
) -> Result<Dataset> {
    let dataset_model = model.dataset(dataset).ok_or_else(|| {
        KinFitError::Configuration(format!("model has no dataset '{dataset}'"))
    })?;
    if clp.values.nrows() != global_axis.len() {
        return Err(KinFitError::Simulation(format!(
            "CLP matrix has {} rows for a global axis of {}",
            clp.values.nrows(),
            global_axis.len()
        )));
    }

    let mut variables = variables.clone();
    variables.update_derived()?;
    let matrices = calculate_dataset_matrices(
        model,
        dataset_model,
        &model_axis.to_vec(),
        &global_axis.to_vec(),
        &variables,
    )?;

    let mut data = Array2::zeros((model_axis.len(), global_axis.len()));
    for index in 0..global_axis.len() {
        let container = matrices.at(index);
        let clps = container
            .clp_labels
            .iter()
            .map(|label| {
                clp.labels
                    .iter()
                    .position(|l| l == label)
                    .map(|col| clp.values[[index, col]])
                    .ok_or_else(|| {
                        KinFitError::Simulation(format!("no CLP values for '{label}'"))
                    })
            })
            .collect::<Result<Array1<f64>>>()?;
        data.column_mut(index).assign(&container.matrix.dot(&clps));
    }

    if let Some(noise) = noise {
        let normal = Normal::new(0.0, noise.std_dev)
            .map_err(|e| KinFitError::Simulation(format!("invalid noise: {e}")))?;
        let mut rng = StdRng::seed_from_u64(noise.seed);
        data.mapv_inplace(|v| v + normal.sample(&mut rng));
    }

    Dataset::new(model_axis.clone(), global_axis.clone(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::megacomplexes::DecayMegacomplex;
    use crate::model::DatasetModel;
    use approx::assert_relative_eq;

    fn model() -> (Model, VariableStore) {
        let mut variables = VariableStore::new();
        variables.add_value("k1", 0.5).unwrap();
        let mut model = Model::new();
        model
            .add_megacomplex("decay", DecayMegacomplex::parallel(&["s1"], &["k1"]))
            .unwrap();
        model
            .add_dataset(DatasetModel::new("ds").with_megacomplex("decay"))
            .unwrap();
        (model, variables)
    }

    #[test]
    fn test_noise_free() {
        let (model, variables) = model();
        let times = Array1::linspace(0.0, 4.0, 5);
        let wavelengths = Array1::from(vec![500.0, 600.0]);
        let clp = ClpMatrix::new(&["s1"], ndarray::array![[1.0], [2.0]]).unwrap();
        let dataset =
            simulate(&model, "ds", &variables, &times, &wavelengths, &clp, None).unwrap();
        assert_relative_eq!(dataset.data()[[2, 1]], 2.0 * (-1.0f64).exp());
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let (model, variables) = model();
        let times = Array1::linspace(0.0, 4.0, 50);
        let wavelengths = Array1::from(vec![500.0]);
        let clp = ClpMatrix::constant(&["s1"], &[1.0], 1).unwrap();
        let noise = Some(Noise::new(0.01, 7));
        let a = simulate(&model, "ds", &variables, &times, &wavelengths, &clp, noise).unwrap();
        let b = simulate(&model, "ds", &variables, &times, &wavelengths, &clp, noise).unwrap();
        let clean = simulate(&model, "ds", &variables, &times, &wavelengths, &clp, None).unwrap();
        assert_eq!(a.data(), b.data());
        assert_ne!(a.data(), clean.data());
    }

    #[test]
    fn test_missing_clp_label() {
        let (model, variables) = model();
        let times = Array1::linspace(0.0, 1.0, 3);
        let wavelengths = Array1::from(vec![500.0]);
        let clp = ClpMatrix::constant(&["other"], &[1.0], 1).unwrap();
        let result = simulate(&model, "ds", &variables, &times, &wavelengths, &clp, None);
        assert!(matches!(result, Err(KinFitError::Simulation(_))));
    }
}
