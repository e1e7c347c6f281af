//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use kinfit_rs::megacomplexes::DecayMegacomplex;
use kinfit_rs::model::{DatasetModel, Model};
use kinfit_rs::simulation::{simulate, ClpMatrix};
use kinfit_rs::variables::{Variable, VariableStore};
use kinfit_rs::Dataset;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

pub const TRUE_K1: f64 = 0.5;
pub const TRUE_K2: f64 = 0.1;

/// Time axis 0..30 in steps of 0.25.
pub fn time_axis() -> Array1<f64> {
    Array1::range(0.0, 30.0 + 0.125, 0.25)
}

pub fn wavelength_axis() -> Array1<f64> {
    Array1::linspace(450.0, 650.0, 9)
}

/// Sequential two-compartment decay `s1 -> s2` on dataset `label`.
pub fn sequential_model(labels: &[&str]) -> Model {
    let mut model = Model::new();
    model
        .add_megacomplex(
            "decay",
            DecayMegacomplex::sequential(&["s1", "s2"], &["rates.k1", "rates.k2"]),
        )
        .unwrap();
    for label in labels {
        model
            .add_dataset(DatasetModel::new(label).with_megacomplex("decay"))
            .unwrap();
    }
    model
}

pub fn rates(k1: f64, k2: f64) -> VariableStore {
    let mut variables = VariableStore::new();
    variables
        .add(Variable::new("rates.k1", k1).with_bounds(0.0, 10.0).unwrap())
        .unwrap();
    variables
        .add(Variable::new("rates.k2", k2).with_bounds(0.0, 10.0).unwrap())
        .unwrap();
    variables
}

/// Two Gaussian bands over the wavelength axis, one per compartment.
pub fn spectra(wavelengths: &Array1<f64>) -> ClpMatrix {
    let band = |center: f64, w: f64| (-((w - center) / 60.0).powi(2)).exp();
    let values = Array2::from_shape_fn((wavelengths.len(), 2), |(i, j)| {
        let w = wavelengths[i];
        if j == 0 {
            band(500.0, w)
        } else {
            0.7 * band(600.0, w)
        }
    });
    ClpMatrix::new(&["s1", "s2"], values).unwrap()
}

pub fn simulated_dataset(model: &Model, label: &str) -> Dataset {
    let wavelengths = wavelength_axis();
    simulate(
        model,
        label,
        &rates(TRUE_K1, TRUE_K2),
        &time_axis(),
        &wavelengths,
        &spectra(&wavelengths),
        None,
    )
    .unwrap()
}

/// Add reproducible Gaussian noise.
pub fn with_noise(dataset: &Dataset, std_dev: f64, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let normal = Normal::new(0.0, std_dev).unwrap();
    let noisy = dataset.data().mapv(|v| v + normal.sample(&mut rng));
    Dataset::new(
        dataset.model_axis().clone(),
        dataset.global_axis().clone(),
        noisy,
    )
    .unwrap()
}
