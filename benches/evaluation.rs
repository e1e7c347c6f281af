//! Benchmarks for the separable evaluation and the full fit.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kinfit_rs::megacomplexes::DecayMegacomplex;
use kinfit_rs::model::{DatasetModel, Irf, Model};
use kinfit_rs::optimization::{
    calculate_dataset_matrices, solve_clps, ClpRules, EvaluationDetail, OptimizationGroup,
};
use kinfit_rs::simulation::{simulate, ClpMatrix, Noise};
use kinfit_rs::variables::{Variable, VariableStore};
use kinfit_rs::{optimize, Dataset, OptimizationConfig, Scheme};
use ndarray::{Array1, Array2};
use std::collections::HashMap;

fn model(with_irf: bool) -> Model {
    let mut model = Model::new();
    model
        .add_megacomplex(
            "decay",
            DecayMegacomplex::sequential(&["s1", "s2", "s3"], &["k1", "k2", "k3"]),
        )
        .expect("megacomplex");
    let mut dataset = DatasetModel::new("ds").with_megacomplex("decay");
    if with_irf {
        dataset = dataset.with_irf(
            Irf::gaussian("irf.center", "irf.width").with_center_dispersion(&["irf.disp1"]),
        );
    }
    model.add_dataset(dataset).expect("dataset");
    model
}

fn variables(scale: f64) -> VariableStore {
    let mut variables = VariableStore::new();
    for (name, value) in [("k1", 1.0), ("k2", 0.3), ("k3", 0.05)] {
        variables
            .add(Variable::new(name, value * scale).with_bounds(0.0, 10.0).expect("bounds"))
            .expect("variable");
    }
    variables.add(Variable::new("irf.center", 0.2).fixed()).expect("variable");
    variables.add(Variable::new("irf.width", 0.1).fixed()).expect("variable");
    variables.add(Variable::new("irf.disp1", 0.05).fixed()).expect("variable");
    variables
}

fn dataset(model: &Model, n_global: usize) -> Dataset {
    let times = Array1::linspace(-1.0, 50.0, 300);
    let wavelengths = Array1::linspace(400.0, 700.0, n_global);
    let clp = Array2::from_shape_fn((n_global, 3), |(i, j)| {
        let w = wavelengths[i];
        (-((w - (450.0 + 100.0 * j as f64)) / 80.0).powi(2)).exp()
    });
    let clp = ClpMatrix::new(&["s1", "s2", "s3"], clp).expect("clp");
    simulate(
        model,
        "ds",
        &variables(1.0),
        &times,
        &wavelengths,
        &clp,
        Some(Noise::new(1e-3, 1)),
    )
    .expect("simulation")
}

fn bench_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluation");
    for &(label, with_irf) in &[("shared_matrix", false), ("dispersed_irf", true)] {
        let model = model(with_irf);
        let data: HashMap<String, Dataset> =
            [("ds".to_string(), dataset(&model, 64))].into_iter().collect();
        let variables = variables(1.0);
        for parallel in [false, true] {
            let config = OptimizationConfig::new().with_parallel(parallel);
            let optimization = OptimizationGroup::new(&model, &data, &config).expect("group");
            group.bench_with_input(
                BenchmarkId::new(label, if parallel { "parallel" } else { "serial" }),
                &optimization,
                |b, optimization| {
                    b.iter(|| {
                        optimization
                            .evaluate(black_box(&variables), EvaluationDetail::Residual)
                            .expect("evaluation")
                    })
                },
            );
        }
    }
    group.finish();
}

fn bench_linear_solve(c: &mut Criterion) {
    let model = model(false);
    let data = dataset(&model, 8);
    let variables = variables(1.0);
    let dataset_model = model.dataset("ds").expect("dataset model");
    let matrices = calculate_dataset_matrices(
        &model,
        dataset_model,
        &data.model_axis().to_vec(),
        &data.global_axis().to_vec(),
        &variables,
    )
    .expect("matrices");
    let column = data.data().column(0).to_owned();

    c.bench_function("solve_clps", |b| {
        b.iter(|| {
            solve_clps(
                matrices.at(0),
                black_box(&column),
                ClpRules::none(&variables),
                0.0,
                1e-10,
            )
            .expect("solve")
        })
    });
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);
    let data = dataset(&model(false), 32);
    group.bench_function("sequential_three_compartments", |b| {
        b.iter(|| {
            let scheme = Scheme::new(model(false), variables(0.8))
                .with_dataset("ds", data.clone());
            optimize(black_box(&scheme)).expect("fit")
        })
    });
    group.finish();
}

criterion_group!(benches, bench_evaluation, bench_linear_solve, bench_fit);
criterion_main!(benches);
