//! Variables in fits: derived expressions, fixed values and persistence.

mod common;

use approx::assert_relative_eq;
use common::*;
use kinfit_rs::variables::{Variable, VariableStore};
use kinfit_rs::{optimize, KinFitError, Scheme};

fn derived_rates(k1: f64) -> VariableStore {
    let mut variables = VariableStore::new();
    variables
        .add(Variable::new("rates.k1", k1).with_bounds(0.0, 10.0).unwrap())
        .unwrap();
    variables
        .add(
            Variable::new("rates.k2", 0.0)
                .with_expression("rates.k1 / 5")
                .unwrap(),
        )
        .unwrap();
    variables
}

#[test]
fn test_derived_rate_follows_free_rate() {
    let model = sequential_model(&["ds"]);
    let data = simulated_dataset(&model, "ds");
    let scheme = Scheme::new(model, derived_rates(0.4)).with_dataset("ds", data);

    let result = optimize(&scheme).unwrap();

    assert!(result.is_converged());
    assert_eq!(result.free_names, vec!["rates.k1".to_string()]);
    assert_relative_eq!(result.variables.value("rates.k1").unwrap(), TRUE_K1, epsilon = 1e-6);
    assert_relative_eq!(result.variables.value("rates.k2").unwrap(), TRUE_K2, epsilon = 1e-6);
    assert!(result.variables.get("rates.k2").unwrap().standard_error.is_none());
    // The initial store already carries the resolved derived value.
    assert_relative_eq!(
        result.initial_variables.value("rates.k2").unwrap(),
        0.08,
        epsilon = 1e-12
    );
}

#[test]
fn test_fixed_rate_is_left_alone() {
    let model = sequential_model(&["ds"]);
    let data = simulated_dataset(&model, "ds");
    let mut variables = VariableStore::new();
    variables
        .add(Variable::new("rates.k1", 0.4).with_bounds(0.0, 10.0).unwrap())
        .unwrap();
    variables
        .add(Variable::new("rates.k2", TRUE_K2).fixed())
        .unwrap();
    let scheme = Scheme::new(model, variables).with_dataset("ds", data);

    let result = optimize(&scheme).unwrap();

    assert_eq!(result.variables.value("rates.k2").unwrap(), TRUE_K2);
    assert_relative_eq!(result.variables.value("rates.k1").unwrap(), TRUE_K1, epsilon = 1e-6);
    assert_eq!(result.covariance.as_ref().map(|c| c.dim()), Some((1, 1)));
}

#[test]
fn test_expression_cycle_is_reported() {
    let model = sequential_model(&["ds"]);
    let data = simulated_dataset(&model, "ds");
    let mut variables = rates(0.4, 0.12);
    variables
        .add(Variable::new("x", 0.0).with_expression("y + 1").unwrap())
        .unwrap();
    variables
        .add(Variable::new("y", 0.0).with_expression("2 * x").unwrap())
        .unwrap();
    let scheme = Scheme::new(model, variables).with_dataset("ds", data);

    match optimize(&scheme) {
        Err(KinFitError::ExpressionCycle { mut names }) => {
            names.sort();
            assert_eq!(names, vec!["x".to_string(), "y".to_string()]);
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
}

#[test]
fn test_unknown_model_variable() {
    let model = sequential_model(&["ds"]);
    let data = simulated_dataset(&model, "ds");
    let mut variables = VariableStore::new();
    variables.add_value("rates.k1", 0.4).unwrap();
    let scheme = Scheme::new(model, variables).with_dataset("ds", data);

    match optimize(&scheme) {
        Err(KinFitError::Configuration(message)) => assert!(message.contains("rates.k2")),
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn test_start_outside_bounds_is_rejected() {
    let model = sequential_model(&["ds"]);
    let data = simulated_dataset(&model, "ds");
    let mut variables = rates(0.4, 0.12);
    // Out-of-bounds values can only enter through deserialization.
    let json = variables
        .to_json()
        .unwrap()
        .replace("0.4", "20.0");
    variables = VariableStore::from_json(&json).unwrap();
    let scheme = Scheme::new(model, variables).with_dataset("ds", data);

    assert!(matches!(optimize(&scheme), Err(KinFitError::Bounds(_))));
}

#[test]
fn test_fitted_store_survives_json() {
    let model = sequential_model(&["ds"]);
    let data = with_noise(&simulated_dataset(&model, "ds"), 0.01, 11);
    let scheme = Scheme::new(model, derived_rates(0.4)).with_dataset("ds", data);
    let result = optimize(&scheme).unwrap();

    let restored = VariableStore::from_json(&result.variables.to_json().unwrap()).unwrap();

    assert_eq!(restored.names(), result.variables.names());
    let k1 = restored.get("rates.k1").unwrap();
    assert_eq!(k1.value(), result.variables.value("rates.k1").unwrap());
    assert_eq!(k1.maximum(), 10.0);
    assert!(k1.standard_error.is_some());
    assert_eq!(restored.get("rates.k2").unwrap().expression(), Some("rates.k1 / 5"));
}
