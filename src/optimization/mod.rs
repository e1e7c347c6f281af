//! Variable projection: matrices, linear CLP estimation, problem grouping
//! and the nonlinear fit driver.

pub mod config;
pub mod driver;
pub mod estimation;
pub mod group;
pub mod grouping;
pub mod matrix;

pub use config::OptimizationConfig;
pub use driver::{evaluate, optimize, optimize_with_cancel, Scheme};
pub use estimation::{least_squares, solve_clps, ClpRules, LinearSolution};
pub use group::{DatasetEvaluation, Evaluation, EvaluationDetail, OptimizationGroup};
pub use grouping::{
    align_global_axes, align_value, problem_layout, LinkMethod, ProblemMember, ProblemSpec,
};
pub use matrix::{calculate_dataset_matrices, DatasetMatrices, MatrixContainer};
