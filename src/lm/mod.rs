//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides the bounded Levenberg-Marquardt solver that drives the
//! nonlinear variables of a fit. The solver only sees a flat parameter vector
//! through the [`Problem`](crate::problem::Problem) trait.

pub mod algorithm;
pub mod cancel;
pub mod config;
pub mod convergence;

pub use algorithm::{LevenbergMarquardt, LmResult};
pub use cancel::CancelToken;
pub use config::LmConfig;
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};
