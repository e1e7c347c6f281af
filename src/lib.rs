//! # kinfit-rs
//!
//! `kinfit-rs` fits global and target-analysis models to time-resolved
//! spectroscopy data by variable projection.
//!
//! A dataset is a 2-D array over a model axis (e.g. time) and a global axis
//! (e.g. wavelength). The model builds, for every global index, a matrix whose
//! columns depend nonlinearly on a few variables (rates, IRF shape, ...). The
//! conditionally linear parameters (CLPs, e.g. spectra) are solved exactly by
//! linear least squares inside every residual evaluation, and only the
//! nonlinear variables are left to the bounded Levenberg-Marquardt solver.
//!
//! The library provides:
//! - A variable store with bounds, fixed values and derived expressions
//! - Megacomplexes for decays, damped oscillations, baselines, coherent
//!   artifacts and spectral shapes
//! - CLP constraints, relations, aliasing and dataset linking
//! - Standard errors, covariance and correlation of the fitted variables
//!
//! ## Basic Usage
//!
//! ```
//! use kinfit_rs::megacomplexes::DecayMegacomplex;
//! use kinfit_rs::model::{DatasetModel, Model};
//! use kinfit_rs::simulation::{simulate, ClpMatrix};
//! use kinfit_rs::variables::{Variable, VariableStore};
//! use kinfit_rs::{optimize, Scheme};
//! use ndarray::Array1;
//!
//! let mut model = Model::new();
//! model.add_megacomplex("decay", DecayMegacomplex::parallel(&["s1"], &["k1"]))?;
//! model.add_dataset(DatasetModel::new("ds").with_megacomplex("decay"))?;
//!
//! let mut truth = VariableStore::new();
//! truth.add_value("k1", 0.5)?;
//! let times = Array1::linspace(0.0, 10.0, 41);
//! let wavelengths = Array1::from(vec![500.0, 600.0]);
//! let clp = ClpMatrix::constant(&["s1"], &[1.0], 2)?;
//! let data = simulate(&model, "ds", &truth, &times, &wavelengths, &clp, None)?;
//!
//! let mut start = VariableStore::new();
//! start.add(Variable::new("k1", 0.3).with_bounds(0.0, 10.0)?)?;
//! let scheme = Scheme::new(model, start).with_dataset("ds", data);
//! let result = optimize(&scheme)?;
//!
//! assert!(result.is_converged());
//! assert!((result.variables.value("k1")? - 0.5).abs() < 1e-6);
//! # Ok::<(), kinfit_rs::KinFitError>(())
//! ```

pub mod error;

pub mod variables;

pub mod utils;

pub mod problem;

pub mod lm;

pub mod model;

pub mod megacomplexes;

pub mod data;

pub mod optimization;

pub mod uncertainty;

pub mod result;

pub mod simulation;

// Re-exports for convenience
pub use data::Dataset;
pub use error::{KinFitError, Result};
pub use lm::{CancelToken, LevenbergMarquardt};
pub use model::Model;
pub use optimization::{evaluate, optimize, optimize_with_cancel, OptimizationConfig, Scheme};
pub use problem::Problem;
pub use result::{DatasetResult, FitResult, FitStatus};
pub use variables::{Variable, VariableStore};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
