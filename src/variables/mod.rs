//! # Variable System
//!
//! Named scalar variables the model reads while it builds its matrices.
//!
//! - [`Variable`]: value, bounds, fixed flag, optional expression and standard error
//! - [`VariableStore`]: ordered collection, flat-vector round trip for the optimizer
//!   and dependency-ordered recomputation of derived variables
//! - [`Expression`]: parser and evaluator for derived-variable expressions
//!
//! ## Example Usage
//!
//! ```rust
//! use kinfit_rs::variables::{Variable, VariableStore};
//!
//! let mut store = VariableStore::new();
//! store.add(Variable::new("rates.k1", 0.5).with_bounds(0.0, 10.0).unwrap()).unwrap();
//! store.add(Variable::new("rates.k2", 0.1)).unwrap();
//! store.add(Variable::new("irf.center", 0.0).fixed()).unwrap();
//! store.add(Variable::new("rates.k3", 0.0).with_expression("$rates.k1 + $rates.k2").unwrap()).unwrap();
//!
//! store.update_derived().unwrap();
//! assert!((store.value("rates.k3").unwrap() - 0.6).abs() < 1e-12);
//!
//! // Only free variables reach the optimizer.
//! let x = store.to_vector();
//! assert_eq!(x.len(), 2);
//! store.from_vector(&x).unwrap();
//! ```

pub mod bounds;
pub mod expression;
pub mod store;
pub mod variable;

use thiserror::Error;

pub use bounds::Bounds;
pub use expression::{EvaluationContext, Expression, ExpressionError};
pub use store::VariableStore;
pub use variable::Variable;

/// Errors raised while building or editing variables.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VariableError {
    #[error("Invalid bounds: min ({min}) must not exceed max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Value {value} of variable '{name}' is outside its bounds [{min}, {max}]")]
    OutOfBounds {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Variable '{name}' not found")]
    NotFound { name: String },

    #[error("Variable '{name}' already exists")]
    Duplicate { name: String },

    #[error("Variable '{name}' cannot be both fixed and derived from an expression")]
    FixedWithExpression { name: String },

    #[error("Invalid expression for variable '{name}': {source}")]
    Expression {
        name: String,
        #[source]
        source: ExpressionError,
    },
}
