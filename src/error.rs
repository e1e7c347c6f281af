use thiserror::Error;

/// Error types for the kinfit-rs library.
#[derive(Error, Debug)]
pub enum KinFitError {
    /// The model and the variable store or the datasets do not fit together.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error indicating a mismatch in array or vector dimensions.
    #[error("Dimension mismatch: {0}")]
    Dimension(String),

    /// A megacomplex produced a matrix with the wrong number of rows.
    #[error(
        "Matrix of {kind} megacomplex '{megacomplex}' in dataset '{dataset}' has {actual} rows, expected {expected}"
    )]
    MatrixShape {
        dataset: String,
        megacomplex: String,
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Derived variables reference each other in a loop.
    #[error("Cyclic expression dependency between variables: {}", names.join(", "))]
    ExpressionCycle { names: Vec<String> },

    /// A derived variable could not be evaluated.
    #[error("Cannot evaluate expression of variable '{name}': {message}")]
    ExpressionEval { name: String, message: String },

    /// A value handed back by the optimizer lies outside the variable bounds.
    #[error("Bounds error: {0}")]
    Bounds(String),

    /// Global axes of linked datasets could not be aligned.
    #[error("Alignment error: {0}")]
    Alignment(String),

    /// Linear algebra error.
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(String),

    /// Error while simulating a dataset.
    #[error("Simulation error: {0}")]
    Simulation(String),

    /// The run was cancelled through its cancellation token.
    #[error("Optimization cancelled")]
    Cancelled,

    /// Error for variable-related problems.
    #[error("Variable error: {0}")]
    Variable(#[from] crate::variables::VariableError),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KinFitError {
    /// `true` for failures of the numerics at a particular point (coinciding
    /// rates, an expression dividing by zero, a failed decomposition), as
    /// opposed to errors in the setup.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            KinFitError::LinearAlgebra(_) | KinFitError::ExpressionEval { .. }
        )
    }
}

/// Result type alias for kinfit-rs operations.
pub type Result<T> = std::result::Result<T, KinFitError>;
