use thiserror::Error;

/// Error types for the pta-fit library.
#[derive(Error, Debug)]
pub enum FitError {
    /// Error indicating a mismatch in array dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error for invalid parameter values.
    #[error("Invalid parameter value: {0}")]
    InvalidParameter(String),

    /// Error for parameter-related problems.
    #[error("Parameter error: {0}")]
    ParameterError(String),

    /// Parameter not found.
    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    /// A parameter the forward model requires is absent from the parameter map.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// Error for boundary constraint violations.
    #[error("Bounds error: {0}")]
    BoundsError(String),

    /// Error raised by the forward model.
    #[error("Model evaluation error: {0}")]
    ModelEvaluation(String),

    /// No forward model has been attached to the session.
    #[error("No forward model available")]
    ModelUnavailable,

    /// The session has no observed data to fit.
    #[error("No observed data loaded")]
    NoObservedData,

    /// A fit is already running in this session.
    #[error("A fit is already running")]
    AlreadyRunning,

    /// The background worker died without reporting a result.
    #[error("Fit worker failed: {0}")]
    WorkerFailed(String),

    /// The damped system could not be solved by any factorization.
    #[error("Linear algebra error: {0}")]
    LinearAlgebraError(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<crate::parameters::parameter::ParameterError> for FitError {
    fn from(err: crate::parameters::parameter::ParameterError) -> Self {
        FitError::ParameterError(format!("{}", err))
    }
}

impl From<crate::parameters::bounds::BoundsError> for FitError {
    fn from(err: crate::parameters::bounds::BoundsError) -> Self {
        FitError::BoundsError(format!("{}", err))
    }
}

/// Result type alias for pta-fit operations.
pub type Result<T> = std::result::Result<T, FitError>;
