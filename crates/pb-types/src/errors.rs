use thiserror::Error;

/// Main error type for the ParaBench system
#[derive(Error, Debug)]
pub enum PbError {
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Harness error: {0}")]
    Harness(#[from] HarnessError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Failures of a single job. Every variant names the job it belongs to.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("Job {index} (value {value}) failed: {message}")]
    ExecutionFailed {
        index: usize,
        value: i64,
        message: String,
    },

    #[error("Job {index} (value {value}) panicked: {message}")]
    Panicked {
        index: usize,
        value: i64,
        message: String,
    },

    #[error("Job {index} (value {value}) lost: worker dropped its result")]
    Lost { index: usize, value: i64 },
}

impl JobError {
    /// Position of the failed job in its sweep.
    pub fn index(&self) -> usize {
        match self {
            Self::ExecutionFailed { index, .. }
            | Self::Panicked { index, .. }
            | Self::Lost { index, .. } => *index,
        }
    }

    /// Hyperparameter value of the failed job.
    pub fn value(&self) -> i64 {
        match self {
            Self::ExecutionFailed { value, .. }
            | Self::Panicked { value, .. }
            | Self::Lost { value, .. } => *value,
        }
    }
}

/// Errors raised by the runners, the selector and the execution context
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarnessError {
    #[error("Result set is empty: no minimum exists")]
    EmptyResultSet,

    #[error("Submission of job {index} rejected: {reason}")]
    SubmissionFailed { index: usize, reason: String },

    #[error("Execution context is shut down")]
    ContextShutDown,

    #[error("Object {id} not found in shared store")]
    ObjectNotFound { id: String },

    #[error("Worker pool initialization failed: {message}")]
    PoolInitFailed { message: String },
}

/// Dataset-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },

    #[error("Column not found: {column}")]
    ColumnNotFound { column: String },
}

/// Result type alias for ParaBench operations
pub type PbResult<T> = Result<T, PbError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::PbError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::PbError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::PbError::Config(format!($($arg)*))
    };
}
