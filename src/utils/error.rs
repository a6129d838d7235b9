use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("input file not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("input file unreadable: {path}: {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid limit {value}: {reason}")]
    InvalidLimit { value: i64, reason: String },

    /// Per-record decode failure. Never fatal: the scan absorbs these into
    /// the skipped-record counter.
    #[error("record decode failed: {message}")]
    DecodeError { message: String },

    #[error("worker {worker} failed: {message}")]
    WorkerFatal { worker: usize, message: String },

    #[error("scan exceeded wall-clock budget of {budget_secs}s")]
    DeadlineExceeded { budget_secs: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("invalid value for `{field}` ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("missing required config field `{field}`")]
    MissingConfigError { field: String },

    #[error("config file error: {message}")]
    ConfigFileError { message: String },
}

pub type Result<T> = std::result::Result<T, TallyError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Bad invocation, fixable by the user before any work starts.
    Low,
    /// The run was cut short (budget expiry).
    Medium,
    /// The input or a worker failed mid-run; partial results were discarded.
    High,
    /// Environment-level failure (IO, serialization).
    Critical,
}

impl TallyError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TallyError::InvalidLimit { .. }
            | TallyError::InvalidConfigValueError { .. }
            | TallyError::MissingConfigError { .. }
            | TallyError::ConfigFileError { .. } => ErrorSeverity::Low,
            TallyError::DeadlineExceeded { .. } => ErrorSeverity::Medium,
            TallyError::InputNotFound { .. }
            | TallyError::InputUnreadable { .. }
            | TallyError::DecodeError { .. }
            | TallyError::WorkerFatal { .. } => ErrorSeverity::High,
            TallyError::IoError(_) | TallyError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            TallyError::InputNotFound { .. } => {
                "Check that the dump path exists and is spelled correctly"
            }
            TallyError::InputUnreadable { .. } => "Check file permissions on the dump and re-run",
            TallyError::InvalidLimit { .. } => {
                "Use a limit of -1 (unlimited) or any non-negative integer"
            }
            TallyError::DecodeError { .. } => {
                "Check the record against the configured adapter's expected shape"
            }
            TallyError::WorkerFatal { .. } => {
                "Re-run; if it persists, try --processes 1 to isolate the failing chunk"
            }
            TallyError::DeadlineExceeded { .. } => {
                "Raise --budget-secs or drop it for an unbounded run"
            }
            TallyError::IoError(_) => "Check disk space and permissions on the output directory",
            TallyError::SerializationError(_) => "Re-run; the output document could not be encoded",
            TallyError::InvalidConfigValueError { .. }
            | TallyError::MissingConfigError { .. }
            | TallyError::ConfigFileError { .. } => "Fix the flagged setting and re-run",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            TallyError::InputNotFound { path } => {
                format!("The registry dump `{}` does not exist", path.display())
            }
            TallyError::InputUnreadable { path, .. } => {
                format!("The registry dump `{}` could not be read", path.display())
            }
            TallyError::WorkerFatal { .. } => {
                "A scan worker failed; no partial ranking was written".to_string()
            }
            TallyError::DeadlineExceeded { budget_secs } => {
                format!("The scan did not finish within {budget_secs}s; no ranking was written")
            }
            other => other.to_string(),
        }
    }
}
