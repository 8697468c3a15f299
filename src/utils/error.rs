use crate::fit::FitError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("FIT decoding failed: {0}")]
    FitError(#[from] FitError),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Task step '{step}' failed with exit code {code:?}")]
    TaskFailed { step: String, code: Option<i32> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Configuration,
    Processing,
    Output,
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::FitError(_) => ErrorCategory::Input,
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. }
            | EtlError::CsvError(_)
            | EtlError::SerializationError(_) => ErrorCategory::Processing,
            EtlError::ZipError(_) | EtlError::IoError(_) => ErrorCategory::Output,
            EtlError::TaskFailed { .. } => ErrorCategory::Task,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::ValidationError { .. } => ErrorSeverity::Low,
            EtlError::TaskFailed { .. } => ErrorSeverity::Medium,
            EtlError::FitError(_)
            | EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::ProcessingError { .. }
            | EtlError::CsvError(_)
            | EtlError::SerializationError(_) => ErrorSeverity::High,
            EtlError::ZipError(_) | EtlError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::FitError(FitError::CrcMismatch { .. })
            | EtlError::FitError(FitError::HeaderCrcMismatch { .. }) => {
                "The file may be damaged; retry with --no-crc-check to read it anyway"
            }
            EtlError::FitError(_) => "Check that the input is a complete .fit activity file",
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => {
                "Review the command line arguments or configuration file"
            }
            EtlError::ProcessingError { .. } | EtlError::ValidationError { .. } => {
                "Inspect the activity data with --verbose for details"
            }
            EtlError::CsvError(_) | EtlError::SerializationError(_) => {
                "Try a different output format"
            }
            EtlError::ZipError(_) | EtlError::IoError(_) => {
                "Check that the paths exist and are writable"
            }
            EtlError::TaskFailed { .. } => "See the output of the failing command above",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::FitError(e) => format!("Could not read the FIT file: {}", e),
            EtlError::IoError(e) => format!("File system error: {}", e),
            EtlError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            EtlError::MissingConfigError { field } => {
                format!("Missing required setting '{}'", field)
            }
            other => other.to_string(),
        }
    }

    /// Process exit code for this error; never zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            EtlError::TaskFailed {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => match self.severity() {
                ErrorSeverity::Low | ErrorSeverity::High => 1,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::Critical => 3,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_errors_are_input_errors() {
        let err: EtlError = FitError::UndefinedLocalMessage(2).into();
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.exit_code(), 1);
        assert!(err.user_friendly_message().contains("local message type 2"));
    }

    #[test]
    fn test_crc_errors_suggest_skipping_check() {
        let err: EtlError = FitError::CrcMismatch {
            expected: 1,
            computed: 2,
        }
        .into();
        assert!(err.recovery_suggestion().contains("--no-crc-check"));
    }

    #[test]
    fn test_task_failure_keeps_exit_code() {
        let err = EtlError::TaskFailed {
            step: "cargo test".to_string(),
            code: Some(101),
        };
        assert_eq!(err.exit_code(), 101);
        assert_eq!(err.category(), ErrorCategory::Task);
    }

    #[test]
    fn test_every_error_exits_non_zero() {
        let validation = EtlError::ValidationError {
            message: "no rows".to_string(),
        };
        assert_eq!(validation.severity(), ErrorSeverity::Low);
        assert_eq!(validation.exit_code(), 1);

        let signalled = EtlError::TaskFailed {
            step: "cargo publish".to_string(),
            code: None,
        };
        assert_ne!(signalled.exit_code(), 0);

        let zero = EtlError::TaskFailed {
            step: "cargo publish".to_string(),
            code: Some(0),
        };
        assert_ne!(zero.exit_code(), 0);
    }
}
