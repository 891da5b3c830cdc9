use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReporterError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Predictor request failed: {0}")]
    PredictorRequestError(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for '{field}' ({value}): {reason}")]
    InvalidValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Report with ID {id} not found")]
    NotFound { id: i64 },

    #[error("Detection error: {message}")]
    DetectionError { message: String },

    #[error("Camera error: {message}")]
    CameraError { message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Persistence,
    Detection,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ReporterError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReporterError::ConfigError { .. }
            | ReporterError::ConfigValidationError { .. }
            | ReporterError::MissingConfigError { .. }
            | ReporterError::YamlError(_) => ErrorCategory::Configuration,
            ReporterError::InvalidValueError { .. }
            | ReporterError::ValidationError { .. }
            | ReporterError::NotFound { .. }
            | ReporterError::Base64Error(_)
            | ReporterError::SerializationError(_) => ErrorCategory::Input,
            ReporterError::DatabaseError(_) | ReporterError::StorageError { .. } => {
                ErrorCategory::Persistence
            }
            ReporterError::DetectionError { .. }
            | ReporterError::PredictorRequestError(_)
            | ReporterError::ImageError(_) => ErrorCategory::Detection,
            ReporterError::IoError(_) | ReporterError::CameraError { .. } => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Low,
            ErrorCategory::Detection => ErrorSeverity::Medium,
            ErrorCategory::Persistence => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check config.yaml: the database, uploads and detector sections must be valid"
            }
            ErrorCategory::Input => "Check the request payload and try again",
            ErrorCategory::Persistence => {
                "Check the database URL and that the upload directory is writable"
            }
            ErrorCategory::Detection => {
                "Check that the predictor endpoint is reachable and returns detections"
            }
            ErrorCategory::System => "Check file permissions and that the camera device exists",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ReporterError::NotFound { id } => format!("Report with ID {} was not found.", id),
            ReporterError::ConfigError { message } => format!("Configuration problem: {}", message),
            ReporterError::MissingConfigError { field } => {
                format!("Configuration is missing '{}'.", field)
            }
            ReporterError::InvalidValueError { field, reason, .. } => {
                format!("Invalid '{}': {}", field, reason)
            }
            other => other.to_string(),
        }
    }

    /// 方便建立驗證錯誤
    pub fn validation(message: impl Into<String>) -> Self {
        ReporterError::ValidationError {
            message: message.into(),
        }
    }

    pub fn detection(message: impl Into<String>) -> Self {
        ReporterError::DetectionError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReporterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_low_severity_input() {
        let err = ReporterError::NotFound { id: 7 };
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert!(err.user_friendly_message().contains('7'));
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = ReporterError::MissingConfigError {
            field: "database.url".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.recovery_suggestion().contains("config.yaml"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ReporterError = io_err.into();
        assert!(matches!(err, ReporterError::IoError(_)));
        assert_eq!(err.category(), ErrorCategory::System);
    }
}
