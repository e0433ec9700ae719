//! Error types for the SVM layer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SVMError {
    #[error("Allocation failed: {0}")]
    AllocationError(String),

    #[error("Invalid parameter: {0}")]
    ValidationError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt model: {0}")]
    CorruptModel(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl SVMError {
    /// True for errors caused by the caller's arguments rather than the environment
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            SVMError::ValidationError(_)
                | SVMError::UnsupportedOperation(_)
                | SVMError::InvalidArgument(_)
                | SVMError::DimensionMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SVMError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SVMError::ValidationError("C <= 0".to_string());
        assert_eq!(err.to_string(), "Invalid parameter: C <= 0");

        let err = SVMError::DimensionMismatch {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 3, got 2");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SVMError = io.into();
        assert!(matches!(err, SVMError::IoError(_)));
        assert!(!err.is_caller_error());
    }

    #[test]
    fn test_caller_error_classification() {
        assert!(SVMError::UnsupportedOperation("x".to_string()).is_caller_error());
        assert!(SVMError::InvalidArgument("x".to_string()).is_caller_error());
        assert!(!SVMError::CorruptModel("x".to_string()).is_caller_error());
        assert!(!SVMError::AllocationError("x".to_string()).is_caller_error());
    }
}
