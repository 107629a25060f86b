//! エラー型定義
//!
//! 統一エラー型（thiserror使用）

use thiserror::Error;

/// Common layer error type
#[derive(Debug, Error)]
pub enum CommonError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// load balancer error type
#[derive(Debug, Error)]
pub enum LbError {
    /// Backend connection or stream error
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Backend did not answer within the configured timeout
    #[error("Timeout error: {0}")]
    Timeout(String),
}

impl LbError {
    /// Returns a safe error message for external clients.
    ///
    /// Backend addresses and other internal details only appear in the
    /// `Display` output, which is written to server logs.
    pub fn external_message(&self) -> &'static str {
        match self {
            Self::Http(_) => "Backend service unavailable",
            Self::Timeout(_) => "Request timeout",
        }
    }
}

/// Shard service error type
#[derive(Debug, Error)]
pub enum ShardError {
    /// Requested document does not exist or cannot be parsed
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Work execution failed
    #[error("Work failed: {0}")]
    Work(String),
}

impl ShardError {
    /// Returns the error code written to the JSON error body.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DocumentNotFound(_) => "doc_not_found",
            Self::Work(_) => "work_failed",
        }
    }
}

/// Result type alias (Common)
pub type CommonResult<T> = Result<T, CommonError>;

/// Result type alias (Shard)
pub type ShardResult<T> = Result<T, ShardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_error_display() {
        let error = CommonError::Validation("load_weight must be a finite number".to_string());
        assert_eq!(
            error.to_string(),
            "Validation error: load_weight must be a finite number"
        );
    }

    #[test]
    fn test_error_from_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let common_error: CommonError = json_error.into();
        assert!(matches!(common_error, CommonError::Serialization(_)));

        let io_error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let common_error: CommonError = io_error.into();
        assert!(matches!(common_error, CommonError::Io(_)));
    }

    #[test]
    fn test_lb_error_external_message_hides_details() {
        let error = LbError::Http("connection refused: http://10.0.0.7:8080".to_string());
        assert!(error.to_string().contains("10.0.0.7"));
        assert_eq!(error.external_message(), "Backend service unavailable");
        assert!(!error.external_message().contains("10.0.0.7"));

        let timeout = LbError::Timeout("shard cpu did not respond".to_string());
        assert_eq!(timeout.external_message(), "Request timeout");
    }

    #[test]
    fn test_shard_error_codes() {
        assert_eq!(
            ShardError::DocumentNotFound("d1".to_string()).error_code(),
            "doc_not_found"
        );
        assert_eq!(
            ShardError::Work("join error".to_string()).error_code(),
            "work_failed"
        );
    }
}
