//! Error types for HTTP report delivery.
//!
//! None of these ever reach the trap controller: they are produced inside the
//! spawned delivery task and only logged.

use thiserror::Error;

/// Result type alias for reporter operations.
pub type Result<T> = std::result::Result<T, ReporterError>;

/// Errors that can occur while delivering a violation report.
#[derive(Debug, Error)]
pub enum ReporterError {
    /// Transport-level failure (connect, TLS, timeout, body encoding).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("violation log endpoint returned status {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// The endpoint URL is not usable.
    #[error("invalid violation log endpoint: {0}")]
    InvalidEndpoint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = ReporterError::Status { status: 503 };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_invalid_endpoint_display() {
        let err = ReporterError::InvalidEndpoint("ftp://x".to_string());
        assert!(err.to_string().contains("ftp://x"));
    }
}
