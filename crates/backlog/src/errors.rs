//! Error types for the backlog crate.

use thiserror::Error;

/// Error types for backlog generation and export
#[derive(Error, Debug, Clone)]
pub enum BacklogError {
    // Request errors
    #[error("Invalid request: {reason}")]
    Validation { reason: String },

    #[error("Failed to extract text from document: {reason}")]
    Extraction { reason: String },

    // Provider errors
    #[error("{provider} error: {reason}")]
    Provider { provider: String, reason: String },

    #[error("AI provider not configured: {provider} ({env_var} not set)")]
    ProviderNotConfigured { provider: String, env_var: String },

    #[error("{provider} request timed out")]
    ProviderTimeout { provider: String },

    // Prompt errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    // Export errors
    #[error("Unsupported export format: '{format}'")]
    UnsupportedFormat { format: String },

    #[error("Export failed: {reason}")]
    Export { reason: String },

    // Infrastructure errors
    #[error("I/O error: {reason}")]
    Io { reason: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

impl BacklogError {
    /// Shorthand for a validation failure.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Shorthand for a provider-level failure.
    pub fn provider(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error is caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Extraction { .. } | Self::UnsupportedFormat { .. }
        )
    }
}

impl From<std::io::Error> for BacklogError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for backlog operations
pub type BacklogResult<T> = Result<T, BacklogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BacklogError::UnsupportedFormat {
            format: "csv".to_string(),
        };
        assert_eq!(err.to_string(), "Unsupported export format: 'csv'");
    }

    #[test]
    fn test_provider_error_names_provider() {
        let err = BacklogError::provider("openai", "API returned 500: boom");
        assert_eq!(err.to_string(), "openai error: API returned 500: boom");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_client_errors() {
        assert!(BacklogError::validation("empty").is_client_error());
        assert!(BacklogError::Extraction {
            reason: "corrupt".to_string()
        }
        .is_client_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BacklogError = io_err.into();
        assert!(matches!(err, BacklogError::Io { .. }));
    }
}
