//! Error types for feedrelay.

use thiserror::Error;

/// Common error type for feedrelay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// A subscription with the same title already exists.
    #[error("subscription '{0}' already exists")]
    DuplicateTitle(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Fetching or parsing a feed failed.
    ///
    /// Covers network errors, HTTP errors, oversized bodies, unparsable
    /// documents and timeouts alike.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Delivering a notification failed.
    #[error("send error: {0}")]
    Send(String),

    /// Persistence error.
    ///
    /// Database errors from sqlx are automatically converted.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Whether the error is transient and the operation should simply be
    /// retried on the next poll cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RelayError::Fetch(_) | RelayError::Send(_) | RelayError::Persistence(_)
        )
    }
}

impl From<sqlx::Error> for RelayError {
    fn from(e: sqlx::Error) -> Self {
        RelayError::Persistence(e.to_string())
    }
}

/// Result type alias for feedrelay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_title_display() {
        let err = RelayError::DuplicateTitle("news".to_string());
        assert_eq!(err.to_string(), "subscription 'news' already exists");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = RelayError::NotFound("subscription 'news'".to_string());
        assert_eq!(err.to_string(), "subscription 'news' not found");
    }

    #[test]
    fn test_fetch_error_display() {
        let err = RelayError::Fetch("HTTP error: 500".to_string());
        assert_eq!(err.to_string(), "fetch error: HTTP error: 500");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RelayError = io_err.into();
        assert!(matches!(err, RelayError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: RelayError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, RelayError::Persistence(_)));
    }

    #[test]
    fn test_is_transient() {
        assert!(RelayError::Fetch("timeout".into()).is_transient());
        assert!(RelayError::Send("502".into()).is_transient());
        assert!(RelayError::Persistence("locked".into()).is_transient());
        assert!(!RelayError::DuplicateTitle("x".into()).is_transient());
        assert!(!RelayError::NotFound("x".into()).is_transient());
        assert!(!RelayError::Config("x".into()).is_transient());
    }
}
