//! Error types for session operations.

use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend handle could not be established or reused
    #[error("Connection error: {0}")]
    Connection(String),

    /// A query or write failed against an established handle
    #[error("Backend error: {0}")]
    Backend(String),

    /// A stored blob could not be decoded into session values
    #[error("Decode error: {0}")]
    Decode(String),

    /// Session values could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Session record not found
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Operation timeout
    #[error("Operation timeout")]
    Timeout,

    /// Invalid session ID
    #[error("Invalid session ID: {0}")]
    InvalidSessionId(String),

    /// Provider registry error
    #[error("Registry error: {0}")]
    Registry(String),
}

impl SessionError {
    /// Check if this error came from talking to the backend: an unusable
    /// handle, a failed command, or an elapsed deadline.
    ///
    /// [`ErrorPolicy::Lenient`](crate::ErrorPolicy::Lenient) does not filter
    /// on this; advisory operations swallow every error kind under it.
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Backend(_) | Self::Timeout
        )
    }

    /// Check if this error came from the value codec.
    pub fn is_codec_error(&self) -> bool {
        matches!(self, Self::Encode(_) | Self::Decode(_))
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for SessionError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(SessionError::Backend("down".into()).is_backend_error());
        assert!(SessionError::Timeout.is_backend_error());
        assert!(!SessionError::Decode("bad".into()).is_backend_error());
        assert!(SessionError::Encode("bad".into()).is_codec_error());
    }

    #[test]
    fn test_error_display() {
        let err = SessionError::InvalidSessionId("empty".to_string());
        assert_eq!(err.to_string(), "Invalid session ID: empty");
    }
}
