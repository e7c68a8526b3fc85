//! Unified error system for meshca
//!
//! A single request-facing error type. Variants mirror the decisions an
//! authority can surface to a caller: a provisioner that failed to start, a
//! credential that could not be trusted, a genuine credential asking for more
//! than it is allowed, a malformed request, or an internal fault.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Unified error type for all meshca operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum MeshcaError {
    /// Provisioner configuration is missing or invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },

    /// The presented credential could not be authenticated
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Error message describing why the credential was rejected
        message: String,
    },

    /// The credential is genuine but the request exceeds what it permits
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Error message describing the offending request content
        message: String,
    },

    /// The request itself is malformed
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message describing the malformed request
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl MeshcaError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wrap a source error as unauthorized, prefixing `context`
    pub fn unauthorized_with(err: impl Display, context: impl Display) -> Self {
        Self::unauthorized(format!("{context}: {err}"))
    }

    /// Wrap a source error as a configuration error, prefixing `context`
    pub fn config_with(err: impl Display, context: impl Display) -> Self {
        Self::config(format!("{context}: {err}"))
    }

    /// Wrap a source error as internal, prefixing `context`
    pub fn internal_with(err: impl Display, context: impl Display) -> Self {
        Self::internal(format!("{context}: {err}"))
    }

    /// The message carried by this error, without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Config { message }
            | Self::Unauthorized { message }
            | Self::Forbidden { message }
            | Self::BadRequest { message }
            | Self::Internal { message } => message,
        }
    }

    /// HTTP status an API layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::BadRequest { .. } => 400,
            Self::Config { .. } | Self::Internal { .. } => 500,
        }
    }

    /// Whether this is an unauthorized rejection
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Whether this is a forbidden rejection
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }
}

/// Standard Result type for meshca operations
pub type Result<T> = std::result::Result<T, MeshcaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_error_creation() {
        let err = MeshcaError::forbidden("test message");
        assert_matches!(err, MeshcaError::Forbidden { .. });
        assert_eq!(err.to_string(), "Forbidden: test message");
        assert_eq!(err.message(), "test message");
    }

    #[test]
    fn test_wrapped_context() {
        let err = MeshcaError::unauthorized_with("bad base64", "failed to parse token");
        assert_eq!(err.message(), "failed to parse token: bad base64");
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(MeshcaError::unauthorized("x").status_code(), 401);
        assert_eq!(MeshcaError::forbidden("x").status_code(), 403);
        assert_eq!(MeshcaError::bad_request("x").status_code(), 400);
        assert_eq!(MeshcaError::config("x").status_code(), 500);
        assert_eq!(MeshcaError::internal("x").status_code(), 500);
    }

    #[test]
    fn test_serde_roundtrip_keeps_variant() {
        let err = MeshcaError::forbidden("node-9");
        let json = serde_json::to_string(&err).unwrap();
        let back: MeshcaError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
