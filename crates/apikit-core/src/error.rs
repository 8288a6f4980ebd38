//! Shared error type across apikit crates.

use thiserror::Error;

/// Stable error codes (used in JSON error bodies and logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid input / malformed request.
    BadRequest,
    /// No such resource.
    NotFound,
    /// Configuration could not be resolved or is invalid.
    Config,
    /// Metric registration rejected.
    Metrics,
    /// Operation not valid in the current lifecycle state.
    InvalidState,
    /// Listener or accept loop failure.
    Io,
    /// Internal server error.
    Internal,
}

impl ErrorCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Metrics => "METRICS",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::Io => "IO",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ApiKitError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum ApiKitError {
    #[error("config: {0}")]
    Config(String),
    #[error("config parse: {0}")]
    ConfigParse(String),
    #[error("metric already registered: {0}")]
    DuplicateMetric(String),
    #[error("metrics: {0}")]
    Metrics(String),
    #[error("invalid server state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },
    #[error("unsupported route: {0}")]
    UnsupportedRoute(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("serve: {0}")]
    Serve(#[source] std::io::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ApiKitError {
    /// Map internal error to a stable code.
    pub fn client_code(&self) -> ErrorCode {
        match self {
            ApiKitError::Config(_) | ApiKitError::ConfigParse(_) => ErrorCode::Config,
            ApiKitError::UnsupportedRoute(_) => ErrorCode::Config,
            ApiKitError::DuplicateMetric(_) | ApiKitError::Metrics(_) => ErrorCode::Metrics,
            ApiKitError::InvalidState { .. } => ErrorCode::InvalidState,
            ApiKitError::Bind { .. } | ApiKitError::Serve(_) => ErrorCode::Io,
            ApiKitError::BadRequest(_) => ErrorCode::BadRequest,
            ApiKitError::NotFound(_) => ErrorCode::NotFound,
            ApiKitError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Infrastructure failures that must stop the process before (or instead of) serving.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ApiKitError::BadRequest(_) | ApiKitError::NotFound(_) | ApiKitError::Internal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_errors_are_fatal() {
        assert!(ApiKitError::DuplicateMetric("x".into()).is_fatal());
        assert!(ApiKitError::ConfigParse("bad yaml".into()).is_fatal());
        assert!(ApiKitError::InvalidState { expected: "configured", found: "running" }.is_fatal());
        let bind = ApiKitError::Bind {
            addr: "0.0.0.0:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(bind.is_fatal());
        assert_eq!(bind.client_code().as_str(), "IO");
    }

    #[test]
    fn request_errors_are_contained() {
        let err = ApiKitError::BadRequest("malformed json".into());
        assert!(!err.is_fatal());
        assert_eq!(err.client_code(), ErrorCode::BadRequest);
        assert_eq!(err.to_string(), "bad request: malformed json");
    }
}
