//! # Error Handling
//!
//! Error types for the Vault secret-store adapter, defined with `thiserror`.
//!
//! Every failure carries an [`ErrorKind`] from a closed taxonomy so the transport
//! layer in front of the adapter can map it onto its own wire representation.
//! Failures surfaced by the public operations are wrapped in
//! [`Error::Operation`] with the operation and scoped secret name; the wrapper
//! never changes the kind of the underlying fault.

use std::fmt;

/// Custom result type for adapter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or contradictory backend configuration. Never retried.
    InvalidConfig,
    /// Caller-supplied name or record the engine cannot represent.
    InvalidArgument,
    /// Credential or login rejected.
    AuthFailed,
    /// Transport or network failure. Safe to retry with backoff.
    BackendUnreachable,
    /// Absent secret, config object or credential source.
    NotFound,
    /// Authenticated but not authorized for the operation.
    PermissionDenied,
}

impl ErrorKind {
    /// Stable string form, suitable for wire mapping and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidConfig => "invalid_config",
            Self::InvalidArgument => "invalid_argument",
            Self::AuthFailed => "auth_failed",
            Self::BackendUnreachable => "backend_unreachable",
            Self::NotFound => "not_found",
            Self::PermissionDenied => "permission_denied",
        }
    }

    /// Whether a caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnreachable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public operation a fault occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetSecret,
    ApplySecret,
    DeleteKeys,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetSecret => write!(f, "get secret"),
            Self::ApplySecret => write!(f, "apply secret"),
            Self::DeleteKeys => write!(f, "delete keys"),
        }
    }
}

/// Main error type for the adapter
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Backend configuration is malformed or contradictory
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// CA bundle could not be resolved or parsed
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Caller input the engine cannot represent
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Authentication against the backend failed
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Network or transport failure talking to the backend
    #[error("Backend unreachable: {0}")]
    BackendUnreachable(String),

    /// Secret, config object or credential source does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credential source exists but could not be read
    #[error("Credential source unreachable: {0}")]
    SourceUnreachable(String),

    /// Authenticated but not allowed
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A fault annotated with the operation and scoped name it occurred against
    #[error("{operation} '{name}': {source}")]
    Operation {
        operation: Operation,
        name: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a new configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a new TLS configuration error
    pub fn tls_config<S: Into<String>>(message: S) -> Self {
        Self::TlsConfig(message.into())
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a new authentication error
    pub fn auth_failed<S: Into<String>>(message: S) -> Self {
        Self::AuthFailed(message.into())
    }

    /// Create a new transport error
    pub fn backend_unreachable<S: Into<String>>(message: S) -> Self {
        Self::BackendUnreachable(message.into())
    }

    /// Create a new not found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a new credential source error
    pub fn source_unreachable<S: Into<String>>(message: S) -> Self {
        Self::SourceUnreachable(message.into())
    }

    /// Create a new permission error
    pub fn permission_denied<S: Into<String>>(message: S) -> Self {
        Self::PermissionDenied(message.into())
    }

    /// Wrap this error with the operation and scoped name it occurred against
    pub fn in_operation<S: Into<String>>(self, operation: Operation, name: S) -> Self {
        Self::Operation { operation, name: name.into(), source: Box::new(self) }
    }

    /// Kind of the underlying fault
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) | Self::TlsConfig(_) => ErrorKind::InvalidConfig,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::AuthFailed(_) => ErrorKind::AuthFailed,
            Self::BackendUnreachable(_) | Self::SourceUnreachable(_) => {
                ErrorKind::BackendUnreachable
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::Operation { source, .. } => source.kind(),
        }
    }

    /// Returns true if the underlying fault is `NotFound`
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::BackendUnreachable(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Self::BackendUnreachable(format!("unexpected response body: {}", err))
        } else {
            Self::BackendUnreachable(format!("request failed: {}", err))
        }
    }
}
