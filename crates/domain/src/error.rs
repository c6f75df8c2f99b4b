//! The seven-kind error taxonomy shared across the orchestration core.
//!
//! Every surfaced error carries a stable machine code (a UUID minted once,
//! at the point of failure) plus a human message, and is tagged with one
//! of seven kinds. HTTP handlers map kind to status code; the mapping
//! lives in `ro-gateway` since this crate has no axum dependency.

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Conflict,
    Expired,
    External,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Expired => "expired",
            ErrorKind::External => "external",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A surfaced error: kind, human message, and a machine code stable for
/// the lifetime of the failure (useful to grep logs for one specific
/// occurrence without leaking a stack trace across the HTTP boundary).
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {message} (code={code})")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub code: Uuid,
    /// The response a user-visible failure pertains to, when known at the
    /// point of failure (§7: surfaced errors always carry it if they can).
    pub response_id: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: Uuid::new_v4(),
            response_id: None,
        }
    }

    /// Attaches the id of the response this failure concerns. Chainable
    /// at the call site where the id is in scope but the error itself
    /// originates deeper in the stack (e.g. a store lookup).
    pub fn with_response_id(mut self, response_id: impl Into<String>) -> Self {
        self.response_id = Some(response_id.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Expired, message)
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::External, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::internal(format!("JSON: {e}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::internal(format!("IO: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
