//! Error types for the search client.
//!
//! Every backend maps its native failures onto [`ClientError`]. Callers branch
//! on [`ClientError::kind`] (or the `is_*` helpers) and never on message text;
//! backend diagnostic text is kept in the message for logging only.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

use crate::core::BackendKind;

/// The taxonomy every adapter maps its native errors onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A document was not found.
    NotFound,
    /// The target index does not exist.
    IndexNotFound,
    /// The query was rejected by the engine as malformed.
    InvalidQuery,
    /// The engine could not be reached (after retries).
    ConnectionError,
    /// The call exceeded its deadline or the engine timed out.
    Timeout,
    /// A version or uniqueness conflict.
    Conflict,
    /// The request was rejected as malformed.
    BadRequest,
    /// Authentication is missing or invalid.
    Unauthorized,
    /// Authenticated, but not allowed.
    Forbidden,
    /// Anything without a specific mapping.
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::IndexNotFound => "index-not-found",
            ErrorKind::InvalidQuery => "invalid-query",
            ErrorKind::ConnectionError => "connection-error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Conflict => "conflict",
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// The primary error type for all client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("document not found: {index}/{id}")]
    NotFound { index: String, id: String },

    #[error("index not found: {index}")]
    IndexNotFound { index: String },

    #[error("invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("connection to {backend} failed: {message}")]
    Connection { backend: BackendKind, message: String },

    #[error("request timed out: {message}")]
    Timeout { message: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// Engine error with no specific mapping.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// An engine task failed, was canceled, or was not awaited to completion.
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{feature} not supported by {backend}")]
    NotSupported {
        backend: BackendKind,
        feature: String,
    },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("invalid configuration: {message}")]
    Configuration { message: String },
}

/// An engine error that did not map onto a taxonomy kind.
#[derive(Error, Debug, Clone)]
#[error("{backend} returned status {status}: {error_type}: {reason}")]
pub struct BackendError {
    pub backend: BackendKind,
    pub status: u16,
    /// The engine's error type or code (e.g. `illegal_argument_exception`).
    pub error_type: String,
    pub reason: String,
}

/// Terminal failures of an asynchronous engine task.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// `kind` is the taxonomy kind of the engine's error code, `Other` when unknown.
    #[error("task {task_uid} failed: {message}")]
    Failed {
        task_uid: u64,
        code: Option<String>,
        kind: ErrorKind,
        message: String,
    },

    #[error("task {task_uid} was canceled")]
    Canceled { task_uid: u64 },

    #[error("task {task_uid} did not finish within {timeout_ms}ms")]
    TimedOut { task_uid: u64, timeout_ms: u64 },
}

impl ClientError {
    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::NotFound { .. } => ErrorKind::NotFound,
            ClientError::IndexNotFound { .. } => ErrorKind::IndexNotFound,
            ClientError::InvalidQuery { .. } => ErrorKind::InvalidQuery,
            ClientError::Connection { .. } => ErrorKind::ConnectionError,
            ClientError::Timeout { .. } => ErrorKind::Timeout,
            ClientError::Conflict { .. } => ErrorKind::Conflict,
            ClientError::BadRequest { .. } => ErrorKind::BadRequest,
            ClientError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ClientError::Forbidden { .. } => ErrorKind::Forbidden,
            ClientError::Task(TaskError::TimedOut { .. }) => ErrorKind::Timeout,
            ClientError::Task(TaskError::Failed { kind, .. }) => *kind,
            ClientError::Backend(_)
            | ClientError::Task(_)
            | ClientError::Cancelled
            | ClientError::NotSupported { .. }
            | ClientError::Serialization { .. }
            | ClientError::Configuration { .. } => ErrorKind::Other,
        }
    }

    /// True for a missing document or a missing index.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::IndexNotFound)
    }

    /// True when the caller may reasonably retry the same call later.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Connection { .. } | ClientError::Timeout { .. } => true,
            ClientError::Backend(err) => matches!(err.status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }

    pub(crate) fn serialization(message: impl Into<String>) -> Self {
        ClientError::Serialization {
            message: message.into(),
        }
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization {
            message: err.to_string(),
        }
    }
}
