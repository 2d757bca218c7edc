use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query rejected: {0}")]
    Validation(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] hdbconnect::HdbError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Query timeout after {0:?}")]
    QueryTimeout(Duration),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    #[must_use]
    pub const fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }

    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::QueryTimeout(_))
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Http(e) if e.is_connect() || e.is_timeout() => ErrorKind::Connection,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Backend(_)
            | Self::Serialization(_)
            | Self::Database(_)
            | Self::Http(_)
            | Self::QueryTimeout(_) => ErrorKind::Backend,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// Error category reported alongside the message in [`ErrorResponse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Connection,
    Validation,
    Backend,
    Persistence,
    NotFound,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Connection => "connection",
            Self::Validation => "validation",
            Self::Backend => "backend",
            Self::Persistence => "persistence",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure returned across the server boundary.
///
/// Serializes as `{"error": "...", "kind": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind,
        }
    }

    /// Serialized JSON form of this response
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::json!({ "error": self.error, "kind": self.kind }).to_string()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.kind)
    }
}

impl From<Error> for ErrorResponse {
    fn from(err: Error) -> Self {
        let kind = err.kind();
        let error = match err {
            Error::Config(msg)
            | Error::Connection(msg)
            | Error::Validation(msg)
            | Error::Backend(msg)
            | Error::Persistence(msg)
            | Error::NotFound(msg) => msg,
            other => other.to_string(),
        };
        Self { error, kind }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
