use thiserror::Error;

use crate::domain::id::EntityId;
use crate::resilience::CallFailure;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Error reported by the remote backend.
///
/// This is the `error` half of a `{data, error}` remote call. The message is
/// the raw backend text; classification and friendly phrasing happen in
/// [`crate::resilience::classify`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteError {
    message: String,
    code: Option<String>,
}

impl RemoteError {
    /// Create a remote error from raw backend text.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Attach a backend error code (e.g. a SQLSTATE like `23505`).
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Transport-level failure before the backend answered.
    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(format!("network error: {}", detail.into()))
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Call(#[from] CallFailure),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: EntityId },

    #[error("user not authenticated")]
    Unauthenticated,

    #[error("store has been torn down")]
    Inactive,

    #[error("telemetry sink error: {0}")]
    Telemetry(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The call failure behind this error, if it came from the resilient wrapper.
    #[must_use]
    pub fn call_failure(&self) -> Option<&CallFailure> {
        match self {
            Self::Call(failure) => Some(failure),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
