//! Error types for the guardrail pipeline

use guardrail_core::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that cross the pipeline's public boundary
///
/// Validator-level problems never show up here; they resolve into
/// verdicts inside the returned decision.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The caller handed over a request that breaks the request contract
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The pipeline configuration is inconsistent
    #[error("Pipeline configuration error: {0}")]
    Config(String),

    /// A chain references a validator id nobody registered
    #[error("Unknown validator: {0}")]
    UnknownValidator(String),

    /// Error from guardrail-core
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PipelineError {
    /// Create an invalid request error
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

/// Class of an infrastructure fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The call did not answer in time
    Timeout,
    /// The transport to the model/service failed
    Connection,
    /// The service answered but reported itself unavailable
    Unavailable,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// Errors a validator may raise from `check`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidatorError {
    /// Infrastructure flakiness; eligible for retry
    #[error("{kind} fault: {message}")]
    Transient {
        /// Fault class, matched against the retry policy
        kind: FaultKind,
        /// What went wrong
        message: String,
    },

    /// The validator broke its own contract
    #[error("validator bug: {0}")]
    Bug(String),

    /// The validator cannot judge this input at all
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ValidatorError {
    /// Create a transient fault
    pub fn transient<S: Into<String>>(kind: FaultKind, msg: S) -> Self {
        Self::Transient {
            kind,
            message: msg.into(),
        }
    }

    /// Create a timeout fault
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::transient(FaultKind::Timeout, msg)
    }

    /// Create a connection fault
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::transient(FaultKind::Connection, msg)
    }

    /// Create a bug error
    pub fn bug<S: Into<String>>(msg: S) -> Self {
        Self::Bug(msg.into())
    }

    /// Fault class if this error is transient
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::Transient { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Check if this error is infrastructure flakiness rather than a logic bug
    pub fn is_transient(&self) -> bool {
        self.fault_kind().is_some()
    }
}
