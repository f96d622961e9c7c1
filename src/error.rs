//! Error types shared by the request model and the API clients.

use std::time::Duration;
use thiserror::Error;

/// A request field violated its bound or format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Errors surfaced by client operations and the polling helpers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request rejected before any network call.
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// Non-success HTTP status or connection-level failure.
    #[error("{endpoint} failed: {message}")]
    Transport {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// Operation invoked before the backend endpoint was resolved.
    #[error("not ready: {0}")]
    Precondition(String),

    /// A bounded wait ran out.
    #[error("{what} did not finish within {limit:?} (waited {elapsed:?})")]
    Timeout {
        what: String,
        elapsed: Duration,
        limit: Duration,
    },

    /// Response envelope missing the fields we need.
    #[error("unexpected response payload: {0}")]
    Payload(String),

    /// Cloud provisioning API reported an error.
    #[error("provider error: {0}")]
    Provider(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn transport(endpoint: impl Into<String>, err: ureq::Error) -> Self {
        let status = match &err {
            ureq::Error::StatusCode(code) => Some(*code),
            _ => None,
        };
        let message = match status {
            Some(code) => format!("HTTP status {code}"),
            None => err.to_string(),
        };
        Self::Transport {
            endpoint: endpoint.into(),
            status,
            message,
        }
    }

    pub fn timeout(what: impl Into<String>, elapsed: Duration, limit: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            elapsed,
            limit,
        }
    }

    /// Short title used when the wizard renders the error.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Invalid Settings",
            Self::Transport { .. } => "Request Failed",
            Self::Precondition(_) => "Not Ready",
            Self::Timeout { .. } => "Timeout",
            Self::Payload(_) => "Unexpected Response",
            Self::Provider(_) => "Provider Error",
            Self::Io(_) => "File Error",
        }
    }
}
