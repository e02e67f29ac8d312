use std::time::Duration;

use thiserror::Error;

/// Error type for controller operations and the rollout pipeline
#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Unexpected response shape: {0}")]
    DataShape(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} id {id} no longer exists on the controller")]
    StaleReference { kind: &'static str, id: String },

    #[error("Deployment to {device} rejected: {reason}")]
    Submit { device: String, reason: String },

    #[error("Gave up on {id} after {attempts} polls ({waited:?})")]
    PollTimeout {
        id: String,
        attempts: u32,
        waited: Duration,
    },

    #[error("Commit of template {template_id} failed: {reason}")]
    Commit { template_id: String, reason: String },

    #[error("Task {task_id} failed: {reason}")]
    Task { task_id: String, reason: String },

    #[error("Controller API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn stale(kind: &'static str, id: impl Into<String>) -> Self {
        Self::StaleReference {
            kind,
            id: id.into(),
        }
    }

    pub fn data_shape(msg: impl Into<String>) -> Self {
        Self::DataShape(msg.into())
    }

    /// Errors that end a whole run rather than a single device
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::Config(_))
    }

    /// Errors worth another poll attempt
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
