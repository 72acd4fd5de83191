//! Error types for the polling core

use std::time::Duration;
use thiserror::Error;

/// Failure raised by a fetch operation before any payload was produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The fetch did not complete within the scheduler-enforced limit
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The remote answered with a non-success HTTP status
    #[error("{message}")]
    Http { status: u16, message: String },
    /// Network-level failure (refused, reset, DNS)
    #[error("connection failed: {0}")]
    Transport(String),
    /// The response could not be decoded
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        FetchError::Http {
            status,
            message: message.into(),
        }
    }
}

/// Failure reading widgets from the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read widget store: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid widget data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Backend(String),
}

/// Why a configuration could not be tested
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectionTestError {
    #[error("unknown integration type: {0}")]
    UnknownType(String),
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("invalid configuration: {0}")]
    Rejected(String),
    /// The service answered but reported failure
    #[error("{0}")]
    Remote(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// The scheduler is no longer accepting commands
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("poll scheduler has been shut down")]
    Stopped,
}
