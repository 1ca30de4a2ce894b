//! Error types for the Concierge core.

use thiserror::Error;

use crate::types::Appointment;

/// Errors raised by the record-store adapter (primary document tree or flat files).
#[derive(Error, Debug)]
pub enum StoreError {
    /// The primary store is not configured or not reachable. Callers degrade, never crash.
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("record store request failed: {0}")]
    Http(String),

    #[error("record store request timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed record: {0}")]
    Malformed(String),
}

impl StoreError {
    /// Maps a reqwest failure, keeping timeouts as their own kind.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(err.to_string())
        } else if err.is_connect() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Http(err.to_string())
        }
    }
}

/// Errors raised by the appointment scheduler.
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// Missing or malformed required field. The only kind that maps to a 4xx response.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The requested slot collides with a non-cancelled appointment at the same instant.
    #[error("time slot already booked by {}", existing.id)]
    Conflict { existing: Appointment },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from external collaborators (generative API, telephony, spreadsheet).
/// These never reach the end user as hard failures; callers degrade to a canned
/// response or a warning log.
#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("external call timed out: {0}")]
    Timeout(String),

    #[error("external service error: {0}")]
    Service(String),
}

impl ExternalError {
    /// Maps a reqwest failure, keeping timeouts as their own kind.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExternalError::Timeout(err.to_string())
        } else {
            ExternalError::Service(err.to_string())
        }
    }
}
