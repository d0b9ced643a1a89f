//! Typed failures surfaced by the folder adapter and the thumbnail provider.

use std::time::Duration;

use thiserror::Error;

use crate::types::StatusCode;

/// Broad classification of a non-success status returned by the DAV server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    NotFound,
    Conflict,
    Forbidden,
    Server,
    Unexpected,
}

impl StatusKind {
    pub fn classify(status: StatusCode) -> Self {
        match status {
            StatusCode::NOT_FOUND => StatusKind::NotFound,
            StatusCode::CONFLICT | StatusCode::METHOD_NOT_ALLOWED => StatusKind::Conflict,
            StatusCode::FORBIDDEN => StatusKind::Forbidden,
            s if s.is_server_error() => StatusKind::Server,
            _ => StatusKind::Unexpected,
        }
    }
}

/// Errors raised by DAV folder operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DavError {
    /// The request never produced a server answer (network, DNS, dropped callback).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered, but not with the status the operation requires.
    #[error("{path}: server answered {status} ({kind:?})")]
    Status { path: String, status: StatusCode, kind: StatusKind },

    /// No completion arrived within the configured request timeout.
    #[error("{operation} {path} timed out after {after:?}")]
    Timeout { operation: &'static str, path: String, after: Duration },

    /// Opening or using a remote file stream failed.
    #[error("stream error: {0}")]
    Stream(String),
}

impl DavError {
    pub fn from_status(path: impl Into<String>, status: StatusCode) -> Self {
        DavError::Status { path: path.into(), status, kind: StatusKind::classify(status) }
    }

    /// Status classification, if the server produced an answer.
    pub fn status_kind(&self) -> Option<StatusKind> {
        match self {
            DavError::Status { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Errors raised while serving a thumbnail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailError {
    /// The network fetch for the key failed. A later request may retry it.
    #[error("fetching thumbnail {path} failed: {reason}")]
    Fetch { path: String, reason: String },

    /// The fetch did not complete in time; the key was released.
    #[error("thumbnail {path} not delivered after {after:?}")]
    Timeout { path: String, after: Duration },

    /// The cached bytes are not a decodable image.
    #[error("decoding thumbnail failed: {0}")]
    Decode(String),
}
