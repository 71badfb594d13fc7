//! Error types you might see while resolving, pulling, or removing images

use http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Errors from the image manager and its local reference store
#[derive(Error, Debug)]
pub enum ImageError {
    /// invalid image reference format
    #[error("invalid image reference format: {0:?}")]
    InvalidReferenceFormat(String),

    /// invalid parameter
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// short image ID matches more than one image
    #[error("short image ID {0:?} matches more than one image")]
    AmbiguousReference(String),

    /// image or reference not found in the local store
    #[error("not found: {0}")]
    NotFound(String),

    /// image or reference not found by the remote content store
    #[error("not found in content store: {0}")]
    RemoteNotFound(String),

    /// operation conflicts with the references an image already has
    #[error("conflict: {0}")]
    Conflict(String),

    /// content store metadata is internally inconsistent
    #[error("image integrity error: {0}")]
    Integrity(String),

    /// storage io error
    #[error("storage io error: {0}")]
    Storage(#[from] std::io::Error),

    /// json error
    #[error("json error: {0}")]
    JSON(#[from] serde_json::Error),

    /// asynchronous task failed
    #[error("asynchronous task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// progress stream writer terminated unexpectedly
    #[error("progress stream writer terminated unexpectedly")]
    PullTaskError,

    /// network request error
    #[error("network request error: {0}")]
    NetworkRequest(#[from] reqwest::Error),

    /// invalid registry url
    #[error("invalid registry url: {0}")]
    Url(#[from] url::ParseError),

    /// registry responded with an unexpected status
    #[error("unexpected status code {0}")]
    UnexpectedStatus(u16),

    /// the operation was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,

    /// loading images at startup did not finish in time
    #[error("loading images from the content store took longer than {0:?}")]
    BootstrapTimeout(Duration),
}

impl ImageError {
    /// Is this a "not found" error, either local or from the content store?
    pub fn is_not_found(&self) -> bool {
        matches!(self, ImageError::NotFound(_) | ImageError::RemoteNotFound(_))
    }

    /// Is this a conflict which the caller may override with `force`?
    pub fn is_conflict(&self) -> bool {
        matches!(self, ImageError::Conflict(_))
    }

    /// Did the caller pass something we can't accept?
    pub fn is_invalid_param(&self) -> bool {
        matches!(
            self,
            ImageError::InvalidParam(_)
                | ImageError::InvalidReferenceFormat(_)
                | ImageError::AmbiguousReference(_)
        )
    }

    /// The HTTP status an API layer should report for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ImageError::InvalidReferenceFormat(_)
            | ImageError::InvalidParam(_)
            | ImageError::AmbiguousReference(_) => StatusCode::BAD_REQUEST,
            ImageError::NotFound(_) | ImageError::RemoteNotFound(_) => StatusCode::NOT_FOUND,
            ImageError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
