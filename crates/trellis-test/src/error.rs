//! Test error types.

use thiserror::Error;
use trellis_core::HookError;
use trellis_server::AppError;

/// Errors that can occur while driving an app from a test.
#[derive(Debug, Error)]
pub enum TestError {
    /// Request building failed.
    #[error("Request build error: {0}")]
    RequestBuild(String),

    /// Header name or value is invalid.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Response body is not what was asked for.
    #[error("Body read error: {0}")]
    BodyRead(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The app returned an error no handler accepted.
    #[error("Unhandled error: {0}")]
    Unhandled(#[from] HookError),

    /// The app could not process the request at all.
    #[error("App error: {0}")]
    App(#[from] AppError),
}

impl TestError {
    /// Returns the unhandled hook error, wherever it was reported.
    pub fn as_unhandled(&self) -> Option<&HookError> {
        match self {
            Self::Unhandled(error) => Some(error),
            Self::App(error) => error.as_unhandled(),
            _ => None,
        }
    }
}
