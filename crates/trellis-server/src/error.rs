//! Application assembly errors.

use thiserror::Error;
use trellis_config::ConfigError;
use trellis_core::HookError;
use trellis_middleware::MiddlewareError;
use trellis_router::RouteError;
use trellis_tasks::JobError;

use crate::lifecycle::LifecycleError;

/// Errors raised while building, starting, driving, or stopping an
/// [`App`](crate::App).
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid middleware, responder, or error handler registration.
    #[error(transparent)]
    Middleware(#[from] MiddlewareError),

    /// Invalid or conflicting route.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A startup or shutdown hook failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Background jobs could not be drained.
    #[error(transparent)]
    Jobs(#[from] JobError),

    /// An error no handler accepted.
    #[error("unhandled error: {0}")]
    Unhandled(#[from] HookError),

    /// The runtime for blocking entry points could not be created.
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// A blocking entry point was called from inside an async runtime.
    #[error("blocking entry point called from within an async runtime")]
    BlockingInAsync,
}

impl AppError {
    /// Returns the unhandled hook error, if that is what this is.
    pub fn as_unhandled(&self) -> Option<&HookError> {
        match self {
            Self::Unhandled(error) => Some(error),
            _ => None,
        }
    }

    /// Returns true for registration-time compatibility errors.
    pub fn is_compatibility(&self) -> bool {
        matches!(self, Self::Middleware(error) if error.is_compatibility())
    }
}
