//! Startup and shutdown hooks.
//!
//! Startup hooks run in registration order; the first failure aborts
//! startup. Shutdown hooks run in reverse order and all of them run even
//! when some fail.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use trellis_core::{BoxError, BoxFuture};

/// Error type for lifecycle hook failures.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A startup hook failed.
    #[error("Startup hook failed: {0}")]
    StartupFailed(String),

    /// One or more shutdown hooks failed.
    #[error("Shutdown hook failed: {0}")]
    ShutdownFailed(String),

    /// Error returned by a hook.
    #[error("Lifecycle hook error: {message}")]
    HookError {
        /// Error message.
        message: String,
        /// Optional source error.
        #[source]
        source: Option<BoxError>,
    },
}

impl LifecycleError {
    /// Creates a hook error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::HookError {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a hook error with a source.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::HookError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for lifecycle hooks.
pub type LifecycleResult<T = ()> = Result<T, LifecycleError>;

/// A lifecycle hook callback.
pub type LifecycleHook = Arc<dyn Fn() -> BoxFuture<'static, LifecycleResult> + Send + Sync>;

/// Startup and shutdown hooks for an application.
///
/// ```rust
/// use trellis_server::Lifecycle;
///
/// let lifecycle = Lifecycle::new()
///     .on_startup("warm-cache", || async { Ok(()) })
///     .on_shutdown("flush", || async { Ok(()) });
///
/// assert_eq!(lifecycle.startup_hook_count(), 1);
/// ```
#[must_use]
#[derive(Default, Clone)]
pub struct Lifecycle {
    startup_hooks: Vec<(String, LifecycleHook)>,
    shutdown_hooks: Vec<(String, LifecycleHook)>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("startup_hooks", &self.startup_names())
            .field("shutdown_hooks", &self.shutdown_names())
            .finish()
    }
}

impl Lifecycle {
    /// Creates an empty lifecycle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a startup hook.
    pub fn on_startup<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        let hook: LifecycleHook = Arc::new(move || Box::pin(hook()));
        self.startup_hooks.push((name.into(), hook));
        self
    }

    /// Registers a shutdown hook.
    pub fn on_shutdown<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        let hook: LifecycleHook = Arc::new(move || Box::pin(hook()));
        self.shutdown_hooks.push((name.into(), hook));
        self
    }

    /// Returns the number of startup hooks.
    pub fn startup_hook_count(&self) -> usize {
        self.startup_hooks.len()
    }

    /// Returns the number of shutdown hooks.
    pub fn shutdown_hook_count(&self) -> usize {
        self.shutdown_hooks.len()
    }

    /// Startup hook names in registration order.
    pub fn startup_names(&self) -> Vec<&str> {
        self.startup_hooks.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Shutdown hook names in registration order.
    pub fn shutdown_names(&self) -> Vec<&str> {
        self.shutdown_hooks.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Runs startup hooks in registration order, stopping at the first
    /// failure.
    pub async fn run_startup(&self) -> LifecycleResult {
        for (name, hook) in &self.startup_hooks {
            tracing::debug!(hook = %name, "Running startup hook");
            if let Err(e) = hook().await {
                tracing::error!(hook = %name, error = %e, "Startup hook failed");
                return Err(LifecycleError::StartupFailed(format!(
                    "Hook '{}' failed: {}",
                    name, e
                )));
            }
        }
        Ok(())
    }

    /// Runs every shutdown hook in reverse registration order and reports
    /// all failures together.
    pub async fn run_shutdown(&self) -> LifecycleResult {
        let mut errors = Vec::new();
        for (name, hook) in self.shutdown_hooks.iter().rev() {
            tracing::debug!(hook = %name, "Running shutdown hook");
            if let Err(e) = hook().await {
                tracing::error!(hook = %name, error = %e, "Shutdown hook failed");
                errors.push(format!("{}: {}", name, e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::ShutdownFailed(errors.join("; ")))
        }
    }

    /// Appends another lifecycle's hooks.
    pub fn merge(mut self, other: Lifecycle) -> Self {
        self.startup_hooks.extend(other.startup_hooks);
        self.shutdown_hooks.extend(other.shutdown_hooks);
        self
    }
}
