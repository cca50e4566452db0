//! Registration errors.
//!
//! Everything here is raised while an application is being assembled;
//! none of these errors can occur while a request is being served.

use thiserror::Error;

/// Errors raised when a middleware component is registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiddlewareError {
    /// A hook has the wrong invocation form for its slot or for the
    /// application's execution mode.
    #[error("middleware '{component}': {slot} {reason}")]
    Compatibility {
        /// Component name.
        component: String,
        /// Slot name (e.g. `process_request_async`).
        slot: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The component provides none of the three hook kinds.
    #[error("middleware '{name}' provides no process_request, process_resource or process_response hook")]
    NoHooks {
        /// Component name.
        name: String,
    },

    /// A CORS component was registered while built-in CORS is enabled.
    #[error("CORS middleware '{name}' cannot be registered because built-in CORS is enabled")]
    CorsConflict {
        /// Component name.
        name: String,
    },
}

impl MiddlewareError {
    /// Creates a compatibility error.
    pub fn compatibility(
        component: impl Into<String>,
        slot: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Compatibility {
            component: component.into(),
            slot,
            reason: reason.into(),
        }
    }

    /// Returns true for [`MiddlewareError::Compatibility`].
    #[must_use]
    pub const fn is_compatibility(&self) -> bool {
        matches!(self, Self::Compatibility { .. })
    }
}
