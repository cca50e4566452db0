//! Pipeline mode flags, fixed when an application is built.

use serde::{Deserialize, Serialize};

/// How the application invokes its callables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Every hook and responder must be blocking.
    Blocking,
    /// Hooks may be blocking or awaitable; awaitable slots are preferred.
    #[default]
    Async,
}

impl ExecutionMode {
    /// Returns the lowercase name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Async => "async",
        }
    }
}

/// How request/resource hooks relate to response hooks when a failure
/// interrupts the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiddlewareMode {
    /// Response hooks always run, in reverse registration order.
    #[default]
    Independent,
    /// Response hooks only unwind for the layers that were entered.
    Nested,
}

impl MiddlewareMode {
    /// Maps the `independent_middleware` flag to a mode.
    #[must_use]
    pub const fn from_independent(independent: bool) -> Self {
        if independent {
            Self::Independent
        } else {
            Self::Nested
        }
    }

    /// Returns true for [`MiddlewareMode::Independent`].
    #[must_use]
    pub const fn is_independent(self) -> bool {
        matches!(self, Self::Independent)
    }
}
