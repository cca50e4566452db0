//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use trellis_core::{ExecutionMode, MiddlewareMode};
use trellis_telemetry::{LogConfig, LogFormat};

use crate::ConfigError;

/// Complete Trellis application configuration.
///
/// ```
/// use trellis_config::TrellisConfig;
///
/// let config = TrellisConfig::default();
/// assert!(config.app.independent_middleware);
/// assert!(!config.app.cors_enable);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TrellisConfig {
    /// Pipeline settings.
    #[serde(default)]
    pub app: AppSection,

    /// Background job settings.
    #[serde(default)]
    pub tasks: TasksSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LogConfig,
}

/// Pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AppSection {
    /// Run response hooks independently of request hooks.
    pub independent_middleware: bool,

    /// Whether hooks run on an event loop or as plain calls.
    pub execution: ExecutionMode,

    /// Register the built-in CORS component.
    pub cors_enable: bool,

    /// Origins accepted by the built-in CORS component. `"*"` allows any.
    pub cors_allow_origins: Vec<String>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            independent_middleware: true,
            execution: ExecutionMode::Async,
            cors_enable: false,
            cors_allow_origins: vec!["*".to_string()],
        }
    }
}

impl AppSection {
    /// Returns the configured middleware mode.
    pub fn middleware_mode(&self) -> MiddlewareMode {
        MiddlewareMode::from_independent(self.independent_middleware)
    }
}

/// Background job settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TasksSection {
    /// Per-job time limit in milliseconds. Unset means unbounded.
    pub job_timeout_ms: Option<u64>,

    /// How long shutdown waits for in-flight jobs.
    pub drain_timeout_secs: u64,

    /// Keep a record per job.
    pub track_history: bool,

    /// Upper bound on kept job records. Finished records are evicted when
    /// it is reached.
    pub max_history: usize,
}

impl Default for TasksSection {
    fn default() -> Self {
        Self {
            job_timeout_ms: None,
            drain_timeout_secs: 30,
            track_history: true,
            max_history: 10_000,
        }
    }
}

impl TasksSection {
    /// Returns the per-job time limit.
    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_ms.map(Duration::from_millis)
    }

    /// Returns the shutdown drain timeout.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl TrellisConfig {
    /// Local development preset: pretty debug logs.
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LogConfig::development(),
            ..Self::default()
        }
    }

    /// Production preset: JSON logs at `info`, job timeouts on.
    #[must_use]
    pub fn production() -> Self {
        Self {
            tasks: TasksSection {
                job_timeout_ms: Some(60_000),
                ..TasksSection::default()
            },
            logging: LogConfig {
                format: LogFormat::Json,
                ..LogConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app.cors_enable && self.app.cors_allow_origins.is_empty() {
            return Err(ConfigError::invalid_value(
                "app.cors_allow_origins",
                "at least one origin is required when CORS is enabled",
            ));
        }

        if self.tasks.job_timeout_ms == Some(0) {
            return Err(ConfigError::invalid_value(
                "tasks.job_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.tasks.drain_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "tasks.drain_timeout_secs",
                "must be greater than zero",
            ));
        }

        if self.tasks.track_history && self.tasks.max_history == 0 {
            return Err(ConfigError::invalid_value(
                "tasks.max_history",
                "must be greater than zero when history is tracked",
            ));
        }

        self.logging
            .validate()
            .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))
    }
}
