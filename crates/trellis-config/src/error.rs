//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;

/// An error raised while loading or validating a [`TrellisConfig`].
///
/// [`TrellisConfig`]: crate::TrellisConfig
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("config file {path} does not exist")]
    NotFound {
        /// The path that was looked up.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("could not read config file {path}")]
    Read {
        /// The file.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The file extension or format name is neither `toml` nor `json`.
    #[error("unsupported config format '{0}', expected 'toml' or 'json'")]
    UnsupportedFormat(String),

    /// Malformed TOML, or TOML that does not fit the schema.
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON, or JSON that does not fit the schema.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// A field holds a value the app cannot run with.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted field path, e.g. `tasks.drain_timeout_secs`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An override variable could not be parsed.
    #[error("environment override {var}: {reason}")]
    Env {
        /// The variable name.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// A `.env` file exists but is malformed.
    #[error("could not load .env file: {0}")]
    Dotenv(String),
}

impl ConfigError {
    pub(crate) fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates an [`InvalidValue`](Self::InvalidValue) error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Env {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Returns the offending field or variable, when the error names one.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidValue { field, .. } => Some(field),
            Self::Env { var, .. } => Some(var),
            _ => None,
        }
    }
}
