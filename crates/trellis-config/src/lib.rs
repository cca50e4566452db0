//! # Trellis Config
//!
//! Typed, layered configuration for Trellis applications.
//!
//! | Section | Controls |
//! |---------|----------|
//! | `app` | middleware mode, execution mode, built-in CORS |
//! | `tasks` | background job timeout, shutdown drain, history |
//! | `logging` | filter level and output format |
//!
//! ```
//! use trellis_config::{ConfigLoader, TrellisConfig};
//!
//! let config = ConfigLoader::new()
//!     .with_string(r#"{"tasks": {"drain_timeout_secs": 5}}"#, "json")
//!     .unwrap()
//!     .load()
//!     .unwrap();
//!
//! assert_eq!(config.tasks.drain_timeout_secs, 5);
//! assert_eq!(config.app, TrellisConfig::default().app);
//! ```
//!
//! Environment variables override file values using
//! `PREFIX__SECTION__KEY`, e.g. `TRELLIS__APP__CORS_ENABLE=true`.

mod config;
mod error;
mod loader;

pub use config::{AppSection, TasksSection, TrellisConfig};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use trellis_telemetry::{LogConfig, LogFormat};
