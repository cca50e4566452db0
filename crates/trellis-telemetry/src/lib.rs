//! Logging and metrics for Trellis.
//!
//! - **Logging**: a `tracing-subscriber` registry with an `EnvFilter` and
//!   either JSON or human-readable output
//! - **Metrics**: counters emitted through the `metrics` facade; they are
//!   no-ops until the host process installs a recorder
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `trellis_requests_total` | Counter | `status` | Responses produced |
//! | `trellis_unhandled_errors_total` | Counter | `phase` | Errors no handler accepted |
//! | `trellis_background_jobs_total` | Counter | `kind`, `outcome` | Finished background jobs |
//!
//! # Example
//!
//! ```rust
//! use trellis_telemetry::{init_logging, LogConfig};
//!
//! let config = LogConfig {
//!     enabled: false,
//!     ..LogConfig::default()
//! };
//! init_logging(&config).unwrap();
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{
    describe_metrics, record_background_job, record_request, record_unhandled_error,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
