//! # Trellis Server
//!
//! Assembles routes, middleware, error handlers, background jobs, and
//! lifecycle hooks into an [`App`] and drives requests through it.
//!
//! There is no network listener here: a transport adapter, or the
//! in-memory test client, hands each [`Request`](trellis_core::Request)
//! to one of the entry points:
//!
//! | Entry point | Unhandled error |
//! |-------------|-----------------|
//! | [`App::handle`] | returned to the caller |
//! | [`App::respond`] | logged, becomes a `500` response |
//! | [`App::handle_blocking`] / [`App::respond_blocking`] | same, for callers without a runtime |

#![doc(html_root_url = "https://docs.rs/trellis-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod error;
mod lifecycle;

pub use app::{App, AppBuilder};
pub use error::AppError;
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleHook, LifecycleResult};
