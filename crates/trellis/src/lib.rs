//! # Trellis
//!
//! **A middleware pipeline framework with request, resource, and response
//! hooks.**
//!
//! Every request flows through the registered middleware in three phases,
//! with the resource's responder in the middle:
//!
//! ```text
//! process_request (A, B, C) → routing → process_resource (A, B, C) → responder
//!                                                                        ↓
//!                         process_response (C, B, A) ←───────────────────┘
//! ```
//!
//! - A hook may mark the response complete to skip straight to the response
//!   phase
//! - Errors are routed to an error handler registry; unhandled errors unwind
//!   the response phase according to the middleware mode
//! - Hooks, responders, and error handlers are either blocking or awaitable,
//!   and the form is checked when they are registered
//! - Responders may schedule background jobs that run after the response
//!
//! ## Quick Start
//!
//! ```rust
//! use trellis::prelude::*;
//!
//! # async fn run() -> Result<(), AppError> {
//! let timing = Component::new("timing")
//!     .process_request(RequestHook::blocking(|_req, _resp| Ok(())))
//!     .process_response(ResponseHook::blocking(|_req, resp, _resource, ok| {
//!         if ok {
//!             resp.set_header(
//!                 http::HeaderName::from_static("x-timing"),
//!                 http::HeaderValue::from_static("1"),
//!             );
//!         }
//!         Ok(())
//!     }));
//!
//! let mut app = App::builder()
//!     .independent_middleware(false)
//!     .middleware(timing)
//!     .build()?;
//!
//! app.add_route(
//!     "/items/{id}",
//!     Resource::new("items").on_get(|_req, resp, params| {
//!         resp.set_text(format!("item {}", params.get("id").unwrap_or_default()));
//!         Ok(())
//!     }),
//! )?;
//!
//! let resp = app.respond(Request::get("/items/7")).await;
//! assert_eq!(resp.text(), "item 7");
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! | Module | Crate |
//! |--------|-------|
//! | [`core`] | Request, response, errors, callables, resources |
//! | [`router`] | Path templates and routed parameters |
//! | [`middleware`] | Components, the pipeline executor, error handlers, CORS |
//! | [`tasks`] | Background job runner |
//! | [`config`] | Layered configuration |
//! | [`telemetry`] | Logging and metrics |
//! | [`server`] | The `App` facade and lifecycle hooks |

#![doc(html_root_url = "https://docs.rs/trellis/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use trellis_core as core;

// Re-export router types
pub use trellis_router as router;

// Re-export middleware types
pub use trellis_middleware as middleware;

// Re-export background job types
pub use trellis_tasks as tasks;

// Re-export configuration types
pub use trellis_config as config;

// Re-export telemetry types
pub use trellis_telemetry as telemetry;

// Re-export server types
pub use trellis_server as server;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use trellis::prelude::*;
///
/// let app = App::new();
/// assert_eq!(app.middleware_mode(), MiddlewareMode::Independent);
/// ```
pub mod prelude {
    pub use trellis_core::{
        BoxError, BoxFuture, CallableForm, ErrorHandler, ExecutionMode, HookError, HookResult,
        HttpError, HttpStatus, JobKind, MiddlewareMode, Params, Request, RequestHook, Resource,
        ResourceHook, Responder, Response, ResponseHook,
    };

    pub use trellis_middleware::stages::CorsMiddleware;
    pub use trellis_middleware::{Component, ErrorHandlerRegistry, MiddlewareError, Pipeline};

    pub use trellis_server::{App, AppBuilder, AppError, Lifecycle, LifecycleError};

    pub use trellis_tasks::{BackgroundRunner, JobStatus, RunnerConfig};

    pub use trellis_config::{ConfigLoader, TrellisConfig};

    pub use trellis_telemetry::{init_logging, LogConfig, LogFormat};
}
