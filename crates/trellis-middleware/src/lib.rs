//! # Trellis Middleware
//!
//! The middleware pipeline executor for the Trellis framework.
//!
//! ## Overview
//!
//! A middleware [`Component`] offers up to three hook kinds:
//!
//! - `process_request` - before routing; may rewrite the path
//! - `process_resource` - after routing; may edit routed parameters
//! - `process_response` - after the responder, in reverse order
//!
//! Each kind has a plain slot and an `_async` slot. Registration picks one
//! hook per kind for the application's execution mode and rejects forms that
//! cannot run in it, so misconfiguration surfaces while the app is built.
//!
//! The [`Pipeline`] runs the hooks around a routed resource, honours the
//! response completion flag as a short-circuit, hands errors to the
//! [`ErrorHandlerRegistry`], and unwinds response hooks after unhandled
//! errors according to the configured [`MiddlewareMode`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis_core::{Request, Resource, Response, ResponseHook};
//! use trellis_middleware::{Component, ErrorHandlerRegistry, Pipeline};
//! use trellis_router::Router;
//!
//! # tokio_test::block_on(async {
//! let pipeline = Pipeline::builder()
//!     .middleware(Component::new("stamp").process_response(ResponseHook::blocking(
//!         |_req, resp, _resource, _ok| {
//!             resp.set_header(
//!                 http::header::SERVER,
//!                 http::HeaderValue::from_static("trellis"),
//!             );
//!             Ok(())
//!         },
//!     )))
//!     .build()
//!     .unwrap();
//!
//! let mut router = Router::new();
//! router
//!     .insert("/", Arc::new(Resource::new("root").on_get(|_req, resp, _params| {
//!         resp.set_text("hi");
//!         Ok(())
//!     })))
//!     .unwrap();
//!
//! let mut req = Request::get("/");
//! let mut resp = Response::new();
//! pipeline
//!     .run(&mut req, &mut resp, &router, &ErrorHandlerRegistry::with_defaults())
//!     .await
//!     .unwrap();
//!
//! assert_eq!(resp.text(), "hi");
//! assert_eq!(resp.header("server"), Some("trellis"));
//! # });
//! ```
//!
//! [`MiddlewareMode`]: trellis_core::MiddlewareMode

#![doc(html_root_url = "https://docs.rs/trellis-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod component;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod stages;

pub use component::{slots, Component, Layer};
pub use dispatch::{Dispatcher, Route};
pub use error::MiddlewareError;
pub use pipeline::{Phase, Pipeline, PipelineBuilder};
pub use registry::{apply_status, compose_http_error, internal_error_response, ErrorHandlerRegistry};
