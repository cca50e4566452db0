//! # Trellis Core
//!
//! Core types shared by every Trellis crate:
//!
//! - [`Request`] / [`Response`] - The mutable per-request context threaded
//!   through every hook and responder
//! - [`HookError`] - The error kinds a hook, responder, or error handler can
//!   return, including the [`HttpStatus`] "final status" signal
//! - [`Callable`] - A blocking or awaitable callback, the unit every hook and
//!   responder is built from
//! - [`Resource`] - A named set of responders keyed by HTTP method
//! - [`RequestHook`] / [`ResourceHook`] / [`ResponseHook`] - The three
//!   middleware hook kinds, plus [`ErrorHandler`]
//! - [`Job`] / [`JobQueue`] - Background work scheduled on a response
//! - [`ExecutionMode`] / [`MiddlewareMode`] - Build-time pipeline flags

#![doc(html_root_url = "https://docs.rs/trellis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod callable;
mod error;
mod hook;
mod jobs;
mod mode;
mod request;
mod resource;
mod response;

pub use callable::{BoxFuture, Callable, CallableForm};
pub use error::{BoxError, HookError, HookResult, HttpError, HttpStatus};
pub use hook::{
    AsyncErrorHandlerFn, AsyncRequestHookFn, AsyncResourceHookFn, AsyncResponseHookFn,
    ErrorHandler, ErrorHandlerFn, RequestHook, RequestHookFn, ResourceHook, ResourceHookFn,
    ResponseHook, ResponseHookFn,
};
pub use jobs::{Job, JobFuture, JobKind, JobQueue};
pub use mode::{ExecutionMode, MiddlewareMode};
pub use request::Request;
pub use resource::{AsyncResponderFn, Resource, Responder, ResponderFn};
pub use response::Response;

/// Routed parameters, re-exported from the router.
pub use trellis_router::Params;
