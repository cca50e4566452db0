//! Middleware hook and error handler callables.
//!
//! Each hook kind has a blocking signature and an awaitable signature; the
//! [`Callable`] wrapper records which one a value holds.

use std::sync::Arc;

use crate::callable::{BoxFuture, Callable};
use crate::error::{HookError, HookResult};
use crate::request::Request;
use crate::resource::Resource;
use crate::response::Response;
use trellis_router::Params;

/// Blocking `process_request` signature.
pub type RequestHookFn = dyn Fn(&mut Request, &mut Response) -> HookResult + Send + Sync;

/// Awaitable `process_request` signature.
pub type AsyncRequestHookFn =
    dyn for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HookResult> + Send + Sync;

/// Runs before routing, in registration order.
pub type RequestHook = Callable<RequestHookFn, AsyncRequestHookFn>;

/// Blocking `process_resource` signature.
pub type ResourceHookFn =
    dyn Fn(&mut Request, &mut Response, &Resource, &mut Params) -> HookResult + Send + Sync;

/// Awaitable `process_resource` signature.
pub type AsyncResourceHookFn = dyn for<'a> Fn(
        &'a mut Request,
        &'a mut Response,
        &'a Resource,
        &'a mut Params,
    ) -> BoxFuture<'a, HookResult>
    + Send
    + Sync;

/// Runs after routing, in registration order. May edit the routed params.
pub type ResourceHook = Callable<ResourceHookFn, AsyncResourceHookFn>;

/// Blocking `process_response` signature.
pub type ResponseHookFn =
    dyn Fn(&mut Request, &mut Response, Option<&Resource>, bool) -> HookResult + Send + Sync;

/// Awaitable `process_response` signature.
pub type AsyncResponseHookFn = dyn for<'a> Fn(
        &'a mut Request,
        &'a mut Response,
        Option<&'a Resource>,
        bool,
    ) -> BoxFuture<'a, HookResult>
    + Send
    + Sync;

/// Runs after the responder, in reverse registration order. Receives the
/// matched resource (if routing succeeded) and whether the request has
/// succeeded so far.
pub type ResponseHook = Callable<ResponseHookFn, AsyncResponseHookFn>;

/// Blocking error handler signature.
pub type ErrorHandlerFn =
    dyn Fn(&mut Request, &mut Response, &HookError, &Params) -> HookResult + Send + Sync;

/// Awaitable error handler signature.
pub type AsyncErrorHandlerFn = dyn for<'a> Fn(
        &'a mut Request,
        &'a mut Response,
        &'a HookError,
        &'a Params,
    ) -> BoxFuture<'a, HookResult>
    + Send
    + Sync;

/// Turns an error into a response. Returning `Err(HookError::Status(..))`
/// applies that status; any other error is treated as unhandled.
pub type ErrorHandler = Callable<ErrorHandlerFn, AsyncErrorHandlerFn>;

impl RequestHook {
    /// Wraps a blocking hook.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) -> HookResult + Send + Sync + 'static,
    {
        Self::Blocking(Arc::new(f))
    }

    /// Wraps an awaitable hook.
    pub fn awaitable<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response) -> BoxFuture<'a, HookResult>
            + Send
            + Sync
            + 'static,
    {
        Self::Awaitable(Arc::new(f))
    }

    /// Invokes the hook.
    pub async fn call(&self, req: &mut Request, resp: &mut Response) -> HookResult {
        match self {
            Self::Blocking(f) => f(req, resp),
            Self::Awaitable(f) => f(req, resp).await,
        }
    }
}

impl ResourceHook {
    /// Wraps a blocking hook.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response, &Resource, &mut Params) -> HookResult
            + Send
            + Sync
            + 'static,
    {
        Self::Blocking(Arc::new(f))
    }

    /// Wraps an awaitable hook.
    pub fn awaitable<F>(f: F) -> Self
    where
        F: for<'a> Fn(
                &'a mut Request,
                &'a mut Response,
                &'a Resource,
                &'a mut Params,
            ) -> BoxFuture<'a, HookResult>
            + Send
            + Sync
            + 'static,
    {
        Self::Awaitable(Arc::new(f))
    }

    /// Invokes the hook.
    pub async fn call(
        &self,
        req: &mut Request,
        resp: &mut Response,
        resource: &Resource,
        params: &mut Params,
    ) -> HookResult {
        match self {
            Self::Blocking(f) => f(req, resp, resource, params),
            Self::Awaitable(f) => f(req, resp, resource, params).await,
        }
    }
}

impl ResponseHook {
    /// Wraps a blocking hook.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response, Option<&Resource>, bool) -> HookResult
            + Send
            + Sync
            + 'static,
    {
        Self::Blocking(Arc::new(f))
    }

    /// Wraps an awaitable hook.
    pub fn awaitable<F>(f: F) -> Self
    where
        F: for<'a> Fn(
                &'a mut Request,
                &'a mut Response,
                Option<&'a Resource>,
                bool,
            ) -> BoxFuture<'a, HookResult>
            + Send
            + Sync
            + 'static,
    {
        Self::Awaitable(Arc::new(f))
    }

    /// Invokes the hook.
    pub async fn call(
        &self,
        req: &mut Request,
        resp: &mut Response,
        resource: Option<&Resource>,
        req_succeeded: bool,
    ) -> HookResult {
        match self {
            Self::Blocking(f) => f(req, resp, resource, req_succeeded),
            Self::Awaitable(f) => f(req, resp, resource, req_succeeded).await,
        }
    }
}

impl ErrorHandler {
    /// Wraps a blocking handler.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response, &HookError, &Params) -> HookResult
            + Send
            + Sync
            + 'static,
    {
        Self::Blocking(Arc::new(f))
    }

    /// Wraps an awaitable handler.
    pub fn awaitable<F>(f: F) -> Self
    where
        F: for<'a> Fn(
                &'a mut Request,
                &'a mut Response,
                &'a HookError,
                &'a Params,
            ) -> BoxFuture<'a, HookResult>
            + Send
            + Sync
            + 'static,
    {
        Self::Awaitable(Arc::new(f))
    }

    /// Invokes the handler.
    pub async fn call(
        &self,
        req: &mut Request,
        resp: &mut Response,
        error: &HookError,
        params: &Params,
    ) -> HookResult {
        match self {
            Self::Blocking(f) => f(req, resp, error, params),
            Self::Awaitable(f) => f(req, resp, error, params).await,
        }
    }
}
