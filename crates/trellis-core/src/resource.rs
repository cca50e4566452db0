//! Resources and responders.

use std::fmt;
use std::sync::Arc;

use http::Method;

use crate::callable::{BoxFuture, Callable};
use crate::error::HookResult;
use crate::request::Request;
use crate::response::Response;
use trellis_router::Params;

/// Signature of a blocking responder.
pub type ResponderFn = dyn Fn(&mut Request, &mut Response, &Params) -> HookResult + Send + Sync;

/// Signature of an awaitable responder.
pub type AsyncResponderFn = dyn for<'a> Fn(&'a mut Request, &'a mut Response, &'a Params) -> BoxFuture<'a, HookResult>
    + Send
    + Sync;

/// The function a resource runs for one HTTP method.
pub type Responder = Callable<ResponderFn, AsyncResponderFn>;

impl Responder {
    /// Wraps a blocking responder.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response, &Params) -> HookResult + Send + Sync + 'static,
    {
        Self::Blocking(Arc::new(f))
    }

    /// Wraps an awaitable responder.
    ///
    /// ```rust
    /// use trellis_core::{Responder, HookResult};
    ///
    /// let responder = Responder::awaitable(|_req, resp, _params| {
    ///     Box::pin(async move {
    ///         resp.set_text("hello");
    ///         HookResult::Ok(())
    ///     })
    /// });
    /// assert!(responder.is_awaitable());
    /// ```
    pub fn awaitable<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Request, &'a mut Response, &'a Params) -> BoxFuture<'a, HookResult>
            + Send
            + Sync
            + 'static,
    {
        Self::Awaitable(Arc::new(f))
    }

    /// Invokes the responder.
    pub async fn call(
        &self,
        req: &mut Request,
        resp: &mut Response,
        params: &Params,
    ) -> HookResult {
        match self {
            Self::Blocking(f) => f(req, resp, params),
            Self::Awaitable(f) => f(req, resp, params).await,
        }
    }
}

/// A routable target: a name and one responder per HTTP method.
///
/// Middleware receives the resource in its resource and response hooks
/// and may inspect it (for example to read its name or allowed methods).
#[derive(Clone)]
pub struct Resource {
    name: String,
    responders: Vec<(Method, Responder)>,
}

impl Resource {
    /// Creates a resource with no responders.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responders: Vec::new(),
        }
    }

    /// Sets the responder for `method`, replacing an existing one.
    #[must_use]
    pub fn on(mut self, method: Method, responder: Responder) -> Self {
        match self.responders.iter_mut().find(|(m, _)| *m == method) {
            Some((_, existing)) => *existing = responder,
            None => self.responders.push((method, responder)),
        }
        self
    }

    /// Sets a blocking `GET` responder.
    #[must_use]
    pub fn on_get<F>(self, f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response, &Params) -> HookResult + Send + Sync + 'static,
    {
        self.on(Method::GET, Responder::blocking(f))
    }

    /// Sets a blocking `POST` responder.
    #[must_use]
    pub fn on_post<F>(self, f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response, &Params) -> HookResult + Send + Sync + 'static,
    {
        self.on(Method::POST, Responder::blocking(f))
    }

    /// Sets a blocking `PUT` responder.
    #[must_use]
    pub fn on_put<F>(self, f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response, &Params) -> HookResult + Send + Sync + 'static,
    {
        self.on(Method::PUT, Responder::blocking(f))
    }

    /// Sets a blocking `DELETE` responder.
    #[must_use]
    pub fn on_delete<F>(self, f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response, &Params) -> HookResult + Send + Sync + 'static,
    {
        self.on(Method::DELETE, Responder::blocking(f))
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the responder for `method`, if any.
    #[must_use]
    pub fn responder(&self, method: &Method) -> Option<&Responder> {
        self.responders
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, r)| r)
    }

    /// Returns the methods with a responder, in registration order.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.responders.iter().map(|(m, _)| m.clone()).collect()
    }

    /// Returns every `(method, responder)` pair.
    pub fn responders(&self) -> impl Iterator<Item = (&Method, &Responder)> {
        self.responders.iter().map(|(m, r)| (m, r))
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("methods", &self.allowed_methods())
            .finish()
    }
}
