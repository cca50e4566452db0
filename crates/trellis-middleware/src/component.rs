//! Middleware components and registration-time validation.
//!
//! A [`Component`] is a capability set: a name plus up to six hook slots.
//! Registration condenses it into a [`Layer`] holding at most one hook per
//! kind, chosen for the application's [`ExecutionMode`]. Form mismatches are
//! reported here, never at request time.

use std::fmt;

use trellis_core::{
    Callable, CallableForm, ExecutionMode, RequestHook, ResourceHook, ResponseHook,
};

use crate::error::MiddlewareError;

/// Hook slot names, used in errors and logs.
pub mod slots {
    /// `process_request`
    pub const PROCESS_REQUEST: &str = "process_request";
    /// `process_request_async`
    pub const PROCESS_REQUEST_ASYNC: &str = "process_request_async";
    /// `process_resource`
    pub const PROCESS_RESOURCE: &str = "process_resource";
    /// `process_resource_async`
    pub const PROCESS_RESOURCE_ASYNC: &str = "process_resource_async";
    /// `process_response`
    pub const PROCESS_RESPONSE: &str = "process_response";
    /// `process_response_async`
    pub const PROCESS_RESPONSE_ASYNC: &str = "process_response_async";
}

/// A middleware component.
///
/// # Example
///
/// ```rust
/// use trellis_middleware::Component;
/// use trellis_core::{RequestHook, ResponseHook};
///
/// let timing = Component::new("timing")
///     .process_request(RequestHook::blocking(|_req, _resp| Ok(())))
///     .process_response(ResponseHook::blocking(|_req, _resp, _resource, _ok| Ok(())));
///
/// assert!(timing.has_request_hook());
/// assert!(!timing.has_resource_hook());
/// ```
#[derive(Clone, Default)]
pub struct Component {
    name: String,
    cors: bool,
    request: Option<RequestHook>,
    request_async: Option<RequestHook>,
    resource: Option<ResourceHook>,
    resource_async: Option<ResourceHook>,
    response: Option<ResponseHook>,
    response_async: Option<ResponseHook>,
}

impl Component {
    /// Creates a component with no hooks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the `process_request` slot.
    #[must_use]
    pub fn process_request(mut self, hook: RequestHook) -> Self {
        self.request = Some(hook);
        self
    }

    /// Sets the `process_request_async` slot. Must hold an awaitable hook.
    #[must_use]
    pub fn process_request_async(mut self, hook: RequestHook) -> Self {
        self.request_async = Some(hook);
        self
    }

    /// Sets the `process_resource` slot.
    #[must_use]
    pub fn process_resource(mut self, hook: ResourceHook) -> Self {
        self.resource = Some(hook);
        self
    }

    /// Sets the `process_resource_async` slot. Must hold an awaitable hook.
    #[must_use]
    pub fn process_resource_async(mut self, hook: ResourceHook) -> Self {
        self.resource_async = Some(hook);
        self
    }

    /// Sets the `process_response` slot.
    #[must_use]
    pub fn process_response(mut self, hook: ResponseHook) -> Self {
        self.response = Some(hook);
        self
    }

    /// Sets the `process_response_async` slot. Must hold an awaitable hook.
    #[must_use]
    pub fn process_response_async(mut self, hook: ResponseHook) -> Self {
        self.response_async = Some(hook);
        self
    }

    pub(crate) fn mark_cors(mut self) -> Self {
        self.cors = true;
        self
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this is a CORS component.
    #[must_use]
    pub const fn is_cors(&self) -> bool {
        self.cors
    }

    /// Returns true if either request slot is set.
    #[must_use]
    pub const fn has_request_hook(&self) -> bool {
        self.request.is_some() || self.request_async.is_some()
    }

    /// Returns true if either resource slot is set.
    #[must_use]
    pub const fn has_resource_hook(&self) -> bool {
        self.resource.is_some() || self.resource_async.is_some()
    }

    /// Returns true if either response slot is set.
    #[must_use]
    pub const fn has_response_hook(&self) -> bool {
        self.response.is_some() || self.response_async.is_some()
    }

    /// Validates the slots and selects one hook per kind for `mode`.
    pub fn prepare(self, mode: ExecutionMode) -> Result<Layer, MiddlewareError> {
        if !(self.has_request_hook() || self.has_resource_hook() || self.has_response_hook()) {
            return Err(MiddlewareError::NoHooks { name: self.name });
        }

        let name = self.name;
        let request = select(
            &name,
            mode,
            self.request,
            self.request_async,
            (slots::PROCESS_REQUEST, slots::PROCESS_REQUEST_ASYNC),
        )?;
        let resource = select(
            &name,
            mode,
            self.resource,
            self.resource_async,
            (slots::PROCESS_RESOURCE, slots::PROCESS_RESOURCE_ASYNC),
        )?;
        let response = select(
            &name,
            mode,
            self.response,
            self.response_async,
            (slots::PROCESS_RESPONSE, slots::PROCESS_RESPONSE_ASYNC),
        )?;

        if request.is_none() && resource.is_none() && response.is_none() {
            return Err(MiddlewareError::compatibility(
                name,
                slots::PROCESS_REQUEST_ASYNC,
                "and the other async slots are not run by a blocking application, leaving no hooks",
            ));
        }

        Ok(Layer {
            name,
            request,
            resource,
            response,
        })
    }
}

fn select<B: ?Sized, A: ?Sized>(
    component: &str,
    mode: ExecutionMode,
    plain: Option<Callable<B, A>>,
    suffixed: Option<Callable<B, A>>,
    (plain_slot, async_slot): (&'static str, &'static str),
) -> Result<Option<Callable<B, A>>, MiddlewareError> {
    if let Some(hook) = &suffixed {
        if hook.form() != CallableForm::Awaitable {
            return Err(MiddlewareError::compatibility(
                component,
                async_slot,
                "must be awaitable but a blocking hook was given",
            ));
        }
    }

    match mode {
        ExecutionMode::Blocking => {
            if let Some(hook) = &plain {
                if hook.form() != CallableForm::Blocking {
                    return Err(MiddlewareError::compatibility(
                        component,
                        plain_slot,
                        "is awaitable but the application runs in blocking mode",
                    ));
                }
            }
            Ok(plain)
        }
        ExecutionMode::Async => Ok(suffixed.or(plain)),
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("request", &self.has_request_hook())
            .field("resource", &self.has_resource_hook())
            .field("response", &self.has_response_hook())
            .finish()
    }
}

/// A registered component: at most one hook per kind, with its form
/// already checked against the execution mode.
#[derive(Clone)]
pub struct Layer {
    name: String,
    pub(crate) request: Option<RequestHook>,
    pub(crate) resource: Option<ResourceHook>,
    pub(crate) response: Option<ResponseHook>,
}

impl Layer {
    /// Returns the component name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the layer runs a request hook.
    #[must_use]
    pub const fn has_request_hook(&self) -> bool {
        self.request.is_some()
    }

    /// Returns true if the layer runs a resource hook.
    #[must_use]
    pub const fn has_resource_hook(&self) -> bool {
        self.resource.is_some()
    }

    /// Returns true if the layer runs a response hook.
    #[must_use]
    pub const fn has_response_hook(&self) -> bool {
        self.response.is_some()
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name)
            .field("request", &self.has_request_hook())
            .field("resource", &self.has_resource_hook())
            .field("response", &self.has_response_hook())
            .finish()
    }
}
