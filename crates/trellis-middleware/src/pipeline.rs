//! The middleware pipeline executor.
//!
//! ## Phases
//!
//! 1. **Request** - `process_request` on every layer, registration order
//! 2. **Routing** - the [`Dispatcher`] picks a resource (404 when none)
//! 3. **Resource** - `process_resource` on every layer, registration order
//! 4. **Responder** - the resource's responder for the request method
//! 5. **Response** - `process_response` on every layer, reverse order
//!
//! Setting [`Response::set_complete`] in phase 1 or 3 skips straight to
//! phase 5. Errors from phases 1-4 go to the [`ErrorHandlerRegistry`]; a
//! handled error also skips to phase 5 with `req_succeeded = false`.
//!
//! ## Unwinding after an unhandled error
//!
//! | Failing phase | Independent | Nested |
//! |---|---|---|
//! | request (layer *i*) | all response hooks | none |
//! | routing | all | none |
//! | resource (layer *i*) | all | layers before *i* |
//! | responder | all | all |
//!
//! The error is returned once those response hooks have run.

use std::sync::Arc;

use trellis_core::{
    ExecutionMode, HookError, HttpError, MiddlewareMode, Params, Request, Resource, Response,
};

use crate::component::{Component, Layer};
use crate::dispatch::Dispatcher;
use crate::error::MiddlewareError;
use crate::registry::ErrorHandlerRegistry;
use crate::stages::CorsMiddleware;

/// Where an error interrupted the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// `process_request` of the layer at this index.
    Request(usize),
    /// Route lookup.
    Routing,
    /// `process_resource` of the layer at this index.
    Resource(usize),
    /// The responder.
    Responder,
    /// `process_response`.
    Response,
}

impl Phase {
    /// Returns the label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Routing => "routing",
            Self::Resource(_) => "resource",
            Self::Responder => "responder",
            Self::Response => "response",
        }
    }
}

enum Outcome {
    Completed,
    Handled,
    Unhandled(HookError, Phase),
}

/// An ordered list of registered middleware plus the build-time modes.
///
/// The pipeline is read-only while serving and may be shared across
/// concurrent requests.
///
/// # Example
///
/// ```rust
/// use trellis_middleware::{Component, Pipeline};
/// use trellis_core::{ExecutionMode, RequestHook};
///
/// let pipeline = Pipeline::builder()
///     .independent(false)
///     .execution(ExecutionMode::Async)
///     .middleware(Component::new("auth").process_request(RequestHook::blocking(|_, _| Ok(()))))
///     .build()
///     .unwrap();
///
/// assert_eq!(pipeline.names(), vec!["auth"]);
/// ```
#[derive(Debug)]
pub struct Pipeline {
    layers: Vec<Layer>,
    middleware_mode: MiddlewareMode,
    execution_mode: ExecutionMode,
    cors_enabled: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(MiddlewareMode::default(), ExecutionMode::default())
    }
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new(middleware_mode: MiddlewareMode, execution_mode: ExecutionMode) -> Self {
        Self {
            layers: Vec::new(),
            middleware_mode,
            execution_mode,
            cors_enabled: false,
        }
    }

    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Validates `component` and appends it.
    pub fn add_middleware(&mut self, component: Component) -> Result<(), MiddlewareError> {
        if self.cors_enabled && component.is_cors() {
            return Err(MiddlewareError::CorsConflict {
                name: component.name().to_string(),
            });
        }

        let layer = component.prepare(self.execution_mode)?;
        tracing::debug!(
            middleware = layer.name(),
            request = layer.has_request_hook(),
            resource = layer.has_resource_hook(),
            response = layer.has_response_hook(),
            "Registered middleware"
        );
        self.layers.push(layer);
        Ok(())
    }

    /// Registers the built-in CORS component. Any later CORS component is
    /// rejected.
    pub fn enable_cors(&mut self, cors: CorsMiddleware) -> Result<(), MiddlewareError> {
        self.add_middleware(cors.into_component())?;
        self.cors_enabled = true;
        Ok(())
    }

    /// Returns the middleware mode.
    #[must_use]
    pub const fn middleware_mode(&self) -> MiddlewareMode {
        self.middleware_mode
    }

    /// Returns the execution mode.
    #[must_use]
    pub const fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    /// Returns true if built-in CORS is enabled.
    #[must_use]
    pub const fn cors_enabled(&self) -> bool {
        self.cors_enabled
    }

    /// Returns the layer names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(Layer::name).collect()
    }

    /// Returns the registered layers.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if no middleware is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Runs one request through every phase.
    ///
    /// On success the response is ready to send. An `Err` is an error no
    /// handler accepted; the response hooks selected by the unwind table
    /// have already run.
    pub async fn run(
        &self,
        req: &mut Request,
        resp: &mut Response,
        dispatcher: &dyn Dispatcher,
        errors: &ErrorHandlerRegistry,
    ) -> Result<(), HookError> {
        let mut params = Params::new();
        let mut resource: Option<Arc<Resource>> = None;

        let outcome = self
            .before_response(req, resp, dispatcher, errors, &mut resource, &mut params)
            .await;

        let (mut succeeded, unwind, mut pending) = match outcome {
            Outcome::Completed => (true, self.layers.len(), None),
            Outcome::Handled => (false, self.layers.len(), None),
            Outcome::Unhandled(error, phase) => {
                tracing::debug!(phase = phase.as_str(), error = %error, "Unhandled error, unwinding");
                trellis_telemetry::record_unhandled_error(phase.as_str());
                (false, self.unwind_len(phase), Some(error))
            }
        };

        for layer in self.layers[..unwind].iter().rev() {
            let Some(hook) = &layer.response else {
                continue;
            };

            tracing::trace!(middleware = layer.name(), succeeded, "process_response");
            if let Err(error) = hook
                .call(req, resp, resource.as_deref(), succeeded)
                .await
            {
                succeeded = false;
                tracing::warn!(middleware = layer.name(), error = %error, "Response hook failed");
                if let Some(unhandled) = self.recover(req, resp, &params, errors, error).await {
                    trellis_telemetry::record_unhandled_error(Phase::Response.as_str());
                    if let Some(earlier) = pending.take() {
                        tracing::warn!(error = %earlier, "Earlier unhandled error superseded");
                    }
                    return Err(unhandled);
                }
            }
        }

        pending.map_or(Ok(()), Err)
    }

    async fn before_response(
        &self,
        req: &mut Request,
        resp: &mut Response,
        dispatcher: &dyn Dispatcher,
        errors: &ErrorHandlerRegistry,
        resource: &mut Option<Arc<Resource>>,
        params: &mut Params,
    ) -> Outcome {
        for (index, layer) in self.layers.iter().enumerate() {
            let Some(hook) = &layer.request else {
                continue;
            };

            tracing::trace!(middleware = layer.name(), "process_request");
            if let Err(error) = hook.call(req, resp).await {
                return self.outcome(req, resp, params, errors, error, Phase::Request(index)).await;
            }
            if resp.is_complete() {
                tracing::debug!(middleware = layer.name(), "Request phase short-circuited");
                return Outcome::Completed;
            }
        }

        let Some(route) = dispatcher.route(req) else {
            tracing::debug!(path = req.path(), "No route matched");
            let error = HttpError::not_found().into();
            return self.outcome(req, resp, params, errors, error, Phase::Routing).await;
        };

        req.set_uri_template(route.template);
        *params = route.params;
        *resource = Some(Arc::clone(&route.resource));
        let target = route.resource;

        for (index, layer) in self.layers.iter().enumerate() {
            let Some(hook) = &layer.resource else {
                continue;
            };

            tracing::trace!(middleware = layer.name(), resource = target.name(), "process_resource");
            if let Err(error) = hook.call(req, resp, &target, params).await {
                return self.outcome(req, resp, params, errors, error, Phase::Resource(index)).await;
            }
            if resp.is_complete() {
                tracing::debug!(middleware = layer.name(), "Resource phase short-circuited");
                return Outcome::Completed;
            }
        }

        let Some(responder) = target.responder(req.method()) else {
            let error = HttpError::method_not_allowed(&target.allowed_methods()).into();
            return self.outcome(req, resp, params, errors, error, Phase::Responder).await;
        };

        if let Err(error) = responder.call(req, resp, params).await {
            return self.outcome(req, resp, params, errors, error, Phase::Responder).await;
        }

        Outcome::Completed
    }

    async fn outcome(
        &self,
        req: &mut Request,
        resp: &mut Response,
        params: &Params,
        errors: &ErrorHandlerRegistry,
        error: HookError,
        phase: Phase,
    ) -> Outcome {
        match self.recover(req, resp, params, errors, error).await {
            None => Outcome::Handled,
            Some(error) => Outcome::Unhandled(error, phase),
        }
    }

    /// Returns `None` when a handler accepted the error.
    async fn recover(
        &self,
        req: &mut Request,
        resp: &mut Response,
        params: &Params,
        errors: &ErrorHandlerRegistry,
        error: HookError,
    ) -> Option<HookError> {
        match errors.dispatch(req, resp, &error, params).await {
            Ok(true) => None,
            Ok(false) => Some(error),
            Err(handler_error) => {
                tracing::warn!(error = %error, handler_error = %handler_error, "Error handler failed");
                Some(handler_error)
            }
        }
    }

    /// Number of layers, counted from the first, whose response hooks run
    /// after an unhandled error in `phase`.
    fn unwind_len(&self, phase: Phase) -> usize {
        match (self.middleware_mode, phase) {
            (MiddlewareMode::Independent, _)
            | (MiddlewareMode::Nested, Phase::Responder | Phase::Response) => self.layers.len(),
            (MiddlewareMode::Nested, Phase::Request(_) | Phase::Routing) => 0,
            (MiddlewareMode::Nested, Phase::Resource(index)) => index,
        }
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    components: Vec<Component>,
    middleware_mode: MiddlewareMode,
    execution_mode: ExecutionMode,
    cors: Option<CorsMiddleware>,
}

impl PipelineBuilder {
    /// Creates a builder with independent middleware and async execution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `independent_middleware` flag.
    #[must_use]
    pub fn independent(mut self, independent: bool) -> Self {
        self.middleware_mode = MiddlewareMode::from_independent(independent);
        self
    }

    /// Sets the middleware mode.
    #[must_use]
    pub fn middleware_mode(mut self, mode: MiddlewareMode) -> Self {
        self.middleware_mode = mode;
        self
    }

    /// Sets the execution mode.
    #[must_use]
    pub fn execution(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// Enables built-in CORS. The CORS component runs first.
    #[must_use]
    pub fn cors(mut self, cors: CorsMiddleware) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Appends a component.
    #[must_use]
    pub fn middleware(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// Appends several components.
    #[must_use]
    pub fn extend<I>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = Component>,
    {
        self.components.extend(components);
        self
    }

    /// Validates every component and builds the pipeline.
    pub fn build(self) -> Result<Pipeline, MiddlewareError> {
        let mut pipeline = Pipeline::new(self.middleware_mode, self.execution_mode);
        if let Some(cors) = self.cors {
            pipeline.enable_cors(cors)?;
        }
        for component in self.components {
            pipeline.add_middleware(component)?;
        }
        Ok(pipeline)
    }
}
