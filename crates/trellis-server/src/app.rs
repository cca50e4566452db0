//! The application: routes, middleware, error handlers, background jobs,
//! and lifecycle hooks behind two request entry points.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::{Builder as RuntimeBuilder, Handle, Runtime};
use tracing::Instrument;
use trellis_config::TrellisConfig;
use trellis_core::{
    ErrorHandler, ExecutionMode, HookError, MiddlewareMode, Request, Resource, Response,
};
use trellis_middleware::stages::CorsMiddleware;
use trellis_middleware::{
    internal_error_response, Component, ErrorHandlerRegistry, MiddlewareError, Pipeline,
};
use trellis_router::Router;
use trellis_tasks::{BackgroundRunner, RunnerConfig};

use crate::error::AppError;
use crate::lifecycle::{Lifecycle, LifecycleResult};

/// An assembled application.
///
/// ```rust
/// use trellis_core::Request;
/// use trellis_server::App;
/// use trellis_core::Resource;
///
/// # tokio_test::block_on(async {
/// let mut app = App::new();
/// app.add_route("/hello", Resource::new("hello").on_get(|_req, resp, _params| {
///     resp.set_text("hi");
///     Ok(())
/// }))
/// .unwrap();
///
/// let resp = app.respond(Request::get("/hello")).await;
/// assert_eq!(resp.text(), "hi");
/// # });
/// ```
pub struct App {
    config: TrellisConfig,
    pipeline: Pipeline,
    router: Router<Arc<Resource>>,
    errors: ErrorHandlerRegistry,
    runner: BackgroundRunner,
    lifecycle: Lifecycle,
    started: AtomicBool,
    runtime: Mutex<Option<Arc<Runtime>>>,
}

impl App {
    /// Creates an app with default configuration and no middleware.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(
            TrellisConfig::default(),
            Pipeline::default(),
            Lifecycle::new(),
            ErrorHandlerRegistry::with_defaults(),
        )
    }

    /// Creates an app builder.
    #[must_use]
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// Builds an app from configuration alone.
    pub fn from_config(config: TrellisConfig) -> Result<Self, AppError> {
        Self::builder().config(config).build()
    }

    fn from_parts(
        config: TrellisConfig,
        pipeline: Pipeline,
        lifecycle: Lifecycle,
        errors: ErrorHandlerRegistry,
    ) -> Self {
        let runner = BackgroundRunner::with_config(RunnerConfig {
            job_timeout: config.tasks.job_timeout(),
            drain_timeout: config.tasks.drain_timeout(),
            track_history: config.tasks.track_history,
            max_history: config.tasks.max_history,
        });

        Self {
            config,
            pipeline,
            router: Router::new(),
            errors,
            runner,
            lifecycle,
            started: AtomicBool::new(false),
            runtime: Mutex::new(None),
        }
    }

    /// Returns the configuration the app was built from.
    pub fn config(&self) -> &TrellisConfig {
        &self.config
    }

    /// Returns the middleware pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the middleware mode.
    pub fn middleware_mode(&self) -> MiddlewareMode {
        self.pipeline.middleware_mode()
    }

    /// Returns the execution mode.
    pub fn execution_mode(&self) -> ExecutionMode {
        self.pipeline.execution_mode()
    }

    /// Returns the registered route templates.
    pub fn routes(&self) -> Vec<&str> {
        self.router.templates().collect()
    }

    /// Returns the error handler registry.
    pub fn error_handlers(&self) -> &ErrorHandlerRegistry {
        &self.errors
    }

    /// Returns the background job runner.
    pub fn jobs(&self) -> &BackgroundRunner {
        &self.runner
    }

    /// Registers one middleware component after those already present.
    pub fn add_middleware(&mut self, component: Component) -> Result<(), AppError> {
        self.pipeline.add_middleware(component)?;
        Ok(())
    }

    /// Registers several components in order. Stops at the first invalid
    /// one; components before it stay registered.
    pub fn add_middlewares<I>(&mut self, components: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = Component>,
    {
        for component in components {
            self.add_middleware(component)?;
        }
        Ok(())
    }

    /// Routes `template` to `resource`.
    ///
    /// A blocking app only accepts blocking responders.
    pub fn add_route(&mut self, template: &str, resource: Resource) -> Result<(), AppError> {
        if self.execution_mode() == ExecutionMode::Blocking {
            if let Some((method, _)) = resource.responders().find(|(_, r)| r.is_awaitable()) {
                return Err(MiddlewareError::compatibility(
                    resource.name(),
                    "responder",
                    format!("for {method} is awaitable but the app runs in blocking mode"),
                )
                .into());
            }
        }

        tracing::debug!(template, resource = resource.name(), "Added route");
        self.router.insert(template, Arc::new(resource))?;
        Ok(())
    }

    /// Registers a handler for errors of type `E`. The most recently
    /// registered handler for a type wins.
    pub fn add_error_handler<E>(&mut self, handler: ErrorHandler) -> Result<(), AppError>
    where
        E: StdError + 'static,
    {
        self.check_handler(std::any::type_name::<E>(), &handler)?;
        self.errors.add::<E>(handler);
        Ok(())
    }

    /// Registers a handler for errors no typed handler accepts.
    pub fn add_catch_all_handler(&mut self, handler: ErrorHandler) -> Result<(), AppError> {
        self.check_handler("*", &handler)?;
        self.errors.add_catch_all(handler);
        Ok(())
    }

    /// Removes every error handler, including the defaults.
    pub fn clear_error_handlers(&mut self) {
        self.errors.clear();
    }

    fn check_handler(&self, label: &str, handler: &ErrorHandler) -> Result<(), MiddlewareError> {
        if self.execution_mode() == ExecutionMode::Blocking && handler.is_awaitable() {
            return Err(MiddlewareError::compatibility(
                label,
                "error_handler",
                "is awaitable but the app runs in blocking mode",
            ));
        }
        Ok(())
    }

    /// Runs a request through the pipeline.
    ///
    /// Returns the error when no handler accepts it; the jobs the response
    /// scheduled are then discarded. Otherwise the jobs are handed to the
    /// background runner once the response is final.
    pub async fn handle(&self, mut req: Request) -> Result<Response, HookError> {
        let mut resp = Response::new();
        let span = tracing::debug_span!("request", method = %req.method(), path = req.path());

        if let Err(error) = self
            .pipeline
            .run(&mut req, &mut resp, &self.router, &self.errors)
            .instrument(span)
            .await
        {
            if !resp.jobs().is_empty() {
                tracing::debug!(jobs = resp.jobs().len(), "Discarding jobs of failed request");
            }
            return Err(error);
        }

        let jobs = resp.take_jobs();
        if !jobs.is_empty() {
            if let Err(e) = self.runner.submit(jobs) {
                tracing::warn!(error = %e, "Background jobs dropped");
            }
        }

        trellis_telemetry::record_request(resp.status().as_u16());
        Ok(resp)
    }

    /// Runs a request and always produces a response. An unhandled error
    /// is logged and becomes `500 Internal Server Error`.
    pub async fn respond(&self, req: Request) -> Response {
        let method = req.method().clone();
        let path = req.path().to_string();

        match self.handle(req).await {
            Ok(resp) => resp,
            Err(error) => {
                tracing::error!(
                    method = %method,
                    path = %path,
                    kind = error.kind(),
                    error = %error,
                    "Unhandled error"
                );
                trellis_telemetry::record_request(500);
                internal_error_response()
            }
        }
    }

    /// Blocking form of [`handle`](Self::handle), for callers without an
    /// async runtime.
    ///
    /// Background jobs keep running on an internal runtime after this
    /// returns.
    pub fn handle_blocking(&self, req: Request) -> Result<Response, AppError> {
        let response = self.block_on(self.handle(req))??;
        Ok(response)
    }

    /// Blocking form of [`respond`](Self::respond).
    pub fn respond_blocking(&self, req: Request) -> Result<Response, AppError> {
        self.block_on(self.respond(req))
    }

    /// Waits until every background job has finished.
    pub async fn wait_for_jobs(&self) {
        self.runner.wait_idle().await;
    }

    /// Blocking form of [`wait_for_jobs`](Self::wait_for_jobs).
    pub fn wait_for_jobs_blocking(&self) -> Result<(), AppError> {
        self.block_on(self.wait_for_jobs())
    }

    fn block_on<F: Future>(&self, future: F) -> Result<F::Output, AppError> {
        if Handle::try_current().is_ok() {
            return Err(AppError::BlockingInAsync);
        }
        let runtime = self.blocking_runtime()?;
        Ok(runtime.block_on(future))
    }

    fn blocking_runtime(&self) -> Result<Arc<Runtime>, AppError> {
        let mut slot = self.runtime.lock();
        if let Some(runtime) = slot.as_ref() {
            return Ok(Arc::clone(runtime));
        }

        let runtime = Arc::new(
            RuntimeBuilder::new_multi_thread()
                .worker_threads(1)
                .thread_name("trellis-blocking")
                .enable_all()
                .build()?,
        );
        *slot = Some(Arc::clone(&runtime));
        Ok(runtime)
    }

    /// Returns true once startup hooks have run.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Runs the startup hooks. Later calls are no-ops once startup has
    /// succeeded.
    pub async fn startup(&self) -> Result<(), AppError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Err(e) = self.lifecycle.run_startup().await {
            self.started.store(false, Ordering::Release);
            return Err(e.into());
        }

        tracing::info!(
            middleware = ?self.pipeline.names(),
            routes = self.router.len(),
            mode = self.execution_mode().as_str(),
            "Application started"
        );
        Ok(())
    }

    /// Stops accepting background jobs, waits for in-flight ones up to the
    /// configured drain timeout, then runs the shutdown hooks.
    ///
    /// Shutdown hooks run even when draining times out.
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let drained = self.runner.shutdown().await;
        self.lifecycle.run_shutdown().await?;
        drained?;
        tracing::info!("Application stopped");
        Ok(())
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // A runtime may not be dropped from async code; let it wind down
        // in the background instead.
        if let Some(runtime) = self.runtime.get_mut().take() {
            if let Ok(runtime) = Arc::try_unwrap(runtime) {
                runtime.shutdown_background();
            }
        }
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("middleware", &self.pipeline.names())
            .field("routes", &self.routes())
            .field("error_handlers", &self.errors)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

/// Builder for [`App`].
#[derive(Debug, Default)]
pub struct AppBuilder {
    config: TrellisConfig,
    cors: Option<CorsMiddleware>,
    components: Vec<Component>,
    lifecycle: Lifecycle,
    skip_default_handlers: bool,
}

impl AppBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn config(mut self, config: TrellisConfig) -> Self {
        self.config = config;
        self
    }

    /// Chooses independent (`true`) or nested (`false`) response hooks.
    #[must_use]
    pub fn independent_middleware(mut self, independent: bool) -> Self {
        self.config.app.independent_middleware = independent;
        self
    }

    /// Sets the execution mode.
    #[must_use]
    pub fn execution(mut self, mode: ExecutionMode) -> Self {
        self.config.app.execution = mode;
        self
    }

    /// Enables built-in CORS with the given policy instead of the one built
    /// from configuration.
    #[must_use]
    pub fn cors(mut self, cors: CorsMiddleware) -> Self {
        self.config.app.cors_enable = true;
        self.cors = Some(cors);
        self
    }

    /// Appends a middleware component.
    #[must_use]
    pub fn middleware(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// Appends several middleware components in order.
    #[must_use]
    pub fn middlewares<I>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = Component>,
    {
        self.components.extend(components);
        self
    }

    /// Merges lifecycle hooks.
    #[must_use]
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = self.lifecycle.merge(lifecycle);
        self
    }

    /// Adds a startup hook.
    #[must_use]
    pub fn on_startup<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        self.lifecycle = self.lifecycle.on_startup(name, hook);
        self
    }

    /// Adds a shutdown hook.
    #[must_use]
    pub fn on_shutdown<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LifecycleResult> + Send + 'static,
    {
        self.lifecycle = self.lifecycle.on_shutdown(name, hook);
        self
    }

    /// Starts with an empty error handler registry.
    #[must_use]
    pub fn without_default_handlers(mut self) -> Self {
        self.skip_default_handlers = true;
        self
    }

    /// Validates the configuration and every component.
    pub fn build(self) -> Result<App, AppError> {
        self.config.validate()?;

        let app_config = &self.config.app;
        let mut pipeline = Pipeline::builder()
            .middleware_mode(app_config.middleware_mode())
            .execution(app_config.execution)
            .extend(self.components);

        let cors = match self.cors {
            Some(cors) => Some(cors),
            None if app_config.cors_enable => Some(
                CorsMiddleware::builder()
                    .allow_origins(app_config.cors_allow_origins.iter().cloned())
                    .build(),
            ),
            None => None,
        };
        if let Some(cors) = cors {
            pipeline = pipeline.cors(cors);
        }

        let errors = if self.skip_default_handlers {
            ErrorHandlerRegistry::new()
        } else {
            ErrorHandlerRegistry::with_defaults()
        };

        let app = App::from_parts(self.config, pipeline.build()?, self.lifecycle, errors);
        tracing::debug!(
            middleware = ?app.pipeline.names(),
            mode = app.middleware_mode().is_independent(),
            "Built application"
        );
        Ok(app)
    }
}
