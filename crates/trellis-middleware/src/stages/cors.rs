//! CORS (Cross-Origin Resource Sharing) component.
//!
//! The request hook answers preflight `OPTIONS` requests directly and marks
//! the response complete, so routing and the responder never run for them.
//! The response hook adds `Access-Control-Allow-Origin` (and friends) to
//! every other response whose `Origin` is allowed.
//!
//! ## Example
//!
//! ```rust
//! use trellis_middleware::stages::CorsMiddleware;
//! use http::Method;
//! use std::time::Duration;
//!
//! let cors = CorsMiddleware::builder()
//!     .allow_origin("https://app.example.com")
//!     .allow_methods([Method::GET, Method::POST])
//!     .allow_headers(["Content-Type", "Authorization"])
//!     .max_age(Duration::from_secs(3600))
//!     .build();
//!
//! let component = cors.into_component();
//! assert!(component.is_cors());
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
    VARY,
};
use http::{Method, StatusCode};
use trellis_core::{HookResult, Request, RequestHook, Response, ResponseHook};

use crate::component::Component;

/// Name under which the component is registered.
pub const CORS_COMPONENT: &str = "cors";

/// The set of allowed origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Any origin (`*`).
    Any,
    /// Only these origins.
    List(BTreeSet<String>),
}

impl AllowedOrigins {
    /// Returns true if `origin` is allowed.
    #[must_use]
    pub fn is_allowed(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(origins) => origins.contains(origin),
        }
    }

    fn header_value(&self, origin: &str) -> Option<HeaderValue> {
        match self {
            Self::Any => Some(HeaderValue::from_static("*")),
            Self::List(origins) if origins.contains(origin) => HeaderValue::from_str(origin).ok(),
            Self::List(_) => None,
        }
    }
}

/// CORS settings.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    allowed_origins: AllowedOrigins,
    allowed_methods: Vec<Method>,
    allowed_headers: BTreeSet<String>,
    expose_headers: BTreeSet<String>,
    allow_credentials: bool,
    max_age: Option<Duration>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: AllowedOrigins::List(BTreeSet::new()),
            allowed_methods: vec![
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
            ],
            allowed_headers: ["content-type", "authorization"]
                .into_iter()
                .map(String::from)
                .collect(),
            expose_headers: BTreeSet::new(),
            allow_credentials: false,
            max_age: Some(Duration::from_secs(86400)),
        }
    }
}

/// Builder for [`CorsMiddleware`].
#[derive(Debug, Clone, Default)]
pub struct CorsBuilder {
    config: CorsConfig,
}

impl CorsBuilder {
    /// Creates a builder that allows no origins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows any origin.
    #[must_use]
    pub fn allow_any_origin(mut self) -> Self {
        self.config.allowed_origins = AllowedOrigins::Any;
        self
    }

    /// Adds an allowed origin. `*` allows any origin.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        if origin == "*" {
            self.config.allowed_origins = AllowedOrigins::Any;
        } else if let AllowedOrigins::List(origins) = &mut self.config.allowed_origins {
            origins.insert(origin);
        }
        self
    }

    /// Adds several allowed origins.
    #[must_use]
    pub fn allow_origins<I, S>(self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        origins
            .into_iter()
            .fold(self, |builder, origin| builder.allow_origin(origin))
    }

    /// Sets the allowed methods.
    #[must_use]
    pub fn allow_methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.config.allowed_methods = methods.into_iter().collect();
        self
    }

    /// Sets the allowed request headers. `*` allows any header.
    #[must_use]
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_headers = headers
            .into_iter()
            .map(|h| h.into().to_lowercase())
            .collect();
        self
    }

    /// Sets the headers exposed to scripts.
    #[must_use]
    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.expose_headers = headers
            .into_iter()
            .map(|h| h.into().to_lowercase())
            .collect();
        self
    }

    /// Sets whether credentials are allowed.
    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.config.allow_credentials = allow;
        self
    }

    /// Sets the preflight cache duration.
    #[must_use]
    pub fn max_age(mut self, duration: Duration) -> Self {
        self.config.max_age = Some(duration);
        self
    }

    /// Builds the middleware.
    #[must_use]
    pub fn build(self) -> CorsMiddleware {
        CorsMiddleware {
            config: Arc::new(self.config),
        }
    }
}

/// CORS handling as a middleware component.
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    config: Arc<CorsConfig>,
}

impl CorsMiddleware {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> CorsBuilder {
        CorsBuilder::new()
    }

    /// Allows any origin, method, and header.
    #[must_use]
    pub fn permissive() -> Self {
        CorsBuilder::new()
            .allow_any_origin()
            .allow_methods([
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers(["*"])
            .build()
    }

    /// Returns the settings.
    #[must_use]
    pub fn config(&self) -> &CorsConfig {
        &self.config
    }

    /// Converts into a registrable component.
    #[must_use]
    pub fn into_component(self) -> Component {
        let on_request = Arc::clone(&self.config);
        let on_response = self.config;

        Component::new(CORS_COMPONENT)
            .process_request(RequestHook::blocking(move |req, resp| {
                preflight(&on_request, req, resp)
            }))
            .process_response(ResponseHook::blocking(move |req, resp, _resource, _ok| {
                decorate(&on_response, req, resp);
                Ok(())
            }))
            .mark_cors()
    }
}

fn is_preflight(req: &Request) -> bool {
    req.method() == Method::OPTIONS
        && req.headers().contains_key(ORIGIN)
        && req.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
}

fn preflight(config: &CorsConfig, req: &Request, resp: &mut Response) -> HookResult {
    if !is_preflight(req) {
        return Ok(());
    }
    resp.set_complete(true);

    let origin = req.header(ORIGIN.as_str()).unwrap_or_default();
    if !config.allowed_origins.is_allowed(origin) {
        forbid(resp, "Origin not allowed");
        return Ok(());
    }

    let requested = req
        .header(ACCESS_CONTROL_REQUEST_METHOD.as_str())
        .and_then(|m| m.parse::<Method>().ok());
    if let Some(method) = requested {
        if !config.allowed_methods.contains(&method) {
            forbid(resp, "Method not allowed");
            return Ok(());
        }
    }

    if let Some(headers) = req.header(ACCESS_CONTROL_REQUEST_HEADERS.as_str()) {
        if !config.allowed_headers.contains("*") {
            let rejected = headers
                .split(',')
                .map(|h| h.trim().to_lowercase())
                .find(|h| !h.is_empty() && !config.allowed_headers.contains(h));
            if let Some(header) = rejected {
                forbid(resp, &format!("Header '{header}' not allowed"));
                return Ok(());
            }
        }
    }

    resp.set_status(StatusCode::NO_CONTENT);
    let headers = resp.headers_mut();
    if let Some(value) = config.allowed_origins.header_value(origin) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    let methods = config
        .allowed_methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if let Ok(value) = HeaderValue::from_str(&methods) {
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, value);
    }
    let allowed = config
        .allowed_headers
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if let Ok(value) = HeaderValue::from_str(&allowed) {
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, value);
    }
    if config.allow_credentials {
        headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    }
    if let Some(max_age) = config.max_age {
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age.as_secs()));
    }
    headers.insert(
        VARY,
        HeaderValue::from_static("Origin, Access-Control-Request-Method, Access-Control-Request-Headers"),
    );
    Ok(())
}

fn forbid(resp: &mut Response, message: &str) {
    resp.set_status(StatusCode::FORBIDDEN);
    resp.set_text(message);
}

fn decorate(config: &CorsConfig, req: &Request, resp: &mut Response) {
    if is_preflight(req) {
        return;
    }
    let Some(origin) = req.header(ORIGIN.as_str()) else {
        return;
    };
    let Some(value) = config.allowed_origins.header_value(origin) else {
        return;
    };

    let headers = resp.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
    if config.allow_credentials {
        headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    }
    if !config.expose_headers.is_empty() {
        let exposed = config
            .expose_headers
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&exposed) {
            headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, value);
        }
    }
    headers.insert(VARY, HeaderValue::from_static("Origin"));
}
