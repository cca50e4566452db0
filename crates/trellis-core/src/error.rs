//! Error types raised by hooks, responders, and error handlers.
//!
//! A hook fails by returning a [`HookError`]. Three kinds are distinguished:
//!
//! | Kind | Meaning | Default handling |
//! |---|---|---|
//! | [`HookError::Status`] | A "final status" the hook wants applied | status, body, and headers copied to the response |
//! | [`HookError::Http`] | An HTTP-level error | status plus a JSON body with `title` / `description` |
//! | [`HookError::App`] | Any other error | unhandled unless a handler matches its type |

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, ALLOW};
use http::{HeaderMap, Method, StatusCode};
use serde_json::{json, Value};
use std::error::Error as StdError;
use thiserror::Error;

/// A boxed, thread-safe error.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type for hooks, responders, and error handlers.
pub type HookResult<T = ()> = Result<T, HookError>;

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}

/// An HTTP error with a status, a title, and an optional description.
///
/// The default error handler renders it as
/// `{"title": ..., "description": ...}` with the error's status and headers.
#[derive(Debug, Clone, Error)]
#[error("{title}")]
pub struct HttpError {
    status: StatusCode,
    title: String,
    description: Option<String>,
    headers: HeaderMap,
}

impl HttpError {
    /// Creates an error whose title is the status line (e.g. `403 Forbidden`).
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            title: status_line(status),
            description: None,
            headers: HeaderMap::new(),
        }
    }

    /// `400 Bad Request`.
    #[must_use]
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    /// `403 Forbidden`.
    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN)
    }

    /// `404 Not Found`.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    /// `405 Method Not Allowed` with an `Allow` header listing `allowed`.
    #[must_use]
    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let list = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let mut error = Self::new(StatusCode::METHOD_NOT_ALLOWED);
        if let Ok(value) = HeaderValue::from_str(&list) {
            error.headers.insert(ALLOW, value);
        }
        error
    }

    /// `500 Internal Server Error`.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Replaces the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a header to apply to the response.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the headers to apply.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Renders the JSON document used as the response body.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut doc = json!({ "title": self.title });
        if let Some(description) = &self.description {
            doc["description"] = Value::String(description.clone());
        }
        doc
    }
}

/// A "final status" signal.
///
/// Returning this from a hook, responder, or error handler asks the framework
/// to set the response to exactly this status, body, and headers.
#[derive(Debug, Clone, Error)]
#[error("final status {status}")]
pub struct HttpStatus {
    status: StatusCode,
    body: Option<Bytes>,
    headers: HeaderMap,
}

impl HttpStatus {
    /// Creates a final status without a body.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    /// Creates a final status from a raw code.
    ///
    /// Non-standard codes in the 100..=999 range are accepted.
    pub fn from_u16(code: u16) -> Result<Self, http::status::InvalidStatusCode> {
        StatusCode::from_u16(code).map(Self::new)
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the body, if any.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns the headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// An error raised by a hook, responder, or error handler.
#[derive(Debug, Error)]
pub enum HookError {
    /// A final status to apply.
    #[error(transparent)]
    Status(#[from] HttpStatus),

    /// An HTTP-level error.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Any other error.
    #[error(transparent)]
    App(BoxError),
}

impl HookError {
    /// Wraps an application error.
    pub fn app<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::App(Box::new(error))
    }

    /// Creates an application error from a message.
    pub fn msg(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self::App(anyhow::Error::msg(message).into())
    }

    /// Returns a short name for the error kind, used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Http(_) => "http",
            Self::App(_) => "app",
        }
    }

    /// Returns the HTTP status carried by a `Status` or `Http` error.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(status) => Some(status.status()),
            Self::Http(error) => Some(error.status()),
            Self::App(_) => None,
        }
    }

    /// Returns true if the wrapped error is of type `E`.
    #[must_use]
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }

    /// Returns the wrapped error as `E`, if it is one.
    ///
    /// [`HttpStatus`] and [`HttpError`] are reachable through this as well,
    /// so a handler registered for either type matches the built-in kinds.
    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            Self::Status(status) => (status as &(dyn StdError + 'static)).downcast_ref(),
            Self::Http(error) => (error as &(dyn StdError + 'static)).downcast_ref(),
            Self::App(error) => error.downcast_ref(),
        }
    }
}

impl From<serde_json::Error> for HookError {
    fn from(error: serde_json::Error) -> Self {
        Self::app(error)
    }
}

impl From<BoxError> for HookError {
    fn from(error: BoxError) -> Self {
        Self::App(error)
    }
}
