//! Error handler registry.
//!
//! Handlers are keyed by error type. Lookup tries typed entries first, most
//! recently registered wins, then falls back to catch-all entries.

use std::any::type_name;
use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;
use serde_json::json;
use trellis_core::{
    ErrorHandler, HookError, HookResult, HttpError, HttpStatus, Params, Request, Response,
};

type Matcher = Box<dyn Fn(&HookError) -> bool + Send + Sync>;

struct Entry {
    label: &'static str,
    matcher: Option<Matcher>,
    handler: ErrorHandler,
}

/// Maps error kinds to handlers.
#[derive(Default)]
pub struct ErrorHandlerRegistry {
    typed: Vec<Entry>,
    catch_all: Vec<Entry>,
}

impl ErrorHandlerRegistry {
    /// Creates an empty registry. Every error is unhandled until a handler
    /// is added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the default handlers:
    ///
    /// - [`HttpError`]: status, headers, and a JSON `title`/`description` body
    /// - [`HttpStatus`]: status, headers, and body as given
    /// - anything else: `500` with a JSON title
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.add_catch_all(ErrorHandler::blocking(|_req, resp, _error, _params| {
            compose_http_error(resp, &HttpError::internal())
        }));
        registry.add::<HttpStatus>(ErrorHandler::blocking(|_req, resp, error, _params| {
            if let HookError::Status(status) = error {
                apply_status(resp, status);
            }
            Ok(())
        }));
        registry.add::<HttpError>(ErrorHandler::blocking(|_req, resp, error, _params| {
            match error {
                HookError::Http(http) => compose_http_error(resp, http),
                _ => Ok(()),
            }
        }));
        registry
    }

    /// Registers a handler for errors of type `E`.
    ///
    /// `E` may be [`HttpError`], [`HttpStatus`], or any application error
    /// type carried by [`HookError::App`].
    pub fn add<E: StdError + 'static>(&mut self, handler: ErrorHandler) {
        self.typed.push(Entry {
            label: type_name::<E>(),
            matcher: Some(Box::new(HookError::is::<E>)),
            handler,
        });
    }

    /// Registers a handler for every error not matched by a typed handler.
    pub fn add_catch_all(&mut self, handler: ErrorHandler) {
        self.catch_all.push(Entry {
            label: "*",
            matcher: None,
            handler,
        });
    }

    /// Removes every handler, including the defaults.
    pub fn clear(&mut self) {
        self.typed.clear();
        self.catch_all.clear();
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.typed.len() + self.catch_all.len()
    }

    /// Returns true if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the handlers, in registration order, as an iterator.
    pub fn handlers(&self) -> impl Iterator<Item = &ErrorHandler> {
        self.typed
            .iter()
            .chain(&self.catch_all)
            .map(|entry| &entry.handler)
    }

    fn find(&self, error: &HookError) -> Option<&Entry> {
        self.typed
            .iter()
            .rev()
            .find(|entry| entry.matcher.as_ref().is_some_and(|m| m(error)))
            .or_else(|| self.catch_all.last())
    }

    /// Returns true if some handler would accept `error`.
    #[must_use]
    pub fn handles(&self, error: &HookError) -> bool {
        self.find(error).is_some()
    }

    /// Runs the handler for `error`.
    ///
    /// Returns `Ok(true)` when a handler ran, `Ok(false)` when none matched.
    /// A handler returning [`HookError::Status`] has that status applied and
    /// counts as handled; any other error it returns is passed back.
    pub async fn dispatch(
        &self,
        req: &mut Request,
        resp: &mut Response,
        error: &HookError,
        params: &Params,
    ) -> Result<bool, HookError> {
        let Some(entry) = self.find(error) else {
            return Ok(false);
        };

        tracing::debug!(handler = entry.label, error = %error, "Dispatching error handler");
        match entry.handler.call(req, resp, error, params).await {
            Ok(()) => Ok(true),
            Err(HookError::Status(status)) => {
                apply_status(resp, &status);
                Ok(true)
            }
            Err(other) => Err(other),
        }
    }
}

impl fmt::Debug for ErrorHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlerRegistry")
            .field(
                "typed",
                &self.typed.iter().map(|e| e.label).collect::<Vec<_>>(),
            )
            .field("catch_all", &self.catch_all.len())
            .finish()
    }
}

/// Applies a final status to a response.
pub fn apply_status(resp: &mut Response, status: &HttpStatus) {
    resp.set_status(status.status());
    if let Some(body) = status.body() {
        resp.set_body(body.clone());
    }
    for (name, value) in status.headers() {
        resp.headers_mut().insert(name.clone(), value.clone());
    }
}

/// Renders an HTTP error onto a response.
pub fn compose_http_error(resp: &mut Response, error: &HttpError) -> HookResult {
    resp.set_status(error.status());
    for (name, value) in error.headers() {
        resp.headers_mut().insert(name.clone(), value.clone());
    }
    resp.set_json(&error.to_json())?;
    Ok(())
}

/// The response written when an error escapes every handler.
pub fn internal_error_response() -> Response {
    let mut resp = Response::new();
    resp.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    // A literal JSON object never fails to serialize.
    let _ = resp.set_json(&json!({ "title": "500 Internal Server Error" }));
    resp
}
