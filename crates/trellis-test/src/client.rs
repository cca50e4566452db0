//! In-memory test client.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method};
use serde::Serialize;
use trellis_server::App;

use crate::error::TestError;
use crate::request::TestRequestBuilder;
use crate::response::TestResponse;

/// Drives an [`App`] without a network.
///
/// Requests pass through the full middleware pipeline and error handler
/// registry; background jobs are submitted exactly as they would be in
/// production.
#[derive(Debug, Clone)]
pub struct TestClient {
    app: Arc<App>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client that owns `app`.
    pub fn new(app: App) -> Self {
        Self::from_arc(Arc::new(app))
    }

    /// Creates a client over a shared app.
    pub fn from_arc(app: Arc<App>) -> Self {
        Self {
            app,
            default_headers: Vec::new(),
        }
    }

    /// Returns the app under test.
    #[must_use]
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Starts a `GET` request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Starts a `POST` request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Starts a `PUT` request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Starts a `PATCH` request.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PATCH, uri)
    }

    /// Starts a `DELETE` request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Starts an `OPTIONS` request.
    pub fn options(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::OPTIONS, uri)
    }

    /// Starts a `HEAD` request.
    pub fn head(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::HEAD, uri)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        let builder = self
            .default_headers
            .iter()
            .fold(TestRequestBuilder::new(method, uri), |b, (name, value)| {
                b.header(name, value)
            });
        TestClientRequest {
            app: &self.app,
            builder,
        }
    }

    /// Waits for every background job the app has accepted.
    pub async fn wait_for_jobs(&self) {
        self.app.wait_for_jobs().await;
    }
}

/// A request being built by a [`TestClient`].
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    app: &'a App,
    builder: TestRequestBuilder,
}

impl TestClientRequest<'_> {
    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Adds a typed header.
    #[must_use]
    pub fn header_typed(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.builder = self.builder.header_typed(name, value);
        self
    }

    /// Sets `Content-Type`.
    #[must_use]
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.builder = self.builder.content_type(content_type);
        self
    }

    /// Sets `Origin`.
    #[must_use]
    pub fn origin(mut self, origin: impl AsRef<str>) -> Self {
        self.builder = self.builder.origin(origin);
        self
    }

    /// Sets a bearer `Authorization` header.
    #[must_use]
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.bearer_token(token);
        self
    }

    /// Sets the raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request. An unhandled error becomes a `500` response.
    ///
    /// # Panics
    ///
    /// Panics if the request could not be built.
    pub async fn send(self) -> TestResponse {
        let request = match self.builder.build() {
            Ok(request) => request,
            Err(e) => panic!("Failed to build test request: {e}"),
        };
        TestResponse::from(self.app.respond(request).await)
    }

    /// Sends the request, returning an unhandled error instead of
    /// converting it to `500`.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        let response = self.app.handle(request).await?;
        Ok(TestResponse::from(response))
    }

    /// Blocking form of [`send`](Self::send), for apps running in blocking
    /// mode. Must not be called from inside an async runtime.
    ///
    /// # Panics
    ///
    /// Panics if the request could not be built or the app refused to
    /// block.
    pub fn send_blocking(self) -> TestResponse {
        let request = match self.builder.build() {
            Ok(request) => request,
            Err(e) => panic!("Failed to build test request: {e}"),
        };
        match self.app.respond_blocking(request) {
            Ok(response) => TestResponse::from(response),
            Err(e) => panic!("Failed to send test request: {e}"),
        }
    }

    /// Blocking form of [`try_send`](Self::try_send).
    pub fn try_send_blocking(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        let response = self.app.handle_blocking(request)?;
        Ok(TestResponse::from(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trellis_core::{ExecutionMode, HttpError, Resource};

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    fn app() -> App {
        let mut app = App::new();
        app.add_route(
            "/echo",
            Resource::new("echo")
                .on_get(|req, resp, _| {
                    let auth = req.header("authorization").unwrap_or("none").to_string();
                    resp.set_text(auth);
                    Ok(())
                })
                .on_post(|req, resp, _| {
                    resp.set_status(StatusCode::CREATED);
                    resp.set_body(req.body().clone());
                    Ok(())
                }),
        )
        .unwrap();
        app.add_route(
            "/teapot",
            Resource::new("teapot").on_get(|_, _, _| Err(HttpError::new(StatusCode::IM_A_TEAPOT).into())),
        )
        .unwrap();
        app.add_route(
            "/boom",
            Resource::new("boom").on_get(|_, _, _| Err(trellis_core::HookError::app(Boom))),
        )
        .unwrap();
        app
    }

    #[tokio::test]
    async fn test_get_with_default_header() {
        let client = TestClient::new(app()).with_default_header("Authorization", "Bearer abc");
        client
            .get("/echo")
            .send()
            .await
            .assert_status(StatusCode::OK)
            .assert_body_eq("Bearer abc");
    }

    #[tokio::test]
    async fn test_post_json_echoes_body() {
        let client = TestClient::new(app());
        let response = client.post("/echo").json(&json!({ "n": 1 })).send().await;
        response.assert_status(StatusCode::CREATED);
        response.assert_json_field("n", &json!(1));
    }

    #[tokio::test]
    async fn test_http_error_uses_default_handler() {
        let client = TestClient::new(app());
        let response = client.get("/teapot").send().await;
        response.assert_status_code(418);
        response.assert_json_field("title", &json!("418 I'm a teapot"));
    }

    #[tokio::test]
    async fn test_unhandled_error_send_and_try_send() {
        let mut app = app();
        app.clear_error_handlers();
        let client = TestClient::new(app);

        client
            .get("/boom")
            .send()
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let error = client.get("/boom").try_send().await.unwrap_err();
        assert!(error.as_unhandled().unwrap().is::<Boom>());
    }

    #[tokio::test]
    async fn test_try_send_reports_build_error() {
        let client = TestClient::new(app());
        let error = client.get("no-slash").try_send().await.unwrap_err();
        assert!(matches!(error, TestError::RequestBuild(_)));
    }

    #[tokio::test]
    async fn test_wait_for_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let mut app = App::new();
        app.add_route(
            "/job",
            Resource::new("job").on_get(move |_, resp, _| {
                let seen = Arc::clone(&seen);
                resp.schedule_blocking(move || {
                    seen.fetch_add(1, Ordering::SeqCst);
                });
                Ok(())
            }),
        )
        .unwrap();

        let client = TestClient::new(app);
        client.get("/job").send().await.assert_status(StatusCode::OK);
        client.wait_for_jobs().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blocking_send() {
        let mut app = App::builder()
            .execution(ExecutionMode::Blocking)
            .build()
            .unwrap();
        app.add_route(
            "/ping",
            Resource::new("ping").on_get(|_, resp, _| {
                resp.set_text("pong");
                Ok(())
            }),
        )
        .unwrap();

        let client = TestClient::new(app);
        client.get("/ping").send_blocking().assert_body_eq("pong");
        client
            .get("/missing")
            .try_send_blocking()
            .unwrap()
            .assert_status(StatusCode::NOT_FOUND);
    }
}
