//! The response context.

use std::borrow::Cow;
use std::future::Future;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde::{de::DeserializeOwned, Serialize};

use crate::jobs::{Job, JobQueue};

/// The outgoing response being built by hooks and responders.
///
/// Besides status, headers, and body, a response carries:
///
/// - a completion flag; once set, the executor skips the remaining
///   request/resource hooks and the responder, but still runs response hooks
/// - a queue of background jobs, run in order after the response is sent
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    complete: bool,
    jobs: JobQueue,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// Creates an empty `200 OK` response.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            complete: false,
            jobs: JobQueue::new(),
        }
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns the headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets a header, replacing any existing value.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Sets a plain-text body.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.body = Bytes::from(text.into());
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
    }

    /// Serializes `value` as the JSON body.
    pub fn set_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        self.body = Bytes::from(serde_json::to_vec(value)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(())
    }

    /// Returns the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Returns true if processing was short-circuited.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Sets the completion flag.
    pub fn set_complete(&mut self, complete: bool) {
        self.complete = complete;
    }

    /// Schedules a future to run on the runtime after the response is sent.
    pub fn schedule<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.jobs.push(Job::event_loop(future));
    }

    /// Schedules a closure to run on a worker thread after the response is sent.
    pub fn schedule_blocking<F>(&mut self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.jobs.push(Job::thread(f));
    }

    /// Returns the queued jobs.
    #[must_use]
    pub const fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    /// Takes the queued jobs, leaving the queue empty.
    pub fn take_jobs(&mut self) -> JobQueue {
        std::mem::take(&mut self.jobs)
    }

    /// Converts into an [`http::Response`]. Queued jobs are dropped; take
    /// them first with [`Response::take_jobs`].
    #[must_use]
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobKind;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let response = Response::new();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.body().is_empty());
        assert!(!response.is_complete());
        assert!(response.jobs().is_empty());
    }

    #[test]
    fn test_text_body() {
        let mut response = Response::new();
        response.set_text("Hello, World!");
        assert_eq!(response.text(), "Hello, World!");
        assert_eq!(
            response.header("content-type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_json_body() {
        let mut response = Response::new();
        response.set_json(&json!({ "status": "ok" })).unwrap();

        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(response.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_schedule_keeps_order() {
        let mut response = Response::new();
        response.schedule(async {});
        response.schedule_blocking(|| {});

        let jobs = response.take_jobs();
        assert_eq!(
            jobs.kinds().collect::<Vec<_>>(),
            vec![JobKind::EventLoop, JobKind::Thread]
        );
        assert!(response.jobs().is_empty());
    }

    #[test]
    fn test_into_http() {
        let mut response = Response::new();
        response.set_status(StatusCode::CREATED);
        response.set_header(
            HeaderName::from_static("x-counter"),
            HeaderValue::from_static("0"),
        );

        let http_response = response.into_http();
        assert_eq!(http_response.status(), StatusCode::CREATED);
        assert_eq!(http_response.headers().get("x-counter").unwrap(), "0");
    }
}
