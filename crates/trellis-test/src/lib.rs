//! # Trellis Test
//!
//! In-memory testing for Trellis applications. Requests go through the
//! complete middleware pipeline, error handler registry, and background job
//! runner without opening a socket.
//!
//! ## Example
//!
//! ```no_run
//! use trellis_core::Resource;
//! use trellis_server::App;
//! use trellis_test::TestClient;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut app = App::new();
//! app.add_route(
//!     "/ping",
//!     Resource::new("ping").on_get(|_req, resp, _params| {
//!         resp.set_text("pong");
//!         Ok(())
//!     }),
//! )?;
//!
//! let client = TestClient::new(app);
//! client
//!     .get("/ping")
//!     .send()
//!     .await
//!     .assert_status_code(200)
//!     .assert_body_eq("pong");
//! # Ok(())
//! # }
//! ```
//!
//! Use [`TestClientRequest::try_send`] to observe an error that no handler
//! accepted, and the `*_blocking` variants for apps built in blocking mode.

#![doc(html_root_url = "https://docs.rs/trellis-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::TestRequestBuilder;
pub use response::TestResponse;
