//! # Trellis Router
//!
//! Path-template routing for the Trellis framework.
//!
//! Routes are registered as URI templates such as `/things/{id}`. A template
//! is a sequence of `/`-separated segments, each either a literal or a
//! `{name}` parameter. Matching a request path yields the stored value, the
//! template that matched, and the extracted [`Params`].
//!
//! The router runs *after* the request phase of the middleware pipeline, so
//! request hooks may rewrite the path before it is matched.
//!
//! ## Example
//!
//! ```rust
//! use trellis_router::Router;
//!
//! let mut router = Router::new();
//! router.insert("/things", "things").unwrap();
//! router.insert("/things/{id}", "thing").unwrap();
//!
//! let matched = router.match_path("/things/22").unwrap();
//! assert_eq!(*matched.value, "thing");
//! assert_eq!(matched.template, "/things/{id}");
//! assert_eq!(matched.params.get("id"), Some("22"));
//! ```
//!
//! ## Priority
//!
//! When several templates match the same path, literal segments win over
//! parameters, compared left to right. `/users/me` beats `/users/{id}` for
//! the path `/users/me`.

#![doc(html_root_url = "https://docs.rs/trellis-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod params;
mod router;

pub use params::Params;
pub use router::{RouteError, RouteMatch, Router};
