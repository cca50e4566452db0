//! Resource dispatch seam.

use std::sync::Arc;

use trellis_core::{Params, Request, Resource};
use trellis_router::Router;

/// A routed request: the resource to run plus captured parameters.
#[derive(Debug, Clone)]
pub struct Route {
    /// The matched resource.
    pub resource: Arc<Resource>,
    /// Parameters captured from the path.
    pub params: Params,
    /// The template that matched.
    pub template: String,
}

/// Maps a request to a resource. Called once per request, after the
/// request phase, so request hooks may rewrite the path first.
pub trait Dispatcher: Send + Sync {
    /// Returns the route for `req`, or `None` when nothing matches.
    fn route(&self, req: &Request) -> Option<Route>;
}

impl Dispatcher for Router<Arc<Resource>> {
    fn route(&self, req: &Request) -> Option<Route> {
        self.match_path(req.path()).map(|matched| Route {
            resource: Arc::clone(matched.value),
            params: matched.params,
            template: matched.template.to_string(),
        })
    }
}
