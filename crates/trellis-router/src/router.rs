//! Template router.

use thiserror::Error;

use crate::params::Params;

/// Errors raised while registering a route template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The template is malformed.
    #[error("invalid route template '{template}': {reason}")]
    InvalidTemplate {
        /// The offending template.
        template: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A template with the same shape is already registered.
    #[error("route template '{template}' conflicts with existing route '{existing}'")]
    Conflict {
        /// The template being registered.
        template: String,
        /// The template already in the table.
        existing: String,
    },
}

impl RouteError {
    fn invalid(template: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template: template.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

impl Segment {
    const fn is_param(&self) -> bool {
        matches!(self, Self::Param(_))
    }
}

#[derive(Debug, Clone)]
struct Route<T> {
    template: String,
    segments: Vec<Segment>,
    value: T,
}

/// Result of a successful match.
#[derive(Debug)]
pub struct RouteMatch<'r, T> {
    /// The value registered for the template.
    pub value: &'r T,
    /// The template that matched.
    pub template: &'r str,
    /// Parameters captured from the path.
    pub params: Params,
}

/// A table of URI templates.
///
/// Matching is linear in the number of routes; an application registers a
/// bounded set of resources at setup time and the table is read-only while
/// serving.
#[derive(Debug, Clone)]
pub struct Router<T> {
    routes: Vec<Route<T>>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers a template.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidTemplate`] when the template does not
    /// start with `/`, has an empty or unterminated `{}` segment, or repeats
    /// a parameter name; [`RouteError::Conflict`] when a template of the same
    /// shape already exists (for example `/a/{x}` after `/a/{y}`).
    pub fn insert(&mut self, template: &str, value: T) -> Result<(), RouteError> {
        let segments = parse_template(template)?;

        if let Some(existing) = self
            .routes
            .iter()
            .find(|route| same_shape(&route.segments, &segments))
        {
            return Err(RouteError::Conflict {
                template: template.to_string(),
                existing: existing.template.clone(),
            });
        }

        self.routes.push(Route {
            template: template.to_string(),
            segments,
            value,
        });
        Ok(())
    }

    /// Matches a request path against the table.
    pub fn match_path(&self, path: &str) -> Option<RouteMatch<'_, T>> {
        let parts = split_path(path);

        self.routes
            .iter()
            .filter(|route| route.segments.len() == parts.len())
            .filter(|route| {
                route
                    .segments
                    .iter()
                    .zip(&parts)
                    .all(|(segment, part)| match segment {
                        Segment::Literal(lit) => lit == part,
                        Segment::Param(_) => !part.is_empty(),
                    })
            })
            // Literal segments sort before parameters, left to right.
            .min_by_key(|route| {
                route
                    .segments
                    .iter()
                    .map(Segment::is_param)
                    .collect::<Vec<_>>()
            })
            .map(|route| {
                let mut params = Params::new();
                for (segment, part) in route.segments.iter().zip(&parts) {
                    if let Segment::Param(name) = segment {
                        params.push(name.clone(), *part);
                    }
                }
                RouteMatch {
                    value: &route.value,
                    template: &route.template,
                    params,
                }
            })
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns the registered templates in insertion order.
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.template.as_str())
    }
}

fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.trim_start_matches('/');
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

fn parse_template(template: &str) -> Result<Vec<Segment>, RouteError> {
    if !template.starts_with('/') {
        return Err(RouteError::invalid(template, "must start with '/'"));
    }

    let mut segments = Vec::new();
    for part in split_path(template) {
        let segment = match part.strip_prefix('{') {
            Some(rest) => {
                let name = rest
                    .strip_suffix('}')
                    .ok_or_else(|| RouteError::invalid(template, "unterminated parameter"))?;
                if name.is_empty() {
                    return Err(RouteError::invalid(template, "empty parameter name"));
                }
                if segments
                    .iter()
                    .any(|s| matches!(s, Segment::Param(existing) if existing == name))
                {
                    return Err(RouteError::invalid(
                        template,
                        format!("duplicate parameter '{name}'"),
                    ));
                }
                Segment::Param(name.to_string())
            }
            None if part.contains('{') || part.contains('}') => {
                return Err(RouteError::invalid(
                    template,
                    "parameters must span a whole segment",
                ));
            }
            None => Segment::Literal(part.to_string()),
        };
        segments.push(segment);
    }
    Ok(segments)
}

fn same_shape(a: &[Segment], b: &[Segment]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (Segment::Literal(x), Segment::Literal(y)) => x == y,
            (Segment::Param(_), Segment::Param(_)) => true,
            _ => false,
        })
}
