//! Built-in middleware components.

pub mod cors;

pub use cors::{AllowedOrigins, CorsBuilder, CorsConfig, CorsMiddleware, CORS_COMPONENT};
