//! HTTP middleware applied by the router.
//!
//! - [`headers::security_headers`] -- security, CSP and CORS headers; answers `OPTIONS`.
//! - [`cache::cache_control`] -- `Cache-Control` per route group, `?cache=off` override.
//! - [`query::lowercase_query_keys`] -- lowercases query keys before routing.

pub mod cache;
pub mod csp;
pub mod headers;
pub mod query;
