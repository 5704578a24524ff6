//! `Cache-Control` response headers.

use axum::extract::{Request, State};
use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

pub const NO_CACHE: &str = "no-cache";
pub const NO_STORE: &str = "no-store";
pub const PRIVATE: &str = "private";
pub const PUBLIC: &str = "public";

/// One year divided by twelve, in seconds.
pub const STATIC_MAX_AGE: u64 = 2_629_800;

/// Directives plus max-age for a group of routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age: u64,
    pub directives: Vec<&'static str>,
}

impl CachePolicy {
    pub fn new(max_age: u64, directives: Vec<&'static str>) -> Self {
        Self {
            max_age,
            directives,
        }
    }

    /// Public caching for `max_age` seconds.
    pub fn public(max_age: u64) -> Self {
        Self::new(max_age, vec![PUBLIC])
    }

    /// Policy sent when a request carries `cache=off`.
    pub fn disabled() -> Self {
        Self::new(0, vec![NO_CACHE])
    }

    pub fn header_value(&self) -> String {
        let mut parts: Vec<String> = self.directives.iter().map(|d| d.to_string()).collect();
        parts.push(format!("max-age={}", self.max_age));
        parts.join(", ")
    }
}

/// Set `Cache-Control` from the route's policy, or disable caching when
/// the query contains `cache=off`. A header set by an inner layer wins.
pub async fn cache_control(
    State(policy): State<CachePolicy>,
    request: Request,
    next: Next,
) -> Response {
    let policy = if cache_disabled(request.uri().query()) {
        CachePolicy::disabled()
    } else {
        policy
    };

    let mut response = next.run(request).await;
    if response.headers().contains_key(CACHE_CONTROL) {
        return response;
    }
    match HeaderValue::from_str(&policy.header_value()) {
        Ok(value) => {
            response.headers_mut().insert(CACHE_CONTROL, value);
        }
        Err(e) => tracing::warn!(error = %e, "Invalid Cache-Control value"),
    }
    response
}

fn cache_disabled(query: Option<&str>) -> bool {
    query.is_some_and(|q| q.split('&').any(|pair| pair == "cache=off"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_value_lists_directives_then_max_age() {
        assert_eq!(CachePolicy::public(300).header_value(), "public, max-age=300");
        assert_eq!(
            CachePolicy::new(60, vec![PRIVATE, NO_STORE]).header_value(),
            "private, no-store, max-age=60"
        );
        assert_eq!(CachePolicy::new(10, vec![]).header_value(), "max-age=10");
        assert_eq!(CachePolicy::disabled().header_value(), "no-cache, max-age=0");
    }

    #[test]
    fn cache_off_must_match_whole_pair() {
        assert!(cache_disabled(Some("cache=off")));
        assert!(cache_disabled(Some("page=2&cache=off")));
        assert!(!cache_disabled(Some("cache=offline")));
        assert!(!cache_disabled(Some("nocache=off")));
        assert!(!cache_disabled(None));
    }
}
