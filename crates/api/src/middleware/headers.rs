//! Security, CSP and CORS response headers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_REQUEST_HEADERS, STRICT_TRANSPORT_SECURITY,
    X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::csp::{ContentSecurityPolicy, CSP_HEADERS};
use crate::config::ServerConfig;

const ALLOWED_METHODS: &str = "GET, PUT, POST, DELETE, OPTIONS";
const PREFLIGHT_BODY: &str = "GET,HEAD,POST,PUT,DELETE";

/// Precomputed header values shared by every request.
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    powered_by: HeaderValue,
    csp: HeaderValue,
    public_origin: HeaderValue,
    cors_routes: Vec<String>,
}

impl HeaderPolicy {
    /// Build the policy from server configuration.
    ///
    /// Panics at startup if a configured value is not a valid header value,
    /// so misconfiguration fails fast.
    pub fn new(config: &ServerConfig, csp: &ContentSecurityPolicy) -> Self {
        let powered_by = format!(
            "entrecode {} v{} (w{})",
            config.friendly_name,
            env!("CARGO_PKG_VERSION"),
            std::process::id()
        );
        Self {
            powered_by: header_value(&powered_by),
            csp: header_value(&csp.header_value()),
            public_origin: header_value(&config.public_url),
            cors_routes: config.cors_routes.clone(),
        }
    }

    fn allows_any_origin(&self, path: &str) -> bool {
        self.cors_routes.iter().any(|route| path.starts_with(route.as_str()))
    }

    fn apply(&self, headers: &mut HeaderMap, any_origin: bool, requested: Option<HeaderValue>) {
        headers.insert(HeaderName::from_static("x-powered-by"), self.powered_by.clone());
        headers.insert(
            STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000"),
        );
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

        for name in CSP_HEADERS {
            headers.insert(HeaderName::from_static(name), self.csp.clone());
        }

        // -- CORS --
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        let origin = if any_origin {
            HeaderValue::from_static("*")
        } else {
            self.public_origin.clone()
        };
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from_static("Allow"));
        if let Some(requested) = requested {
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested);
        }
    }
}

fn header_value(raw: &str) -> HeaderValue {
    HeaderValue::from_str(raw).unwrap_or_else(|e| panic!("Invalid header value '{raw}': {e}"))
}

/// Add security, CSP and CORS headers to every response.
///
/// `OPTIONS` requests are answered directly with the allowed methods.
pub async fn security_headers(
    State(policy): State<Arc<HeaderPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let any_origin = policy.allows_any_origin(request.uri().path());
    let requested = request.headers().get(ACCESS_CONTROL_REQUEST_HEADERS).cloned();

    let mut response = if request.method() == Method::OPTIONS {
        (StatusCode::OK, PREFLIGHT_BODY).into_response()
    } else {
        next.run(request).await
    };

    policy.apply(response.headers_mut(), any_origin, requested);
    response
}
