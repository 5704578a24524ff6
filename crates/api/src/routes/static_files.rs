use axum::middleware;
use axum::Router;
use tower_http::services::ServeDir;

use crate::config::ServerConfig;
use crate::middleware::cache::{cache_control, CachePolicy, STATIC_MAX_AGE};

/// Serve `{basedir}/static` at the site root with long-lived public
/// caching, handing every request without a matching file to `pages`.
///
/// Pages set their own `Cache-Control`, which the static policy leaves
/// in place.
pub fn service(config: &ServerConfig, pages: Router) -> Router {
    let files = ServeDir::new(config.static_dir())
        .call_fallback_on_method_not_allowed(true)
        .fallback(pages);

    Router::new().fallback_service(files).layer(middleware::from_fn_with_state(
        CachePolicy::public(STATIC_MAX_AGE),
        cache_control,
    ))
}
