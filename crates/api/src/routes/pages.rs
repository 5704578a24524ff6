//! Site pages rendered from the views directory.
//!
//! `/` renders `index.html`; any other path `/a/b` renders `a/b.html`.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::http::{Method, Uri};
use axum::middleware;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use minijinja::context;
use vitrine_core::error::CoreError;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::cache::{cache_control, CachePolicy};
use crate::state::AppState;

const INDEX_TEMPLATE: &str = "index.html";

/// GET / -- the site index.
async fn index(
    State(state): State<AppState>,
    Query(query): Query<BTreeMap<String, String>>,
) -> AppResult<Html<String>> {
    render_page(&state, INDEX_TEMPLATE, "/", query).await
}

/// GET /{*path} -- the template named after the path.
async fn page(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Query(query): Query<BTreeMap<String, String>>,
) -> AppResult<Html<String>> {
    let path = uri.path();
    if method != Method::GET && method != Method::HEAD {
        return Err(page_not_found(path));
    }
    let name = template_name(path).ok_or_else(|| page_not_found(path))?;
    render_page(&state, &name, path, query).await
}

async fn render_page(
    state: &AppState,
    name: &str,
    path: &str,
    query: BTreeMap<String, String>,
) -> AppResult<Html<String>> {
    tracing::debug!(template = name, "Rendering page");
    let html = state
        .renderer
        .render(name, context! { path => path, query => query })
        .await?;
    Ok(Html(html))
}

/// Template for a request path; `None` for empty, `.` or `..` segments.
fn template_name(path: &str) -> Option<String> {
    let trimmed = path.trim_matches('/');
    let valid = !trimmed.is_empty()
        && trimmed
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    valid.then(|| format!("{trimmed}.html"))
}

fn page_not_found(path: &str) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Page",
        id: path.to_string(),
    })
}

/// Mount the index route and the page fallback, both cached for
/// `PAGE_CACHE_TTL_SECS`.
pub fn router(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .fallback(page)
        .layer(middleware::from_fn_with_state(
            CachePolicy::public(config.page_cache_ttl_secs),
            cache_control,
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_maps_to_html_template() {
        assert_eq!(template_name("/about").as_deref(), Some("about.html"));
        assert_eq!(template_name("/news/2024/").as_deref(), Some("news/2024.html"));
    }

    #[test]
    fn traversal_and_empty_segments_are_rejected() {
        assert_eq!(template_name("/../secret"), None);
        assert_eq!(template_name("/news/./item"), None);
        assert_eq!(template_name("/news//item"), None);
        assert_eq!(template_name("/"), None);
    }
}
