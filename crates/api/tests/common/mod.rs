use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use vitrine_api::config::ServerConfig;
use vitrine_api::router::build_app_router;
use vitrine_api::state::AppState;
use vitrine_core::assets::ApiContext;

/// Build a test `ServerConfig` rooted at `basedir`, talking to a content
/// API (and asset API) at `api_url`.
pub fn test_config(basedir: &Path, api_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_url: "https://www.example.com".to_string(),
        friendly_name: "vitrine-test".to_string(),
        cors_routes: vec!["/feeds".to_string()],
        request_timeout_secs: 30,
        basedir: basedir.to_path_buf(),
        datamanager_url: api_url.to_string(),
        datamanager_id: "beef".to_string(),
        datamanager_files_url: format!("{api_url}/files"),
        dm_config: Some(ApiContext::new("beefbeef", "live")),
        asset_api_environments: HashMap::from([("live".to_string(), api_url.to_string())]),
        memory_cache_ttl_secs: 60,
        page_cache_ttl_secs: 300,
        disable_template_cache: false,
        dynamic_templates: HashMap::from([("teaser".to_string(), "teasers".to_string())]),
        csp_sources: BTreeMap::new(),
        timezone: chrono_tz::UTC,
        locale: chrono::Locale::en_US,
    }
}

/// A site directory with `views/` and `static/` subdirectories.
pub struct TestSite {
    pub dir: TempDir,
}

impl TestSite {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("views")).unwrap();
        std::fs::create_dir_all(dir.path().join("static")).unwrap();
        Self { dir }
    }

    pub fn view(self, name: &str, source: &str) -> Self {
        write_file(&self.dir.path().join("views").join(name), source);
        self
    }

    pub fn static_file(self, name: &str, contents: &str) -> Self {
        write_file(&self.dir.path().join("static").join(name), contents);
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Build the full application router with all middleware layers.
///
/// Must be called from within a Tokio runtime.
pub fn build_test_app(config: ServerConfig) -> Router {
    build_app_router(AppState::new(config))
}

/// Send a GET request through the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
