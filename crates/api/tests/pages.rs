//! Integration tests for page rendering, template filters and caching headers.

mod common;

use axum::http::StatusCode;
use common::{body_json, body_string, get, TestSite};
use mockito::{Matcher, Server};

const UNREACHABLE_API: &str = "http://127.0.0.1:9";

fn app(site: &TestSite, api_url: &str) -> axum::Router {
    common::build_test_app(common::test_config(site.path(), api_url))
}

// ---------------------------------------------------------------------------
// Test: GET / renders index.html with page caching
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn index_renders_with_cache_headers() {
    let site = TestSite::new().view("index.html", "<h1>Home {{ path }}</h1>");
    let response = get(app(&site, UNREACHABLE_API), "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "public, max-age=300");
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(body_string(response).await.contains("<h1>Home"));
}

// ---------------------------------------------------------------------------
// Test: nested paths render the matching template
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn nested_path_renders_template() {
    let site = TestSite::new().view("news/item.html", "item page");
    let response = get(app(&site, UNREACHABLE_API), "/news/item").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "item page");
}

// ---------------------------------------------------------------------------
// Test: unknown pages and traversal attempts return 404
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn unknown_page_returns_404() {
    let site = TestSite::new();
    let response = get(app(&site, UNREACHABLE_API), "/this-page-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test(flavor = "multi_thread")]
async fn traversal_path_returns_404() {
    let site = TestSite::new().view("index.html", "home");
    let response = get(app(&site, UNREACHABLE_API), "/news/../index").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: query keys are lowercased and cache=off disables caching
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn query_keys_are_lowercased_and_cache_can_be_disabled() {
    let site = TestSite::new().view("list.html", "page {{ query.page }}");
    let response = get(app(&site, UNREACHABLE_API), "/list?PAGE=2&Cache=off").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "no-cache, max-age=0");
    assert_eq!(body_string(response).await, "page 2");
}

// ---------------------------------------------------------------------------
// Test: CORS routes allow any origin
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn cors_route_allows_any_origin() {
    let site = TestSite::new().view("feeds/latest.html", "[]");
    let response = get(app(&site, UNREACHABLE_API), "/feeds/latest").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

// ---------------------------------------------------------------------------
// Test: static files are served from the site root with long-lived caching
// ---------------------------------------------------------------------------

#[tokio::test]
async fn static_files_are_served_with_public_caching() {
    let site = TestSite::new().static_file("css/site.css", "body{}");
    let response = get(app(&site, UNREACHABLE_API), "/css/site.css").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "public, max-age=2629800");
    assert_eq!(body_string(response).await, "body{}");
}

#[tokio::test(flavor = "multi_thread")]
async fn paths_without_static_file_render_pages() {
    let site = TestSite::new()
        .static_file("css/site.css", "body{}")
        .view("about.html", "about page");
    let response = get(app(&site, UNREACHABLE_API), "/about").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "public, max-age=300");
    assert_eq!(body_string(response).await, "about page");
}

// ---------------------------------------------------------------------------
// Test: image filter picks the smallest variant covering the size
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn image_filter_negotiates_inline_asset() {
    let site = TestSite::new().view(
        "hero.html",
        r#"{% set asset = {
            "assetID": "a1",
            "type": "image",
            "files": [
                {"url": "https://cdn/a1_600.jpg", "resolution": {"width": 600, "height": 400}},
                {"url": "https://cdn/a1_300.jpg", "resolution": {"width": 300, "height": 200}},
                {"url": "https://cdn/a1_150.jpg", "resolution": {"width": 150, "height": 100}}
            ]
        } %}[{{ asset | image(250) }}][{{ asset | image }}][{{ none | image }}]"#,
    );
    let response = get(app(&site, UNREACHABLE_API), "/hero").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    let parts: Vec<&str> = body.split("][").collect();
    assert!(parts[0].ends_with("a1_300.jpg"), "{body}");
    assert!(parts[1].ends_with("a1_600.jpg"), "{body}");
}

// ---------------------------------------------------------------------------
// Test: structural negotiation errors fail the render
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn missing_embedded_field_fails_render() {
    let site = TestSite::new().view(
        "broken.html",
        r#"{{ {"_embedded": {"beef:news/other/asset": {}}} | image("hero") }}"#,
    );
    let response = get(app(&site, UNREACHABLE_API), "/broken").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "RENDER_ERROR");
}

// ---------------------------------------------------------------------------
// Test: asset IDs are negotiated through the remote API of _dm_config
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn asset_id_is_resolved_remotely() {
    let mut server = Server::new_async().await;
    let found = server
        .mock("GET", "/beefbeef/files/a1/url")
        .match_query(Matcher::UrlEncoded("size".into(), "400".into()))
        .with_header("content-type", "application/json")
        .with_body(r#"{"url":"https://cdn/a1_400.jpg"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/beefbeef/files/gone/url")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;

    let site = TestSite::new().view(
        "remote.html",
        r#"[{{ "a1" | image(400) }}][{{ "gone" | image(400) }}]"#,
    );
    let response = get(app(&site, &server.url()), "/remote").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("a1_400.jpg"), "{body}");
    // Remote not-found renders as empty output.
    assert!(body.ends_with("[]"), "{body}");
    found.assert_async().await;
}

// ---------------------------------------------------------------------------
// Test: dm_load fetches entries for the template
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn dm_load_provides_entries_to_template() {
    let mut server = Server::new_async().await;
    let entry = server
        .mock("GET", "/news")
        .match_query(Matcher::UrlEncoded("id".into(), "e1".into()))
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"e1","title":"Launch"}"#)
        .create_async()
        .await;
    let list = server
        .mock("GET", "/news")
        .match_query(Matcher::UrlEncoded("size".into(), "2".into()))
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"count":2,"total":2,"_embedded":{"beef:news":[{"title":"A"},{"title":"B"}]}}"#,
        )
        .create_async()
        .await;

    let site = TestSite::new().view(
        "news.html",
        r#"{% set data = dm_load({"top": {"model": "news", "entryID": "e1"}, "latest": {"model": "news", "size": 2}}) %}{{ data.top.title }}:{% for item in data.latest %}{{ item.title }}{% endfor %}"#,
    );
    let response = get(app(&site, &server.url()), "/news").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "Launch:AB");
    entry.assert_async().await;
    list.assert_async().await;
}

// ---------------------------------------------------------------------------
// Test: dynamic templates are included from the content API
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn dynamic_template_is_included() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/teasers")
        .match_query(Matcher::UrlEncoded("id".into(), "t1".into()))
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"t1","style":"p{}","content":"teaser {{ path }}"}"#)
        .create_async()
        .await;

    let site = TestSite::new().view("promo.html", r#"{% include "teaser-t1" %}"#);
    let response = get(app(&site, &server.url()), "/promo").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response).await,
        "<style>p{}</style>\nteaser /promo"
    );
}

// ---------------------------------------------------------------------------
// Test: content API failures during rendering keep their status
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn load_request_without_model_returns_400() {
    let site = TestSite::new().view(
        "broken-load.html",
        r#"{% set data = dm_load({"top": {"entryID": "e1"}}) %}{{ data.top }}"#,
    );
    let response = get(app(&site, UNREACHABLE_API), "/broken-load").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_content_api_returns_502() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/news")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let site = TestSite::new().view("entry.html", r#"{{ ("e1" | dm_entry("news")).title }}"#);
    let response = get(app(&site, &server.url()), "/entry").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UPSTREAM_ERROR");
    assert!(!json["error"].as_str().unwrap().contains("maintenance"));
}
