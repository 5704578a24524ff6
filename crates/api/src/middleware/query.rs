//! Query-string key normalization.

use axum::extract::Request;
use axum::http::uri::PathAndQuery;
use axum::http::Uri;
use axum::middleware::Next;
use axum::response::Response;

/// Lowercase every query key before the request is routed. Values are kept.
pub async fn lowercase_query_keys(mut request: Request, next: Next) -> Response {
    if let Some(uri) = with_lowercase_query(request.uri()) {
        *request.uri_mut() = uri;
    }
    next.run(request).await
}

fn lowercase_query(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => format!("{}={value}", key.to_lowercase()),
            None => pair.to_lowercase(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// The rewritten URI, or `None` when nothing changes.
fn with_lowercase_query(uri: &Uri) -> Option<Uri> {
    let query = uri.query()?;
    let lowered = lowercase_query(query);
    if lowered == query {
        return None;
    }

    let path_and_query: PathAndQuery = format!("{}?{lowered}", uri.path()).parse().ok()?;
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    Uri::from_parts(parts).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_lowercased_values_kept() {
        assert_eq!(lowercase_query("Page=2&SORT=Title"), "page=2&sort=Title");
        assert_eq!(lowercase_query("Flag&x=Y"), "flag&x=Y");
    }

    #[test]
    fn uri_is_rewritten_only_when_needed() {
        let uri: Uri = "/news?Cache=off".parse().unwrap();
        assert_eq!(with_lowercase_query(&uri).unwrap(), "/news?cache=off");

        let unchanged: Uri = "/news?cache=off".parse().unwrap();
        assert!(with_lowercase_query(&unchanged).is_none());
        assert!(with_lowercase_query(&"/news".parse().unwrap()).is_none());
    }
}
