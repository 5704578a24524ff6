//! REST client for the content API.
//!
//! Entries live under `{url}/{model}`: a single entry is fetched with
//! `?id={entryID}`, lists with paging, sorting and filter parameters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vitrine_core::error::CoreError;

/// HTTP client for one content API (one data manager).
pub struct DatamanagerApi {
    client: reqwest::Client,
    url: String,
}

/// Paging, sorting and filtering for entry lists.
///
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntriesQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    /// Raw filter parameters, e.g. `title~ = "news"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<BTreeMap<String, String>>,
}

impl EntriesQuery {
    fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(size) = self.size {
            pairs.push(("size".to_string(), size.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page".to_string(), page.to_string()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort".to_string(), sort.clone()));
        }
        if let Some(filter) = &self.filter {
            pairs.extend(filter.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        pairs
    }

    /// Key identifying this query in caches. Built from the request's
    /// query pairs, quoted so values containing `&` or `=` stay distinct.
    pub fn cache_key(&self) -> String {
        format!("{:?}", self.to_query_pairs())
    }
}

/// Errors from the content API layer.
#[derive(Debug, thiserror::Error)]
pub enum DatamanagerError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The API returned a non-2xx status other than 404.
    #[error("Content API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid content API URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid content API response: {0}")]
    InvalidResponse(String),

    #[error("Missing model property in load request '{0}'")]
    MissingModel(String),

    #[error("Dynamic templates '{0}' not defined")]
    UnknownTemplateKind(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl DatamanagerApi {
    /// Create a client for the content API at `url`
    /// (e.g. `https://datamanager.example.com/api/beefbeef`).
    pub fn new(url: String) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, url: String) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch a single entry, optionally with `levels` of nested relations.
    pub async fn entry(
        &self,
        model: &str,
        entry_id: &str,
        levels: Option<u32>,
    ) -> Result<Value, DatamanagerError> {
        let mut params = vec![("id".to_string(), entry_id.to_string())];
        if let Some(levels) = levels {
            params.push(("_levels".to_string(), levels.to_string()));
        }

        let response = self
            .client
            .get(self.model_url(model)?)
            .query(&params)
            .send()
            .await?;

        let response =
            Self::ensure_success(response, || format!("entry {entry_id} of model {model}")).await?;
        Ok(response.json().await?)
    }

    /// Fetch a page of entries.
    pub async fn entries(
        &self,
        model: &str,
        query: &EntriesQuery,
    ) -> Result<Vec<Value>, DatamanagerError> {
        let response = self
            .client
            .get(self.model_url(model)?)
            .query(&query.to_query_pairs())
            .send()
            .await?;

        let response = Self::ensure_success(response, || format!("model {model}")).await?;
        let body: Value = response.json().await?;
        entries_from_list(body)
    }

    // ---- private helpers ----

    /// `{url}/{model}`, with the model as one encoded path segment.
    fn model_url(&self, model: &str) -> Result<reqwest::Url, DatamanagerError> {
        if matches!(model, "" | "." | "..") {
            return Err(CoreError::Validation(format!("invalid model name '{model}'")).into());
        }

        let mut url = reqwest::Url::parse(&self.url)
            .map_err(|e| DatamanagerError::InvalidUrl(format!("{}: {e}", self.url)))?;
        url.path_segments_mut()
            .map_err(|()| DatamanagerError::InvalidUrl(format!("{} cannot be a base", self.url)))?
            .pop_if_empty()
            .push(model);
        Ok(url)
    }

    /// Map 404 to [`DatamanagerError::NotFound`] and any other non-2xx
    /// status to [`DatamanagerError::Api`].
    async fn ensure_success(
        response: reqwest::Response,
        describe: impl FnOnce() -> String,
    ) -> Result<reqwest::Response, DatamanagerError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DatamanagerError::NotFound(describe()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(DatamanagerError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Extract the entries of a HAL list response.
///
/// Lists carry `count`/`total` and embed their items under a single
/// relation, as an array, or as a bare object when there is exactly one.
/// A response without list markers is a single entry.
fn entries_from_list(body: Value) -> Result<Vec<Value>, DatamanagerError> {
    let is_list = body.get("count").is_some() || body.get("total").is_some();
    if !is_list {
        return Ok(vec![body]);
    }

    let embedded = match body.get("_embedded") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(embedded)) => embedded,
        Some(_) => {
            return Err(DatamanagerError::InvalidResponse(
                "`_embedded` is not an object".into(),
            ))
        }
    };

    Ok(match embedded.values().next() {
        Some(Value::Array(items)) => items.clone(),
        Some(single) => vec![single.clone()],
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;

    // -- list extraction --

    #[test]
    fn list_items_come_from_first_embedded_relation() {
        let body = json!({
            "count": 2,
            "total": 2,
            "_embedded": { "beef:news": [{ "id": "a" }, { "id": "b" }] }
        });
        let entries = entries_from_list(body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["id"], "b");
    }

    #[test]
    fn single_item_list_is_unwrapped_object() {
        let body = json!({ "count": 1, "_embedded": { "beef:news": { "id": "a" } } });
        assert_eq!(entries_from_list(body).unwrap(), vec![json!({ "id": "a" })]);
    }

    #[test]
    fn non_list_response_is_one_entry() {
        let body = json!({ "id": "a", "title": "Hello" });
        assert_eq!(entries_from_list(body.clone()).unwrap(), vec![body]);
    }

    #[test]
    fn empty_list_has_no_entries() {
        assert!(entries_from_list(json!({ "count": 0, "total": 0 })).unwrap().is_empty());
    }

    #[test]
    fn query_pairs_keep_filter_parameters() {
        let query = EntriesQuery {
            size: Some(5),
            page: None,
            sort: Some("-created".into()),
            filter: Some(BTreeMap::from([("title~".to_string(), "news".to_string())])),
        };
        assert_eq!(
            query.to_query_pairs(),
            vec![
                ("size".to_string(), "5".to_string()),
                ("sort".to_string(), "-created".to_string()),
                ("title~".to_string(), "news".to_string()),
            ]
        );
    }

    #[test]
    fn cache_key_distinguishes_embedded_separators() {
        let split = EntriesQuery {
            filter: Some(BTreeMap::from([
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ])),
            ..Default::default()
        };
        let joined = EntriesQuery {
            filter: Some(BTreeMap::from([("a".to_string(), "1&b=2".to_string())])),
            ..Default::default()
        };
        assert_ne!(split.cache_key(), joined.cache_key());
        assert_eq!(split.cache_key(), split.clone().cache_key());
    }

    // -- HTTP --

    #[tokio::test]
    async fn entry_passes_id_and_levels() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/news")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("id".into(), "e1".into()),
                Matcher::UrlEncoded("_levels".into(), "2".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"e1","title":"Hello"}"#)
            .create_async()
            .await;

        let api = DatamanagerApi::new(server.url());
        let entry = api.entry("news", "e1", Some(2)).await.unwrap();

        assert_eq!(entry["title"], "Hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_entry_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/news")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let api = DatamanagerApi::new(server.url());
        let result = api.entry("news", "nope", None).await;
        assert_matches!(result, Err(DatamanagerError::NotFound(msg)) if msg.contains("nope"));
    }

    #[tokio::test]
    async fn model_is_sent_as_one_path_segment() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/api/news%2F\.\.%2Fusers$".into()))
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"e1"}"#)
            .create_async()
            .await;

        let api = DatamanagerApi::new(format!("{}/api", server.url()));
        api.entry("news/../users", "e1", None).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn dot_segment_model_is_rejected() {
        let api = DatamanagerApi::new("http://127.0.0.1:9".into());
        assert_matches!(
            api.entries("..", &EntriesQuery::default()).await,
            Err(DatamanagerError::Core(CoreError::Validation(_)))
        );
    }

    #[tokio::test]
    async fn server_error_keeps_status_and_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/news")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let api = DatamanagerApi::new(server.url());
        let result = api.entries("news", &EntriesQuery::default()).await;
        assert_matches!(
            result,
            Err(DatamanagerError::Api { status: 503, body }) if body == "maintenance"
        );
    }
}
