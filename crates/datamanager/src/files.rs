//! HTTP implementation of the asset URL API.
//!
//! `GET {files_url}/{assetID}/url[?size=N][&thumb=true]` answers
//! `{"url": "..."}`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use vitrine_core::assets::{ApiContext, AssetApi, AssetApiFactory, RemoteAssetError};

/// Environment used when a context names an environment without a
/// configured base URL.
pub const DEFAULT_ENVIRONMENT: &str = "live";

#[derive(Debug, Deserialize)]
struct FileUrlResponse {
    url: String,
}

/// Asset URL client for one files endpoint.
pub struct FileUrlApi {
    client: reqwest::Client,
    files_url: String,
}

impl FileUrlApi {
    pub fn new(client: reqwest::Client, files_url: String) -> Self {
        Self {
            client,
            files_url: files_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn files_url(&self) -> &str {
        &self.files_url
    }

    /// `{files_url}/{asset_id}/url`, with the ID as one encoded path segment.
    fn endpoint(&self, asset_id: &str) -> Result<reqwest::Url, RemoteAssetError> {
        // Dot segments would be dropped instead of encoded.
        if matches!(asset_id, "" | "." | "..") {
            return Err(RemoteAssetError::NotFound(asset_id.to_string()));
        }

        let mut url = reqwest::Url::parse(&self.files_url)
            .map_err(|e| RemoteAssetError::Request(format!("invalid files URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| RemoteAssetError::Request("files URL cannot be a base".into()))?
            .pop_if_empty()
            .push(asset_id)
            .push("url");
        Ok(url)
    }

    async fn request_url(
        &self,
        asset_id: &str,
        size: Option<u32>,
        thumb: bool,
    ) -> Result<String, RemoteAssetError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(size) = size {
            params.push(("size", size.to_string()));
        }
        if thumb {
            params.push(("thumb", "true".to_string()));
        }

        let response = self
            .client
            .get(self.endpoint(asset_id)?)
            .query(&params)
            .send()
            .await
            .map_err(|e| RemoteAssetError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RemoteAssetError::NotFound(asset_id.to_string()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RemoteAssetError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: FileUrlResponse = response
            .json()
            .await
            .map_err(|e| RemoteAssetError::Request(e.to_string()))?;
        Ok(body.url)
    }
}

#[async_trait]
impl AssetApi for FileUrlApi {
    async fn file_url(&self, asset_id: &str) -> Result<String, RemoteAssetError> {
        self.request_url(asset_id, None, false).await
    }

    async fn image_url(
        &self,
        asset_id: &str,
        min_size: Option<u32>,
    ) -> Result<String, RemoteAssetError> {
        self.request_url(asset_id, min_size, false).await
    }

    async fn thumbnail_url(
        &self,
        asset_id: &str,
        size: Option<u32>,
    ) -> Result<String, RemoteAssetError> {
        self.request_url(asset_id, size, true).await
    }
}

/// Builds [`FileUrlApi`] clients for API contexts.
///
/// Each environment maps to a base URL; a context's files endpoint is
/// `{base}/{context.id}/files`. All clients share one connection pool.
pub struct HttpAssetApiFactory {
    client: reqwest::Client,
    environments: HashMap<String, String>,
}

impl HttpAssetApiFactory {
    pub fn new(client: reqwest::Client, environments: HashMap<String, String>) -> Self {
        Self {
            client,
            environments,
        }
    }

    fn base_url(&self, environment: &str) -> Option<&str> {
        self.environments
            .get(environment)
            .or_else(|| self.environments.get(DEFAULT_ENVIRONMENT))
            .map(String::as_str)
    }
}

impl AssetApiFactory for HttpAssetApiFactory {
    fn create(&self, context: &ApiContext) -> Arc<dyn AssetApi> {
        if !self.environments.contains_key(&context.environment) {
            tracing::warn!(
                environment = %context.environment,
                "No base URL configured for asset API environment, using '{DEFAULT_ENVIRONMENT}'"
            );
        }
        let base = self.base_url(&context.environment).unwrap_or_default();
        let files_url = format!("{}/{}/files", base.trim_end_matches('/'), context.id);
        Arc::new(FileUrlApi::new(self.client.clone(), files_url))
    }
}
