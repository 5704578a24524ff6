//! Remote asset API seam and the per-context client registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::RemoteAssetError;

/// Identity of a remote content API: the data manager's short ID plus the
/// environment it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiContext {
    pub id: String,
    pub environment: String,
}

impl ApiContext {
    pub fn new(id: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            environment: environment.into(),
        }
    }
}

impl fmt::Display for ApiContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.environment)
    }
}

/// Resolves bare asset IDs to URLs.
#[async_trait]
pub trait AssetApi: Send + Sync {
    /// URL of the asset's file.
    async fn file_url(&self, asset_id: &str) -> Result<String, RemoteAssetError>;

    /// URL of the best image rendition at least `min_size` pixels large.
    async fn image_url(
        &self,
        asset_id: &str,
        min_size: Option<u32>,
    ) -> Result<String, RemoteAssetError>;

    /// URL of a thumbnail, optionally of the given size.
    async fn thumbnail_url(
        &self,
        asset_id: &str,
        size: Option<u32>,
    ) -> Result<String, RemoteAssetError>;
}

/// Builds an [`AssetApi`] client for a context.
pub trait AssetApiFactory: Send + Sync {
    fn create(&self, context: &ApiContext) -> Arc<dyn AssetApi>;
}

/// Process-wide cache of asset API clients, one per [`ApiContext`].
///
/// Clients are never evicted. Two concurrent misses for the same context may
/// both build a client; the first one inserted is kept and returned to both.
pub struct ClientRegistry {
    factory: Arc<dyn AssetApiFactory>,
    clients: RwLock<HashMap<ApiContext, Arc<dyn AssetApi>>>,
}

impl ClientRegistry {
    pub fn new(factory: Arc<dyn AssetApiFactory>) -> Self {
        Self {
            factory,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Return the client for `context`, creating it on first use.
    pub async fn client_for(&self, context: &ApiContext) -> Arc<dyn AssetApi> {
        if let Some(client) = self.clients.read().await.get(context) {
            return Arc::clone(client);
        }

        let created = self.factory.create(context);
        tracing::debug!(context = %context, "Created asset API client");

        let mut clients = self.clients.write().await;
        Arc::clone(clients.entry(context.clone()).or_insert(created))
    }

    /// Number of cached clients.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
