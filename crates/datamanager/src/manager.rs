//! Cached access to one content API for the rendering layer.
//!
//! [`Datamanager`] sits between templates and the remote APIs: entries and
//! entry lists are cached per model and query, image and thumbnail URLs per
//! asset and size. URL lookups never fail; errors are logged and the lookup
//! yields `None` so a page still renders.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::Value;
use vitrine_core::assets::{AssetApi, RemoteAssetError};
use vitrine_core::templates::{compose_template_source, DynamicTemplateName};

use crate::api::{DatamanagerApi, DatamanagerError, EntriesQuery};
use crate::cache::{TtlCache, DEFAULT_CAPACITY};
use crate::files::FileUrlApi;

/// Nested relation levels above this are ignored by `dm_entry`.
const MAX_FILTER_LEVELS: u32 = 4;

/// Settings for a [`Datamanager`].
#[derive(Debug, Clone)]
pub struct DatamanagerConfig {
    /// Content API base URL.
    pub url: String,
    /// Files endpoint used for ID-based URL lookups.
    pub files_url: String,
    /// Short ID of the data manager, used in relation names.
    pub short_id: String,
    /// Time-to-live of every cache.
    pub cache_ttl: Duration,
    /// Dynamic template kind -> model holding templates of that kind.
    pub dynamic_templates: HashMap<String, String>,
}

/// One entry of a [`Datamanager::load`] batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoadRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(rename = "entryID", default)]
    pub entry_id: Option<String>,
    #[serde(default)]
    pub levels: Option<u32>,
    #[serde(flatten)]
    pub query: EntriesQuery,
}

/// Cached content and asset URL access.
pub struct Datamanager {
    api: DatamanagerApi,
    files: FileUrlApi,
    short_id: String,
    dynamic_templates: HashMap<String, String>,
    entry_cache: TtlCache<Value>,
    entries_cache: TtlCache<Vec<Value>>,
    url_cache: TtlCache<String>,
}

impl Datamanager {
    pub fn new(client: reqwest::Client, config: DatamanagerConfig) -> Self {
        Self {
            api: DatamanagerApi::with_client(client.clone(), config.url),
            files: FileUrlApi::new(client, config.files_url),
            short_id: config.short_id,
            dynamic_templates: config.dynamic_templates,
            entry_cache: TtlCache::new(DEFAULT_CAPACITY, config.cache_ttl),
            entries_cache: TtlCache::new(DEFAULT_CAPACITY, config.cache_ttl),
            url_cache: TtlCache::new(DEFAULT_CAPACITY, config.cache_ttl),
        }
    }

    pub fn short_id(&self) -> &str {
        &self.short_id
    }

    /* ----------------------------------------------------------------------
    Entries
    ---------------------------------------------------------------------- */

    /// Single entry, cached under `{model}-{id}-{levels}`.
    pub async fn entry(
        &self,
        model: &str,
        entry_id: &str,
        levels: Option<u32>,
    ) -> Result<Value, DatamanagerError> {
        let key = format!("{model}-{entry_id}-{}", levels.unwrap_or(0));
        self.entry_cache
            .get_or_try_insert_with(&key, || self.api.entry(model, entry_id, levels))
            .await
    }

    /// Entry list, cached under `{model}-{query pairs}`.
    pub async fn entries(
        &self,
        model: &str,
        query: &EntriesQuery,
    ) -> Result<Vec<Value>, DatamanagerError> {
        let key = format!("{model}-{}", query.cache_key());
        self.entries_cache
            .get_or_try_insert_with(&key, || self.api.entries(model, query))
            .await
    }

    /// Entry lookup for templates; deep `levels` requests are flattened.
    pub async fn filter_entry(
        &self,
        entry_id: &str,
        model: &str,
        levels: Option<u32>,
    ) -> Result<Value, DatamanagerError> {
        let levels = levels.filter(|l| *l < MAX_FILTER_LEVELS);
        self.entry(model, entry_id, levels).await
    }

    /// Load a batch of entries and entry lists concurrently.
    ///
    /// The result is keyed like `requests`. Requests with `entryID` yield a
    /// single entry, the others a list.
    pub async fn load(
        &self,
        requests: BTreeMap<String, LoadRequest>,
    ) -> Result<serde_json::Map<String, Value>, DatamanagerError> {
        let loads = requests.into_iter().map(|(key, request)| async move {
            let model = request
                .model
                .as_deref()
                .ok_or_else(|| DatamanagerError::MissingModel(key.clone()))?;

            let data = match &request.entry_id {
                Some(entry_id) => self.entry(model, entry_id, request.levels).await?,
                None => Value::Array(self.entries(model, &request.query).await?),
            };
            Ok::<_, DatamanagerError>((key, data))
        });

        Ok(try_join_all(loads).await?.into_iter().collect())
    }

    /* ----------------------------------------------------------------------
    Asset URLs
    ---------------------------------------------------------------------- */

    /// File URL of an asset; not cached.
    pub async fn file_url(&self, asset_id: &str) -> Option<String> {
        if asset_id.is_empty() {
            return None;
        }
        log_lookup("FileURL", asset_id, self.files.file_url(asset_id).await)
    }

    /// Image URL of an asset, cached per asset and size.
    pub async fn image_url(&self, asset_id: &str, min_size: Option<u32>) -> Option<String> {
        if asset_id.is_empty() {
            return None;
        }
        let key = url_cache_key("image", asset_id, min_size);
        let result = self
            .url_cache
            .get_or_try_insert_with(&key, || self.files.image_url(asset_id, min_size))
            .await;
        log_lookup("ImageURL", asset_id, result)
    }

    /// Thumbnail URL of an asset, cached per asset and size.
    pub async fn thumbnail_url(&self, asset_id: &str, size: Option<u32>) -> Option<String> {
        if asset_id.is_empty() {
            return None;
        }
        let key = url_cache_key("thumb", asset_id, size);
        let result = self
            .url_cache
            .get_or_try_insert_with(&key, || self.files.thumbnail_url(asset_id, size))
            .await;
        log_lookup("ImageThumbURL", asset_id, result)
    }

    /* ----------------------------------------------------------------------
    Dynamic templates
    ---------------------------------------------------------------------- */

    /// Source of the dynamic template `name` (`{kind}-{entryID}`).
    pub async fn template_source(&self, name: &str) -> Result<String, DatamanagerError> {
        let name = DynamicTemplateName::parse(name)?;
        let model = self
            .dynamic_templates
            .get(&name.kind)
            .ok_or_else(|| DatamanagerError::UnknownTemplateKind(name.kind.clone()))?;

        let entry = match self.entry(model, &name.entry_id, None).await {
            Ok(entry) => entry,
            Err(DatamanagerError::NotFound(_)) => {
                return Err(DatamanagerError::NotFound(format!(
                    "template with id {} not found.",
                    name.entry_id
                )))
            }
            Err(other) => return Err(other),
        };

        Ok(compose_template_source(
            str_field(&entry, "style"),
            str_field(&entry, "content"),
        ))
    }
}

fn str_field<'a>(entry: &'a Value, key: &str) -> &'a str {
    entry.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn url_cache_key(kind: &str, asset_id: &str, size: Option<u32>) -> String {
    match size {
        Some(size) => format!("{kind}:{asset_id}:{size}"),
        None => format!("{kind}:{asset_id}"),
    }
}

fn log_lookup(
    what: &'static str,
    asset_id: &str,
    result: Result<String, RemoteAssetError>,
) -> Option<String> {
    match result {
        Ok(url) => Some(url),
        Err(RemoteAssetError::NotFound(_)) => {
            tracing::error!(asset_id, "{what} not found");
            None
        }
        Err(err) => {
            tracing::error!(asset_id, error = %err, "{what} lookup failed");
            None
        }
    }
}
