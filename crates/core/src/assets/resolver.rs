//! Entry point dispatching on the shape of the negotiation input.

use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::Value;

use super::embedded::resolve_from_embedded_entry;
use super::model::Asset;
use super::negotiate::resolve;
use super::remote::{ApiContext, ClientRegistry};
use super::{json_type_name, NegotiationError, NegotiationMode, NegotiationRequest, Resolved};

/// Marker key identifying a direct asset object.
const ASSET_ID_KEY: &str = "assetID";

/// Marker key identifying an entry with embedded content.
const EMBEDDED_KEY: &str = "_embedded";

/// Negotiates URLs for every supported input shape.
///
/// Cheap to share: the only state is the client registry.
#[derive(Clone)]
pub struct AssetResolver {
    clients: Arc<ClientRegistry>,
}

impl AssetResolver {
    pub fn new(clients: Arc<ClientRegistry>) -> Self {
        Self { clients }
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Negotiate `input`:
    ///
    /// - `null` stays absent;
    /// - arrays are resolved element-wise, concurrently, in input order;
    /// - objects with `assetID` are direct assets;
    /// - objects with `_embedded` are entries, looked up by `field`;
    /// - strings are asset IDs resolved through the remote API of `context`.
    pub fn negotiate<'a>(
        &'a self,
        context: Option<&'a ApiContext>,
        input: &'a Value,
        field: Option<&'a str>,
        request: NegotiationRequest,
    ) -> BoxFuture<'a, Result<Resolved, NegotiationError>> {
        async move {
            match input {
                Value::Null => {
                    tracing::warn!("Asset negotiation called with null input");
                    Ok(Resolved::Absent)
                }
                Value::Array(items) => {
                    let resolved = try_join_all(
                        items
                            .iter()
                            .map(|item| self.negotiate(context, item, field, request)),
                    )
                    .await?;
                    Ok(Resolved::Many(resolved))
                }
                Value::Object(object) if object.contains_key(ASSET_ID_KEY) => {
                    let asset = Asset::from_json(input)?;
                    Ok(Resolved::One(resolve(&asset, request)))
                }
                Value::Object(object) if object.contains_key(EMBEDDED_KEY) => {
                    resolve_from_embedded_entry(input, field, request)
                }
                Value::String(asset_id) => self
                    .resolve_from_remote_id(asset_id, request, context)
                    .await
                    .map(Resolved::One),
                other => Err(NegotiationError::UnsupportedInput(json_type_name(other))),
            }
        }
        .boxed()
    }

    /// Resolve a bare asset ID through the remote asset API of `context`.
    pub async fn resolve_from_remote_id(
        &self,
        asset_id: &str,
        request: NegotiationRequest,
        context: Option<&ApiContext>,
    ) -> Result<String, NegotiationError> {
        let context = context.ok_or(NegotiationError::MissingApiContext)?;
        let api = self.clients.client_for(context).await;

        let url = match request.mode {
            NegotiationMode::Thumbnail => api.thumbnail_url(asset_id, request.min_size).await?,
            NegotiationMode::FullImage => api.image_url(asset_id, request.min_size).await?,
            NegotiationMode::PlainFile => api.file_url(asset_id).await?,
        };
        Ok(url)
    }
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
