//! Asset negotiation.
//!
//! Picks the URL to render for an asset attached to a content entry, given a
//! rendering intent (plain file link, full image, thumbnail) and an optional
//! minimum size. Assets arrive in two wire shapes (legacy `files` arrays and
//! unified `file`/`fileVariants`/`thumbnails` objects), embedded in entries,
//! or as bare IDs that must be resolved by the remote asset API.

pub mod embedded;
pub mod model;
pub mod negotiate;
pub mod remote;
pub mod resolver;

use serde::Serialize;

pub use model::{Asset, AssetKind, AssetShape, AssetVariant, UrlTemplates};
pub use remote::{ApiContext, AssetApi, AssetApiFactory, ClientRegistry};
pub use resolver::AssetResolver;

/* --------------------------------------------------------------------------
Request / result types
-------------------------------------------------------------------------- */

/// Rendering intent for a negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationMode {
    PlainFile,
    FullImage,
    Thumbnail,
}

/// What the caller wants from an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationRequest {
    pub mode: NegotiationMode,
    /// Minimum acceptable largest dimension, in pixels.
    pub min_size: Option<u32>,
}

impl NegotiationRequest {
    /// Build a request. A size of `0` means "no constraint".
    pub fn new(mode: NegotiationMode, min_size: Option<u32>) -> Self {
        Self {
            mode,
            min_size: min_size.filter(|size| *size > 0),
        }
    }

    pub fn plain_file() -> Self {
        Self::new(NegotiationMode::PlainFile, None)
    }

    pub fn image(min_size: Option<u32>) -> Self {
        Self::new(NegotiationMode::FullImage, min_size)
    }

    pub fn thumbnail(size: Option<u32>) -> Self {
        Self::new(NegotiationMode::Thumbnail, size)
    }
}

/// Outcome of a negotiation.
///
/// Serializes to `null`, a string, or an array so it can be handed straight
/// back to the templating layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Resolved {
    Absent,
    One(String),
    Many(Vec<Resolved>),
}

impl Resolved {
    pub fn is_absent(&self) -> bool {
        matches!(self, Resolved::Absent)
    }
}

/* --------------------------------------------------------------------------
Errors
-------------------------------------------------------------------------- */

/// Errors reported by the remote asset API.
#[derive(Debug, thiserror::Error)]
pub enum RemoteAssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// The request never produced a response (network, DNS, TLS, decoding).
    #[error("Asset API request failed: {0}")]
    Request(String),

    #[error("Asset API error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Asset negotiation error type.
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("Entry has no embedded content")]
    MissingEmbed,

    #[error("Asset field parameter invalid: {0:?}")]
    InvalidField(Option<String>),

    #[error("Could not find asset '{0}' in embedded content of entry")]
    FieldNotEmbedded(String),

    #[error("Asset negotiation with ids only needs an API context")]
    MissingApiContext,

    #[error("Cannot negotiate asset from input of type {0}")]
    UnsupportedInput(&'static str),

    #[error("Asset not found: {0}")]
    RemoteNotFound(String),

    #[error("Malformed asset: {0}")]
    MalformedAsset(String),

    #[error(transparent)]
    Remote(RemoteAssetError),
}

impl From<RemoteAssetError> for NegotiationError {
    fn from(err: RemoteAssetError) -> Self {
        match err {
            RemoteAssetError::NotFound(id) => NegotiationError::RemoteNotFound(id),
            other => NegotiationError::Remote(other),
        }
    }
}

/// JSON type name used in [`NegotiationError::UnsupportedInput`].
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_means_no_constraint() {
        assert_eq!(NegotiationRequest::image(Some(0)).min_size, None);
        assert_eq!(NegotiationRequest::thumbnail(Some(64)).min_size, Some(64));
    }

    #[test]
    fn resolved_serializes_to_plain_json() {
        let resolved = Resolved::Many(vec![
            Resolved::One("a.png".into()),
            Resolved::Absent,
        ]);
        assert_eq!(
            serde_json::to_value(&resolved).unwrap(),
            serde_json::json!(["a.png", null])
        );
    }

    #[test]
    fn remote_not_found_maps_to_negotiation_not_found() {
        let err: NegotiationError = RemoteAssetError::NotFound("abc".into()).into();
        assert!(matches!(err, NegotiationError::RemoteNotFound(id) if id == "abc"));

        let err: NegotiationError = RemoteAssetError::Api {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert!(matches!(err, NegotiationError::Remote(_)));
    }
}
