//! Normalized asset model and its parsing from the two wire shapes.

use serde::Deserialize;
use serde_json::Value;

use super::NegotiationError;

/// Substring marking a legacy file entry as a thumbnail rendition.
pub const LEGACY_THUMBNAIL_MARKER: &str = "_thumb";

/// Placeholder replaced by the requested size in URL templates.
pub const SIZE_PLACEHOLDER: &str = "{size}";

/// Link relation carrying the file-variant URL template.
pub const FILE_VARIANT_RELATION: &str = "ec:dm-asset/file-variant";

/// Link relation carrying the thumbnail URL template.
pub const THUMBNAIL_RELATION: &str = "ec:dm-asset/thumbnail";

/// Broad asset category; decides what a plain file request returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    File,
    Image,
}

impl AssetKind {
    fn from_type(asset_type: Option<&str>) -> Self {
        match asset_type {
            Some("image") => AssetKind::Image,
            _ => AssetKind::File,
        }
    }
}

/// Wire representation an [`Asset`] was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetShape {
    /// `files` array; thumbnails recognised by [`LEGACY_THUMBNAIL_MARKER`].
    LegacyFiles,
    /// `file` + `fileVariants` + `thumbnails`, with optional URL templates.
    UnifiedVariants,
}

/// One concrete rendition of an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetVariant {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub is_thumbnail: bool,
}

impl AssetVariant {
    /// Largest known dimension, or `None` when the resolution is unknown.
    pub fn max_dimension(&self) -> Option<u32> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(w.max(h)),
            (Some(d), None) | (None, Some(d)) => Some(d),
            (None, None) => None,
        }
    }
}

/// URL templates with a `{size}` placeholder (unified shape only).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlTemplates {
    pub file_variant: Option<String>,
    pub thumbnail: Option<String>,
}

/// Expand a URL template for the given size.
pub fn expand_template(template: &str, size: u32) -> String {
    template.replace(SIZE_PLACEHOLDER, &size.to_string())
}

/// A media attachment, normalized from either wire shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub kind: AssetKind,
    pub shape: AssetShape,
    pub primary_url: String,
    pub variants: Vec<AssetVariant>,
    pub templates: UrlTemplates,
}

impl Asset {
    /// Parse an asset object as delivered by the content API.
    ///
    /// An object with a `file` key is read as the unified shape, one with a
    /// `files` key as the legacy shape. Anything else is malformed.
    pub fn from_json(value: &Value) -> Result<Self, NegotiationError> {
        let object = value
            .as_object()
            .ok_or_else(|| NegotiationError::MalformedAsset("asset is not an object".into()))?;

        if object.contains_key("file") {
            let wire: UnifiedAsset = serde_json::from_value(value.clone())
                .map_err(|e| NegotiationError::MalformedAsset(e.to_string()))?;
            Ok(wire.into_asset())
        } else if object.contains_key("files") {
            let wire: LegacyAsset = serde_json::from_value(value.clone())
                .map_err(|e| NegotiationError::MalformedAsset(e.to_string()))?;
            wire.into_asset()
        } else {
            Err(NegotiationError::MalformedAsset(
                "asset has neither `file` nor `files`".into(),
            ))
        }
    }

    /// Variants flagged as thumbnails, in input order.
    pub fn thumbnails(&self) -> impl Iterator<Item = &AssetVariant> {
        self.variants.iter().filter(|v| v.is_thumbnail)
    }
}

/* --------------------------------------------------------------------------
Wire types
-------------------------------------------------------------------------- */

#[derive(Debug, Deserialize)]
struct WireResolution {
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireFile {
    url: String,
    #[serde(default)]
    resolution: Option<WireResolution>,
}

impl WireFile {
    fn into_variant(self, is_thumbnail: bool) -> AssetVariant {
        let (width, height) = self
            .resolution
            .map(|r| (r.width, r.height))
            .unwrap_or((None, None));
        AssetVariant {
            url: self.url,
            width,
            height,
            is_thumbnail,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireThumbnail {
    url: String,
    #[serde(default)]
    dimension: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LegacyAsset {
    #[serde(rename = "type", default)]
    asset_type: Option<String>,
    files: Vec<WireFile>,
}

impl LegacyAsset {
    fn into_asset(self) -> Result<Asset, NegotiationError> {
        let primary_url = self
            .files
            .first()
            .map(|f| f.url.clone())
            .ok_or_else(|| NegotiationError::MalformedAsset("asset has no files".into()))?;

        let variants = self
            .files
            .into_iter()
            .map(|f| {
                let is_thumbnail = f.url.contains(LEGACY_THUMBNAIL_MARKER);
                f.into_variant(is_thumbnail)
            })
            .collect();

        Ok(Asset {
            kind: AssetKind::from_type(self.asset_type.as_deref()),
            shape: AssetShape::LegacyFiles,
            primary_url,
            variants,
            templates: UrlTemplates::default(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnifiedAsset {
    #[serde(rename = "type", default)]
    asset_type: Option<String>,
    file: WireFile,
    #[serde(default)]
    file_variants: Vec<WireFile>,
    #[serde(default)]
    thumbnails: Vec<WireThumbnail>,
    #[serde(rename = "_links", default)]
    links: serde_json::Map<String, Value>,
}

impl UnifiedAsset {
    fn into_asset(self) -> Asset {
        let templates = UrlTemplates {
            file_variant: link_href(&self.links, FILE_VARIANT_RELATION),
            thumbnail: link_href(&self.links, THUMBNAIL_RELATION),
        };

        // A thumbnail's dimension bounds a square.
        let thumbnails = self.thumbnails.into_iter().map(|t| AssetVariant {
            url: t.url,
            width: t.dimension,
            height: t.dimension,
            is_thumbnail: true,
        });

        let variants = self
            .file_variants
            .into_iter()
            .map(|f| f.into_variant(false))
            .chain(thumbnails)
            .collect();

        Asset {
            kind: AssetKind::from_type(self.asset_type.as_deref()),
            shape: AssetShape::UnifiedVariants,
            primary_url: self.file.url,
            variants,
            templates,
        }
    }
}

/// First `href` of a HAL link relation, which may be a single link object
/// or an array of them.
fn link_href(links: &serde_json::Map<String, Value>, relation: &str) -> Option<String> {
    let link = match links.get(relation)? {
        Value::Array(items) => items.first()?,
        other => other,
    };
    link.get("href")?.as_str().map(str::to_string)
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
