//! Best-fit variant selection for a single, already parsed asset.
//!
//! All functions here are pure. The search works on the resolution-known
//! variants sorted by descending largest dimension (stable, so equal sizes
//! keep input order), restricted to the thumbnail or non-thumbnail
//! partition, falling back to the whole sorted set when that partition is
//! empty.

use super::model::{expand_template, Asset, AssetKind, AssetShape, AssetVariant};
use super::{NegotiationMode, NegotiationRequest};

/// Resolve the URL for `asset` according to `request`.
pub fn resolve(asset: &Asset, request: NegotiationRequest) -> String {
    match request.mode {
        NegotiationMode::PlainFile => resolve_plain_file(asset),
        NegotiationMode::FullImage => resolve_image(asset, request.min_size),
        NegotiationMode::Thumbnail => resolve_thumbnail(asset, request.min_size),
    }
}

/// URL for a plain file link.
///
/// Non-image assets return their primary URL untouched. Legacy image assets
/// return the largest non-thumbnail rendition; unified image assets return
/// the original upload.
pub fn resolve_plain_file(asset: &Asset) -> String {
    match (asset.kind, asset.shape) {
        (AssetKind::File, _) | (AssetKind::Image, AssetShape::UnifiedVariants) => {
            asset.primary_url.clone()
        }
        (AssetKind::Image, AssetShape::LegacyFiles) => resolve_image(asset, None),
    }
}

/// URL for a full-size image, optionally the tightest fit at or above
/// `min_size`.
pub fn resolve_image(asset: &Asset, min_size: Option<u32>) -> String {
    if let (AssetShape::UnifiedVariants, Some(size)) = (asset.shape, min_size) {
        let exact = asset
            .variants
            .iter()
            .find(|v| !v.is_thumbnail && v.max_dimension() == Some(size));
        if let Some(variant) = exact {
            return variant.url.clone();
        }
        if let Some(template) = &asset.templates.file_variant {
            return expand_template(template, size);
        }
    }

    best_fit_url(asset, false, min_size)
}

/// URL for a thumbnail, optionally sized.
pub fn resolve_thumbnail(asset: &Asset, size: Option<u32>) -> String {
    if asset.shape == AssetShape::UnifiedVariants {
        match size {
            Some(size) => {
                if let Some(thumb) = asset.thumbnails().find(|t| t.max_dimension() == Some(size)) {
                    return thumb.url.clone();
                }
                if let Some(template) = &asset.templates.thumbnail {
                    return expand_template(template, size);
                }
            }
            None => {
                if let Some(thumb) = asset.thumbnails().next() {
                    return thumb.url.clone();
                }
            }
        }
    }

    best_fit_url(asset, true, size)
}

fn best_fit_url(asset: &Asset, want_thumbnail: bool, min_size: Option<u32>) -> String {
    best_fit(&asset.variants, want_thumbnail, min_size)
        .map(|v| v.url.clone())
        .unwrap_or_else(|| asset.primary_url.clone())
}

/// Pick the best variant, or `None` when no variant has a known resolution.
///
/// Without `min_size` the largest variant of the partition wins. With it,
/// the smallest variant whose largest dimension reaches `min_size` wins
/// (first in input order among equals); if none reaches it, the largest
/// variant is returned instead.
pub fn best_fit(
    variants: &[AssetVariant],
    want_thumbnail: bool,
    min_size: Option<u32>,
) -> Option<&AssetVariant> {
    let mut sized: Vec<(&AssetVariant, u32)> = variants
        .iter()
        .filter_map(|v| v.max_dimension().map(|d| (v, d)))
        .collect();
    if sized.is_empty() {
        return None;
    }

    // `sort_by` is stable; ties keep input order.
    sized.sort_by(|a, b| b.1.cmp(&a.1));

    let partition: Vec<(&AssetVariant, u32)> = sized
        .iter()
        .copied()
        .filter(|(v, _)| v.is_thumbnail == want_thumbnail)
        .collect();
    let candidates = if partition.is_empty() { sized } else { partition };

    let (largest, _) = candidates[0];
    let Some(min_size) = min_size else {
        return Some(largest);
    };

    let tightest = candidates
        .iter()
        .map(|(_, d)| *d)
        .filter(|d| *d >= min_size)
        .min();

    match tightest {
        Some(size) => candidates
            .iter()
            .find(|(_, d)| *d == size)
            .map(|(v, _)| *v),
        None => Some(largest),
    }
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
