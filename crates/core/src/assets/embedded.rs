//! Asset lookup inside an entry's `_embedded` section.
//!
//! Embedded keys carry the relation path of the asset field, e.g.
//! `ec:news/hero/asset` or `ent:hero/asset` for the field `hero`.

use serde_json::Value;

use super::model::Asset;
use super::negotiate::resolve;
use super::{NegotiationError, NegotiationRequest, Resolved};

/// Suffix of every embedded asset relation key.
const ASSET_SUFFIX: &str = "/asset";

/// Assets embedded for one field, after undoing the embedder's unwrapping.
#[derive(Debug)]
pub enum EmbeddedAssets<'a> {
    /// Single-asset field.
    One(&'a Value),
    /// Multi-asset field, in field order.
    Many(Vec<&'a Value>),
    /// Single-asset field embedded as an empty array.
    Empty,
}

/// Whether `key` is the embedded relation for `field`.
///
/// The key must end in `{field}/asset`, with the field delimited on the
/// left by `/`, `:` or the start of the key.
pub fn key_matches_field(key: &str, field: &str) -> bool {
    let needle = format!("{field}{ASSET_SUFFIX}");
    let Some(start) = key.len().checked_sub(needle.len()) else {
        return false;
    };
    key.ends_with(&needle) && (start == 0 || matches!(key.as_bytes()[start - 1], b'/' | b':'))
}

/// Locate the embedded asset(s) for `field`.
pub fn embedded_assets<'a>(
    entry: &'a Value,
    field: Option<&str>,
) -> Result<EmbeddedAssets<'a>, NegotiationError> {
    let embedded = entry
        .get("_embedded")
        .and_then(Value::as_object)
        .ok_or(NegotiationError::MissingEmbed)?;

    let field = match field {
        Some(f) if !f.is_empty() => f,
        other => return Err(NegotiationError::InvalidField(other.map(str::to_string))),
    };

    let embedded_value = embedded
        .iter()
        .find(|(key, _)| key_matches_field(key, field))
        .map(|(_, value)| value)
        .ok_or_else(|| NegotiationError::FieldNotEmbedded(field.to_string()))?;

    let field_is_collection = entry.get(field).is_some_and(Value::is_array);

    Ok(match (field_is_collection, embedded_value) {
        (true, Value::Array(items)) => EmbeddedAssets::Many(items.iter().collect()),
        (true, single) => EmbeddedAssets::Many(vec![single]),
        (false, Value::Array(items)) => match items.first() {
            Some(first) => EmbeddedAssets::One(first),
            None => EmbeddedAssets::Empty,
        },
        (false, single) => EmbeddedAssets::One(single),
    })
}

/// Resolve the URL(s) of the asset(s) embedded for `field`.
///
/// Multi-asset fields produce [`Resolved::Many`] in field order; everything
/// else produces a single URL.
pub fn resolve_from_embedded_entry(
    entry: &Value,
    field: Option<&str>,
    request: NegotiationRequest,
) -> Result<Resolved, NegotiationError> {
    let resolve_one = |value: &Value| -> Result<Resolved, NegotiationError> {
        let asset = Asset::from_json(value)?;
        Ok(Resolved::One(resolve(&asset, request)))
    };

    match embedded_assets(entry, field)? {
        EmbeddedAssets::One(value) => resolve_one(value),
        EmbeddedAssets::Many(values) => values
            .into_iter()
            .map(resolve_one)
            .collect::<Result<Vec<_>, _>>()
            .map(Resolved::Many),
        EmbeddedAssets::Empty => Ok(Resolved::Absent),
    }
}

/// Titles of the asset(s) embedded for `field`, for `alt` attributes.
pub fn embedded_alt_text(entry: &Value, field: Option<&str>) -> Result<Resolved, NegotiationError> {
    let title = |value: &Value| match value.get("title").and_then(Value::as_str) {
        Some(title) => Resolved::One(title.to_string()),
        None => Resolved::Absent,
    };

    Ok(match embedded_assets(entry, field)? {
        EmbeddedAssets::One(value) => title(value),
        EmbeddedAssets::Many(values) => Resolved::Many(values.into_iter().map(title).collect()),
        EmbeddedAssets::Empty => Resolved::Absent,
    })
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
