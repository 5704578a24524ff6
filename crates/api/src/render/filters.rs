//! Template filters and functions.
//!
//! Filters run inside the blocking render task; lookups that need the
//! network are driven to completion with the runtime handle captured when
//! the environment was built.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Locale};
use chrono_tz::Tz;
use minijinja::value::ValueKind;
use minijinja::{Environment, Error, ErrorKind, State, Value};
use tokio::runtime::Handle;
use vitrine_core::assets::embedded::embedded_alt_text;
use vitrine_core::assets::{
    ApiContext, AssetResolver, NegotiationError, NegotiationMode, NegotiationRequest, Resolved,
};
use vitrine_core::entries::linked_entry_titles;
use vitrine_core::error::CoreError;
use vitrine_datamanager::{Datamanager, DatamanagerError, LoadRequest};

use super::{RenderSettings, DM_CONFIG_GLOBAL};

/// Register every filter and function on `env`.
pub fn register(env: &mut Environment<'static>, settings: &RenderSettings) {
    // -- asset negotiation --
    for (name, mode) in [
        ("file", NegotiationMode::PlainFile),
        ("image", NegotiationMode::FullImage),
        ("thumb", NegotiationMode::Thumbnail),
    ] {
        let resolver = Arc::clone(&settings.resolver);
        let runtime = settings.runtime.clone();
        env.add_filter(
            name,
            move |state: &State, input: Value, field: Option<Value>, size: Option<Value>| {
                negotiate(&resolver, &runtime, state, input, field, size, mode)
            },
        );
    }
    env.add_filter("alt_text", alt_text);

    // -- content API --
    let datamanager = Arc::clone(&settings.datamanager);
    let runtime = settings.runtime.clone();
    env.add_filter(
        "dm_entry",
        move |entry_id: String, model: String, levels: Option<u32>| {
            runtime
                .block_on(datamanager.filter_entry(&entry_id, &model, levels))
                .map(|entry| Value::from_serialize(&entry))
                .map_err(content_api_error)
        },
    );

    let datamanager = Arc::clone(&settings.datamanager);
    let runtime = settings.runtime.clone();
    env.add_filter("dm_file", move |asset_id: Value| {
        let Some(asset_id) = asset_id_arg(&asset_id) else {
            return Value::UNDEFINED;
        };
        url_value(runtime.block_on(datamanager.file_url(asset_id)))
    });

    let datamanager = Arc::clone(&settings.datamanager);
    let runtime = settings.runtime.clone();
    env.add_filter("dm_image", move |asset_id: Value, min_size: Option<Value>| {
        let Some(asset_id) = asset_id_arg(&asset_id) else {
            return Value::UNDEFINED;
        };
        let min_size = min_size.as_ref().and_then(number_arg);
        url_value(runtime.block_on(datamanager.image_url(asset_id, min_size)))
    });

    let datamanager = Arc::clone(&settings.datamanager);
    let runtime = settings.runtime.clone();
    env.add_filter("dm_thumbnail", move |asset_id: Value, size: Option<Value>| {
        let Some(asset_id) = asset_id_arg(&asset_id) else {
            return Value::UNDEFINED;
        };
        let size = size.as_ref().and_then(number_arg);
        url_value(runtime.block_on(datamanager.thumbnail_url(asset_id, size)))
    });

    let datamanager = Arc::clone(&settings.datamanager);
    env.add_filter(
        "dm_linked_entry_title",
        move |entry: Value, field: String| -> Result<Value, Error> {
            let json = to_json(&entry)?;
            Ok(match linked_entry_titles(&json, datamanager.short_id(), &field) {
                Some(titles) => resolved_value(&titles),
                None => entry,
            })
        },
    );

    let datamanager = Arc::clone(&settings.datamanager);
    let runtime = settings.runtime.clone();
    env.add_function("dm_load", move |requests: Value| {
        load(&datamanager, &runtime, &requests)
    });

    // -- formatting --
    env.add_filter("json", json);
    let dates = settings.dates;
    env.add_filter(
        "date_format",
        move |value: Value, format: String, locale: Option<String>, tz: Option<String>| {
            date_format(&dates, value, &format, locale.as_deref(), tz.as_deref())
        },
    );
}

/// Locale and timezone used by `date_format` when a template passes none.
#[derive(Debug, Clone, Copy)]
pub struct DateDefaults {
    pub timezone: Tz,
    pub locale: Locale,
}

/* --------------------------------------------------------------------------
Asset negotiation
-------------------------------------------------------------------------- */

fn negotiate(
    resolver: &AssetResolver,
    runtime: &Handle,
    state: &State,
    input: Value,
    field: Option<Value>,
    size: Option<Value>,
    mode: NegotiationMode,
) -> Result<Value, Error> {
    if input.is_undefined() {
        tracing::warn!("Asset filter called with undefined input");
        return Ok(input);
    }

    let (field, size) = split_field_and_size(field, size)?;
    let context = api_context(state)?;
    let input = to_json(&input)?;
    let request = NegotiationRequest::new(mode, size);

    match runtime.block_on(resolver.negotiate(context.as_ref(), &input, field.as_deref(), request)) {
        Ok(resolved) => Ok(resolved_value(&resolved)),
        Err(NegotiationError::RemoteNotFound(asset_id)) => {
            tracing::error!(%asset_id, "Asset not found");
            Ok(Value::UNDEFINED)
        }
        Err(err) => Err(negotiation_error(err)),
    }
}

/// A numeric second argument is the size, otherwise it names the field.
fn split_field_and_size(
    field: Option<Value>,
    size: Option<Value>,
) -> Result<(Option<String>, Option<u32>), Error> {
    if let (Some(arg), None) = (&field, &size) {
        if arg.kind() == ValueKind::Number {
            return Ok((None, Some(size_arg(arg)?)));
        }
    }

    let field = match field.filter(is_present) {
        None => None,
        Some(field) => match field.as_str() {
            Some(name) => Some(name.to_string()),
            None => {
                return Err(negotiation_error(NegotiationError::InvalidField(Some(
                    field.to_string(),
                ))))
            }
        },
    };
    let size = size.filter(is_present).map(|s| size_arg(&s)).transpose()?;
    Ok((field, size))
}

fn size_arg(value: &Value) -> Result<u32, Error> {
    number_arg(value).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("size must be a non-negative integer, got {value}"),
        )
    })
}

fn number_arg(value: &Value) -> Option<u32> {
    if value.kind() != ValueKind::Number {
        return None;
    }
    u32::try_from(value.clone()).ok()
}

fn is_present(value: &Value) -> bool {
    !value.is_undefined() && !value.is_none()
}

/// The API context from the `_dm_config` global, if configured.
fn api_context(state: &State) -> Result<Option<ApiContext>, Error> {
    match state.lookup(DM_CONFIG_GLOBAL).filter(is_present) {
        None => Ok(None),
        Some(value) => serde_json::from_value(to_json(&value)?)
            .map(Some)
            .map_err(|e| {
                Error::new(ErrorKind::InvalidOperation, "invalid _dm_config").with_source(e)
            }),
    }
}

fn negotiation_error(err: NegotiationError) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string()).with_source(err)
}

fn resolved_value(resolved: &Resolved) -> Value {
    match resolved {
        Resolved::Absent => Value::UNDEFINED,
        other => Value::from_serialize(other),
    }
}

fn alt_text(entry: Value, field: Option<String>) -> Result<Value, Error> {
    let json = to_json(&entry)?;
    embedded_alt_text(&json, field.as_deref())
        .map(|titles| resolved_value(&titles))
        .map_err(negotiation_error)
}

/* --------------------------------------------------------------------------
Content API
-------------------------------------------------------------------------- */

fn asset_id_arg(value: &Value) -> Option<&str> {
    value.as_str().filter(|id| !id.is_empty())
}

fn url_value(url: Option<String>) -> Value {
    url.map(Value::from).unwrap_or(Value::UNDEFINED)
}

fn load(datamanager: &Datamanager, runtime: &Handle, requests: &Value) -> Result<Value, Error> {
    let requests: BTreeMap<String, LoadRequest> = serde_json::from_value(to_json(requests)?)
        .map_err(|e| {
            content_api_error(
                CoreError::Validation(format!("invalid dm_load requests: {e}")).into(),
            )
        })?;

    runtime
        .block_on(datamanager.load(requests))
        .map(|data| Value::from_serialize(&data))
        .map_err(content_api_error)
}

/// Keep the content API error as the source so the page response can
/// report it.
fn content_api_error(err: DatamanagerError) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string()).with_source(err)
}

/* --------------------------------------------------------------------------
Formatting
-------------------------------------------------------------------------- */

fn json(value: Value) -> Value {
    match serde_json::to_string(&value) {
        Ok(serialized) => Value::from_safe_string(serialized),
        Err(e) => {
            tracing::warn!(error = %e, "Could not serialize value to JSON");
            value
        }
    }
}

/// `date_format(value, format, locale?, tz?)`: an RFC 3339 timestamp in
/// `tz`, formatted with a strftime pattern in `locale`.
fn date_format(
    defaults: &DateDefaults,
    value: Value,
    format: &str,
    locale: Option<&str>,
    tz: Option<&str>,
) -> Result<Value, Error> {
    let Some(parsed) = value.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()) else {
        return Ok(value);
    };

    let timezone = match tz.filter(|name| !name.is_empty()) {
        None => defaults.timezone,
        Some(name) => name.parse::<Tz>().map_err(|e| {
            Error::new(ErrorKind::InvalidOperation, format!("unknown timezone '{name}': {e}"))
        })?,
    };
    let locale = match locale.filter(|name| !name.is_empty()) {
        None => defaults.locale,
        Some(name) => Locale::try_from(name).map_err(|_| {
            Error::new(ErrorKind::InvalidOperation, format!("unknown locale '{name}'"))
        })?,
    };

    let items: Vec<Item> = StrftimeItems::new_with_locale(format, locale).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid date format '{format}'"),
        ));
    }
    let local = parsed.with_timezone(&timezone);
    Ok(Value::from(
        local.format_localized_with_items(items.iter(), locale).to_string(),
    ))
}

fn to_json(value: &Value) -> Result<serde_json::Value, Error> {
    serde_json::to_value(value).map_err(|e| {
        Error::new(ErrorKind::InvalidOperation, "value is not serializable").with_source(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- argument splitting --

    #[test]
    fn numeric_second_argument_is_the_size() {
        let (field, size) = split_field_and_size(Some(Value::from(400)), None).unwrap();
        assert_eq!(field, None);
        assert_eq!(size, Some(400));
    }

    #[test]
    fn field_and_size_are_both_accepted() {
        let (field, size) =
            split_field_and_size(Some(Value::from("hero")), Some(Value::from(300))).unwrap();
        assert_eq!(field.as_deref(), Some("hero"));
        assert_eq!(size, Some(300));
    }

    #[test]
    fn undefined_and_none_arguments_are_skipped() {
        let (field, size) =
            split_field_and_size(Some(Value::UNDEFINED), Some(Value::from(()))).unwrap();
        assert_eq!(field, None);
        assert_eq!(size, None);
    }

    #[test]
    fn non_string_field_is_rejected() {
        let err = split_field_and_size(Some(Value::from(true)), Some(Value::from(1))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert!(err.to_string().contains("field parameter invalid"));
    }

    #[test]
    fn negative_size_is_rejected() {
        assert!(split_field_and_size(Some(Value::from(-5)), None).is_err());
    }

    // -- formatting --

    #[test]
    fn json_is_marked_safe() {
        let value = json(Value::from_serialize(serde_json::json!({ "a": "<b>" })));
        assert!(value.is_safe());
        assert_eq!(value.as_str(), Some(r#"{"a":"<b>"}"#));
    }

    const UTC_EN: DateDefaults = DateDefaults {
        timezone: chrono_tz::UTC,
        locale: Locale::en_US,
    };

    fn format_date(value: Value, format: &str) -> Result<Value, Error> {
        date_format(&UTC_EN, value, format, None, None)
    }

    #[test]
    fn date_format_uses_strftime() {
        let value = format_date(Value::from("2024-03-01T12:30:00Z"), "%d.%m.%Y").unwrap();
        assert_eq!(value.as_str(), Some("01.03.2024"));
    }

    #[test]
    fn date_format_converts_to_timezone() {
        let value = date_format(
            &UTC_EN,
            Value::from("2024-03-01T23:30:00Z"),
            "%d.%m.%Y %H:%M",
            None,
            Some("Europe/Berlin"),
        )
        .unwrap();
        assert_eq!(value.as_str(), Some("02.03.2024 00:30"));
    }

    #[test]
    fn configured_timezone_applies_without_argument() {
        let defaults = DateDefaults {
            timezone: chrono_tz::America::New_York,
            ..UTC_EN
        };
        let value = date_format(&defaults, Value::from("2024-03-01T12:30:00Z"), "%H:%M", None, None)
            .unwrap();
        assert_eq!(value.as_str(), Some("07:30"));
    }

    #[test]
    fn date_format_uses_locale_names() {
        let value = date_format(
            &UTC_EN,
            Value::from("2024-03-01T12:30:00Z"),
            "%A",
            Some("de_DE"),
            None,
        )
        .unwrap();
        assert_eq!(value.as_str(), Some("Freitag"));
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        let result = date_format(
            &UTC_EN,
            Value::from("2024-03-01T12:30:00Z"),
            "%Y",
            None,
            Some("Mars/Olympus"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn unparsable_date_is_returned_unchanged() {
        let value = format_date(Value::from("yesterday"), "%Y").unwrap();
        assert_eq!(value.as_str(), Some("yesterday"));
        assert!(format_date(Value::from(42), "%Y").unwrap().kind() == ValueKind::Number);
    }

    #[test]
    fn invalid_date_format_is_an_error() {
        assert!(format_date(Value::from("2024-03-01T12:30:00Z"), "%Q").is_err());
    }

    // -- results --

    #[test]
    fn absent_result_is_undefined() {
        assert!(resolved_value(&Resolved::Absent).is_undefined());
        let many = resolved_value(&Resolved::Many(vec![
            Resolved::One("a.jpg".into()),
            Resolved::Absent,
        ]));
        assert_eq!(many.len(), Some(2));
    }
}
