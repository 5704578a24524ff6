//! Helpers over raw content entries.

use serde_json::Value;

use crate::assets::Resolved;

/// Titles of the entries linked from `field`.
///
/// Relations live under `_links["{datamanager_id}:{_modelTitle}/{field}"]`.
/// Returns `None` when the entry carries no such relation list, so callers
/// can hand the entry back unchanged.
pub fn linked_entry_titles(entry: &Value, datamanager_id: &str, field: &str) -> Option<Resolved> {
    let model = entry.get("_modelTitle").and_then(Value::as_str)?;
    let relation = format!("{datamanager_id}:{model}/{field}");
    let relations = entry.get("_links")?.get(&relation)?.as_array()?;

    let mut titles: Vec<Resolved> = relations
        .iter()
        .map(|r| match r.get("title").and_then(Value::as_str) {
            Some(title) => Resolved::One(title.to_string()),
            None => Resolved::Absent,
        })
        .collect();

    Some(match titles.len() {
        0 => Resolved::Absent,
        1 => titles.remove(0),
        _ => Resolved::Many(titles),
    })
}
