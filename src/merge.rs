//! Deep-merge of untyped JSON documents.
//!
//! Every locale overlay in a site export is sparse: a `fr_structure.json`
//! carries only the keys that differ from `structure.json`, a
//! `pages/fr_100.json` only the component properties that were translated.
//! This module layers those overlays onto their base documents.
//!
//! Objects are always merged key-by-key. Arrays follow one of two policies
//! chosen by the caller:
//!
//! | Policy | Used for | Behavior |
//! |--------|----------|----------|
//! | [`ArrayMerge::Replace`] | site info, structure | overlay array wins wholesale |
//! | [`ArrayMerge::ByIndex`] | component instances | element `i` of the overlay merges onto element `i` of the base |
//!
//! The page list of a structure file is the one exception to both: entries
//! are matched by `id` ([`merge_by_id`]).

use serde_json::Value;

/// How arrays present on both sides of a merge are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayMerge {
    /// The overlay array replaces the base array.
    Replace,
    /// Arrays merge position by position; extra overlay entries are appended.
    ByIndex,
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Objects are merged key-by-key (overlay keys override base keys).
/// - Arrays are combined according to `arrays`.
/// - Any other overlay value replaces the base value.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_json(base: Value, overlay: Value, arrays: ArrayMerge) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => merge_json(base_val, overlay_val, arrays),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (Value::Array(base_items), Value::Array(overlay_items)) if arrays == ArrayMerge::ByIndex => {
            let mut overlay_iter = overlay_items.into_iter();
            let mut merged: Vec<Value> = base_items
                .into_iter()
                .map(|base_item| match overlay_iter.next() {
                    Some(overlay_item) => merge_json(base_item, overlay_item, arrays),
                    None => base_item,
                })
                .collect();
            merged.extend(overlay_iter);
            Value::Array(merged)
        }
        (_, overlay) => overlay,
    }
}

/// Merge two lists of objects, matching entries by their `id` field.
///
/// Base order is preserved. A matched overlay entry is deep-merged onto the
/// base entry (with [`ArrayMerge::Replace`]); unmatched overlay entries are
/// appended in overlay order.
pub fn merge_by_id(base: Vec<Value>, overlay: Vec<Value>) -> Vec<Value> {
    let mut merged = base;
    for entry in overlay {
        let position = entry_id(&entry).and_then(|id| {
            merged
                .iter()
                .position(|existing| entry_id(existing).as_ref() == Some(&id))
        });
        match position {
            Some(idx) => {
                let base_entry = std::mem::take(&mut merged[idx]);
                merged[idx] = merge_json(base_entry, entry, ArrayMerge::Replace);
            }
            None => merged.push(entry),
        }
    }
    merged
}

/// Ids may be serialized as numbers or strings; compare them as strings.
fn entry_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Look up a dotted path (`"siteInfo.properties.header"`) in a JSON value.
///
/// Numeric segments index into arrays. Returns `None` on any miss.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Render a scalar JSON value as display text; objects and arrays yield `""`.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
