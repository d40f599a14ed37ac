//! Field projections between the running context and remote calls
//!
//! Paths are dot-separated (`user.address.city`); numeric segments index arrays.

use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// Resolves a dotted path inside a JSON value
pub fn lookup<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(value, |current, segment| match current {
        JsonValue::Object(map) => map.get(segment),
        JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn lookup_in(context: &Map<String, JsonValue>, path: &str) -> Option<JsonValue> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    let root = context.get(head)?;
    match rest {
        Some(rest) => lookup(root, rest).cloned(),
        None => Some(root.clone()),
    }
}

/// Builds a step request from the running context
///
/// An empty map sends the whole context. Missing source paths are omitted.
pub fn project_input(
    context: &Map<String, JsonValue>,
    input_map: &BTreeMap<String, String>,
) -> JsonValue {
    if input_map.is_empty() {
        return JsonValue::Object(context.clone());
    }

    let request: Map<String, JsonValue> = input_map
        .iter()
        .filter_map(|(field, path)| lookup_in(context, path).map(|v| (field.clone(), v)))
        .collect();

    JsonValue::Object(request)
}

/// Folds a step response back into the running context
///
/// An empty map merges an object response wholesale; any other non-null
/// response lands under `result`. Missing source paths are skipped.
pub fn merge_output(
    context: &mut Map<String, JsonValue>,
    response: &JsonValue,
    output_map: &BTreeMap<String, String>,
) {
    if output_map.is_empty() {
        match response {
            JsonValue::Object(fields) => {
                context.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            JsonValue::Null => {}
            other => {
                context.insert("result".to_string(), other.clone());
            }
        }
        return;
    }

    for (field, path) in output_map {
        if let Some(value) = lookup(response, path) {
            context.insert(field.clone(), value.clone());
        }
    }
}
