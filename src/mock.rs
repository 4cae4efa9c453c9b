//! # Mock Engine
//!
//! Synthesizes mock responses for operations straight from the contract,
//! preferring declared examples over schema instantiation. Useful for
//! serving an API before any handler exists and for contract-first tests.
//!
//! Selection order per media type: a literal `example`, then the requested
//! (or first) entry of the `examples` map, then instantiation from the
//! `schema`. Instantiation is deterministic: `allOf` and `anyOf` members
//! merge, `oneOf` picks its first member, enumerations pick their first
//! value, primitives fall back to type/format exemplars.

use crate::spec::{expand_schema, Operation};
use crate::status::{find_default_status_code_match, find_status_code_match};
use serde_json::{json, Map, Value};

/// Schema instantiation recursion limit; self-referential schemas bottom
/// out as `null` past this depth.
const MAX_DEPTH: usize = 16;

/// Options for [`mock_response`].
#[derive(Debug, Clone)]
pub struct MockOptions {
    /// Response status to mock; default is the representative response.
    pub code: Option<u16>,
    /// Media type to pick from `content`.
    pub media_type: String,
    /// Named entry of the `examples` map to prefer.
    pub example: Option<String>,
}

impl Default for MockOptions {
    fn default() -> Self {
        MockOptions {
            code: None,
            media_type: "application/json".to_string(),
            example: None,
        }
    }
}

/// Synthesize `(status, mock)` for an operation, or `None` when the
/// operation declares no response to build from.
pub fn mock_response(
    document: &Value,
    operation: &Operation,
    options: &MockOptions,
) -> Option<(u16, Value)> {
    let (status, response) = match options.code {
        Some(code) => find_status_code_match(code, &operation.responses)
            .map(|res| (code, res))
            .or_else(|| find_default_status_code_match(&operation.responses))?,
        None => find_default_status_code_match(&operation.responses)?,
    };

    let media = response
        .get("content")
        .and_then(|content| content.get(&options.media_type));
    let Some(media) = media else {
        return Some((status, Value::Null));
    };

    if let Some(example) = media.get("example") {
        return Some((status, example.clone()));
    }
    if let Some(examples) = media.get("examples").and_then(Value::as_object) {
        let entry = options
            .example
            .as_deref()
            .and_then(|name| examples.get(name))
            .or_else(|| examples.values().next());
        if let Some(entry) = entry {
            return Some((status, entry.get("value").cloned().unwrap_or(Value::Null)));
        }
    }
    if let Some(schema) = media.get("schema") {
        let expanded = expand_schema(document, schema);
        return Some((status, mock_from_schema(&expanded, &expanded, 0)));
    }
    Some((status, Value::Null))
}

/// Instantiate a representative value from a schema.
fn mock_from_schema(root: &Value, schema: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::Null;
    }
    let Some(obj) = schema.as_object() else {
        return Value::Null;
    };

    if let Some(pointer) = obj.get("$ref").and_then(Value::as_str) {
        return match pointer.strip_prefix('#').and_then(|p| root.pointer(p)) {
            Some(target) => mock_from_schema(root, target, depth + 1),
            None => Value::Null,
        };
    }
    if let Some(example) = obj.get("example") {
        return example.clone();
    }
    if let Some(members) = obj.get("allOf").and_then(Value::as_array) {
        return members
            .iter()
            .map(|member| mock_from_schema(root, member, depth + 1))
            .fold(json!({}), deep_merge);
    }
    if let Some(members) = obj.get("anyOf").and_then(Value::as_array) {
        return members
            .iter()
            .map(|member| mock_from_schema(root, member, depth + 1))
            .fold(json!({}), deep_merge);
    }
    if let Some(members) = obj.get("oneOf").and_then(Value::as_array) {
        return members
            .first()
            .map(|member| mock_from_schema(root, member, depth + 1))
            .unwrap_or(Value::Null);
    }
    if let Some(values) = obj.get("enum").and_then(Value::as_array) {
        return values.first().cloned().unwrap_or(Value::Null);
    }

    let ty = obj.get("type").and_then(Value::as_str);
    match ty {
        Some("array") => match obj.get("items") {
            Some(items) => json!([mock_from_schema(root, items, depth + 1)]),
            None => json!([]),
        },
        Some("object") => mock_object(root, obj, depth),
        Some("string") => mock_string(obj),
        Some("integer") | Some("number") => obj.get("minimum").cloned().unwrap_or(json!(0)),
        Some("boolean") => json!(false),
        // untyped schemas still instantiate when their shape is clear
        None if obj.contains_key("properties") => mock_object(root, obj, depth),
        None if obj.contains_key("items") => {
            json!([mock_from_schema(root, &obj["items"], depth + 1)])
        }
        _ => Value::Null,
    }
}

fn mock_object(root: &Value, obj: &Map<String, Value>, depth: usize) -> Value {
    let mut out = Map::new();
    if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
        for (name, prop) in properties {
            out.insert(name.clone(), mock_from_schema(root, prop, depth + 1));
        }
    }
    Value::Object(out)
}

fn mock_string(obj: &Map<String, Value>) -> Value {
    let exemplar = match obj.get("format").and_then(Value::as_str) {
        Some("date") => "1970-01-01",
        Some("date-time") => "1970-01-01T00:00:00.000Z",
        Some("uuid") => "00000000-0000-0000-0000-000000000000",
        Some("email") => "user@example.com",
        Some("uri") | Some("url") => "https://example.com",
        _ => "",
    };
    json!(exemplar)
}

/// Merge two mock values; objects combine recursively, the right side wins
/// elsewhere.
fn deep_merge(base: Value, other: Value) -> Value {
    match (base, other) {
        (Value::Object(mut a), Value::Object(b)) => {
            for (key, value) in b {
                let merged = match a.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                a.insert(key, merged);
            }
            Value::Object(a)
        }
        (_, other) => other,
    }
}
