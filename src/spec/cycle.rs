//! `$ref` expansion with cycle breaking.
//!
//! Schema fragments lifted out of the document still contain
//! `#/components/...` references. The schema engine compiles each fragment
//! standalone, so those references must be inlined; but documents routinely
//! contain self-referential schemas (`Node.children: array<Node>`), which
//! naive inlining would expand forever. [`expand_schema`] deep-clones a
//! fragment, inlines each reference at its first occurrence, and replaces
//! every later occurrence with a JSON-pointer `$ref` to that first
//! expansion, relative to the fragment root `#`. The output always has a
//! terminating JSON serialization and compiles with the engine's native
//! `$ref` mechanism.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Deep-clone `schema`, inlining document `$ref`s and converting repeats
/// into local JSON-pointer references.
///
/// Pointer construction: the root is `"#"`, array elements append their
/// index, object members their (escaped) key. Unresolvable references are
/// cloned through untouched. Non-container values pass through unmodified.
pub fn expand_schema(document: &Value, schema: &Value) -> Value {
    let mut seen: HashMap<String, String> = HashMap::new();
    expand(document, schema, "#", &mut seen)
}

fn expand(
    document: &Value,
    value: &Value,
    pointer: &str,
    seen: &mut HashMap<String, String>,
) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(ref_path) = map.get("$ref").and_then(Value::as_str) {
                if let Some(first) = seen.get(ref_path) {
                    let mut out = Map::new();
                    out.insert("$ref".to_string(), Value::String(first.clone()));
                    return Value::Object(out);
                }
                if let Some(target) = resolve_ref(document, ref_path) {
                    seen.insert(ref_path.to_string(), pointer.to_string());
                    return expand(document, target, pointer, seen);
                }
                tracing::warn!(ref_path, "unresolvable $ref left in place");
            }
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                let child_pointer = format!("{pointer}/{}", escape_pointer_segment(key));
                out.insert(key.clone(), expand(document, child, &child_pointer, seen));
            }
            // OpenAPI 3.0 `nullable` has no JSON Schema meaning; widen the
            // type so the schema engine admits null
            if out.get("nullable").and_then(Value::as_bool) == Some(true) {
                if let Some(Value::String(ty)) = out.get("type").cloned() {
                    out.insert(
                        "type".to_string(),
                        Value::Array(vec![Value::String(ty), Value::String("null".to_string())]),
                    );
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, child)| expand(document, child, &format!("{pointer}/{i}"), seen))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve an in-document reference like `#/components/schemas/Pet`.
fn resolve_ref<'a>(document: &'a Value, ref_path: &str) -> Option<&'a Value> {
    let pointer = ref_path.strip_prefix('#')?;
    document.pointer(pointer)
}

/// RFC 6901 escaping for a single pointer segment.
fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inlines_plain_ref() {
        let doc = json!({
            "components": {"schemas": {"Pet": {"type": "object"}}}
        });
        let schema = json!({"$ref": "#/components/schemas/Pet"});
        assert_eq!(expand_schema(&doc, &schema), json!({"type": "object"}));
    }

    #[test]
    fn test_breaks_direct_cycle() {
        let doc = json!({
            "components": {"schemas": {
                "Node": {
                    "type": "object",
                    "properties": {
                        "children": {
                            "type": "array",
                            "items": {"$ref": "#/components/schemas/Node"}
                        }
                    }
                }
            }}
        });
        let schema = json!({"$ref": "#/components/schemas/Node"});
        let expanded = expand_schema(&doc, &schema);
        assert_eq!(
            expanded,
            json!({
                "type": "object",
                "properties": {
                    "children": {
                        "type": "array",
                        "items": {"$ref": "#"}
                    }
                }
            })
        );
        // terminating serialization is the whole point
        assert!(!serde_json::to_string(&expanded).unwrap().is_empty());
    }

    #[test]
    fn test_repeated_ref_points_at_first_occurrence() {
        let doc = json!({
            "components": {"schemas": {"Tag": {"type": "string"}}}
        });
        let schema = json!({
            "type": "object",
            "properties": {
                "a": {"$ref": "#/components/schemas/Tag"},
                "b": {"$ref": "#/components/schemas/Tag"}
            }
        });
        let expanded = expand_schema(&doc, &schema);
        assert_eq!(expanded["properties"]["a"], json!({"type": "string"}));
        assert_eq!(
            expanded["properties"]["b"],
            json!({"$ref": "#/properties/a"})
        );
    }

    #[test]
    fn test_mutual_recursion_terminates() {
        let doc = json!({
            "components": {"schemas": {
                "A": {"type": "object", "properties": {"b": {"$ref": "#/components/schemas/B"}}},
                "B": {"type": "object", "properties": {"a": {"$ref": "#/components/schemas/A"}}}
            }}
        });
        let expanded = expand_schema(&doc, &json!({"$ref": "#/components/schemas/A"}));
        assert_eq!(
            expanded["properties"]["b"]["properties"]["a"],
            json!({"$ref": "#"})
        );
    }

    #[test]
    fn test_unresolvable_ref_passes_through() {
        let doc = json!({});
        let schema = json!({"$ref": "#/components/schemas/Missing"});
        assert_eq!(expand_schema(&doc, &schema), schema);
    }

    #[test]
    fn test_pointer_segments_escaped() {
        let doc = json!({
            "components": {"schemas": {"S": {"type": "integer"}}}
        });
        let schema = json!({
            "type": "object",
            "properties": {
                "a/b": {"$ref": "#/components/schemas/S"},
                "c": {"$ref": "#/components/schemas/S"}
            }
        });
        let expanded = expand_schema(&doc, &schema);
        assert_eq!(
            expanded["properties"]["c"],
            json!({"$ref": "#/properties/a~1b"})
        );
    }

    #[test]
    fn test_nullable_widens_type() {
        let doc = json!({});
        let schema = json!({
            "type": "object",
            "properties": {"name": {"type": "string", "nullable": true}}
        });
        let expanded = expand_schema(&doc, &schema);
        assert_eq!(
            expanded["properties"]["name"]["type"],
            json!(["string", "null"])
        );
    }

    #[test]
    fn test_primitives_pass_through() {
        let doc = json!({});
        assert_eq!(expand_schema(&doc, &json!(true)), json!(true));
        assert_eq!(expand_schema(&doc, &json!([1, "x"])), json!([1, "x"]));
    }
}
