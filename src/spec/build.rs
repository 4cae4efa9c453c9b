use super::load::KNOWN_METHODS;
use super::types::{Operation, Parameter, ParameterLocation, SecurityRequirement};
use http::Method;
use indexmap::IndexMap;
use serde_json::Value;

/// Resolve a top-level `$ref` on an object, if present.
///
/// Parameters, request bodies, and responses may each be a reference into
/// `components`; anything else is returned as-is. Nested `$ref`s inside
/// schemas are left for the cycle-breaking expander.
fn resolve_object<'a>(document: &'a Value, value: &'a Value) -> &'a Value {
    value
        .get("$ref")
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix('#'))
        .and_then(|pointer| document.pointer(pointer))
        .unwrap_or(value)
}

fn parse_parameters(document: &Value, raw: Option<&Value>, location: &str) -> Vec<Parameter> {
    let Some(list) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(list.len());
    for item in list {
        let resolved = resolve_object(document, item);
        match serde_json::from_value::<Parameter>(resolved.clone()) {
            Ok(mut param) => {
                if param.location == ParameterLocation::Header {
                    param.name.make_ascii_lowercase();
                }
                out.push(param);
            }
            Err(err) => {
                tracing::warn!(location, error = %err, "skipping malformed parameter");
            }
        }
    }
    out
}

fn parse_security(raw: Option<&Value>, location: &str) -> Option<Vec<SecurityRequirement>> {
    let raw = raw?;
    match serde_json::from_value::<Vec<SecurityRequirement>>(raw.clone()) {
        Ok(list) => Some(list),
        Err(err) => {
            tracing::warn!(location, error = %err, "skipping malformed security list");
            None
        }
    }
}

/// Flatten `paths` × methods into the operation index.
///
/// Each record combines the operation with its path and method, the merged
/// parameter list (operation parameters first, then path-level, duplicates
/// by `(name, in)` removed with the operation's winning), and the effective
/// security (operation overrides document, even when the override is an
/// empty list).
pub fn build_operations(document: &Value) -> Vec<Operation> {
    let mut operations = Vec::new();
    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        return operations;
    };
    let document_security =
        parse_security(document.get("security"), "security").unwrap_or_default();

    for (path, item) in paths {
        let Some(item_obj) = item.as_object() else {
            continue;
        };
        let path_parameters = parse_parameters(document, item_obj.get("parameters"), path);

        for (method_key, op) in item_obj {
            if !KNOWN_METHODS.contains(&method_key.to_ascii_lowercase().as_str()) {
                continue;
            }
            let Some(op_obj) = op.as_object() else {
                continue;
            };
            let location = format!("{path}.{method_key}");
            let method: Method = match method_key.to_ascii_uppercase().parse() {
                Ok(m) => m,
                Err(_) => continue,
            };

            let mut parameters =
                parse_parameters(document, op_obj.get("parameters"), &location);
            for inherited in &path_parameters {
                let duplicate = parameters
                    .iter()
                    .any(|p| p.name == inherited.name && p.location == inherited.location);
                if !duplicate {
                    parameters.push(inherited.clone());
                }
            }

            let security = parse_security(op_obj.get("security"), &location)
                .unwrap_or_else(|| document_security.clone());

            let request_body = op_obj
                .get("requestBody")
                .map(|rb| resolve_object(document, rb).clone());

            let mut responses = IndexMap::new();
            if let Some(resp_map) = op_obj.get("responses").and_then(Value::as_object) {
                for (status_key, resp) in resp_map {
                    responses.insert(
                        status_key.clone(),
                        resolve_object(document, resp).clone(),
                    );
                }
            }

            operations.push(Operation {
                method,
                path: path.clone(),
                operation_id: op_obj
                    .get("operationId")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                parameters,
                request_body,
                responses,
                security,
            });
        }
    }

    tracing::info!(count = operations.len(), "operation index built");
    operations
}

/// Extract `components.securitySchemes` as raw scheme objects.
pub fn extract_security_schemes(document: &Value) -> IndexMap<String, Value> {
    document
        .get("components")
        .and_then(|c| c.get("securitySchemes"))
        .and_then(Value::as_object)
        .map(|schemes| {
            schemes
                .iter()
                .map(|(name, scheme)| (name.clone(), scheme.clone()))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "openapi": "3.0.0",
            "security": [{"apiKey": []}],
            "paths": {
                "/pets": {
                    "parameters": [
                        {"name": "tenant", "in": "query", "schema": {"type": "string"}}
                    ],
                    "get": {
                        "operationId": "listPets",
                        "parameters": [
                            {"name": "limit", "in": "query", "schema": {"type": "integer"}}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    },
                    "post": {
                        "operationId": "createPet",
                        "security": [],
                        "parameters": [
                            {"name": "tenant", "in": "query", "required": true,
                             "schema": {"type": "integer"}}
                        ],
                        "responses": {"201": {"description": "created"}}
                    }
                }
            },
            "components": {
                "securitySchemes": {"apiKey": {"type": "apiKey", "name": "x-api-key", "in": "header"}}
            }
        })
    }

    #[test]
    fn test_operations_have_unique_method_path_pairs() {
        let ops = build_operations(&doc());
        let mut pairs: Vec<_> = ops
            .iter()
            .map(|op| (op.method.clone(), op.path.clone()))
            .collect();
        let before = pairs.len();
        pairs.sort_by(|a, b| (a.0.as_str(), &a.1).cmp(&(b.0.as_str(), &b.1)));
        pairs.dedup();
        assert_eq!(pairs.len(), before);
        assert_eq!(before, 2);
    }

    #[test]
    fn test_path_parameters_inherited_without_duplicates() {
        let ops = build_operations(&doc());
        let list = ops.iter().find(|op| op.method == Method::GET).unwrap();
        let names: Vec<_> = list.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["limit", "tenant"]);

        // operation-level `tenant` wins over the inherited one
        let create = ops.iter().find(|op| op.method == Method::POST).unwrap();
        let tenant: Vec<_> = create
            .parameters
            .iter()
            .filter(|p| p.name == "tenant")
            .collect();
        assert_eq!(tenant.len(), 1);
        assert!(tenant[0].required);
        assert_eq!(tenant[0].schema, Some(json!({"type": "integer"})));
    }

    #[test]
    fn test_security_inheritance_and_empty_override() {
        let ops = build_operations(&doc());
        let list = ops.iter().find(|op| op.method == Method::GET).unwrap();
        assert_eq!(list.security.len(), 1);
        assert!(list.security[0].0.contains_key("apiKey"));

        // explicit empty list overrides the document default
        let create = ops.iter().find(|op| op.method == Method::POST).unwrap();
        assert!(create.security.is_empty());
    }

    #[test]
    fn test_header_parameter_names_lowercased() {
        let doc = json!({
            "paths": {
                "/x": {
                    "get": {
                        "operationId": "getX",
                        "parameters": [
                            {"name": "X-Trace-Id", "in": "header", "schema": {"type": "string"}}
                        ]
                    }
                }
            }
        });
        let ops = build_operations(&doc);
        assert_eq!(ops[0].parameters[0].name, "x-trace-id");
    }

    #[test]
    fn test_component_parameter_refs_resolved() {
        let doc = json!({
            "paths": {
                "/x": {
                    "get": {
                        "operationId": "getX",
                        "parameters": [{"$ref": "#/components/parameters/Limit"}]
                    }
                }
            },
            "components": {
                "parameters": {
                    "Limit": {"name": "limit", "in": "query", "schema": {"type": "integer"}}
                }
            }
        });
        let ops = build_operations(&doc);
        assert_eq!(ops[0].parameters[0].name, "limit");
    }

    #[test]
    fn test_response_key_order_preserved() {
        let doc = json!({
            "paths": {
                "/x": {
                    "get": {
                        "operationId": "getX",
                        "responses": {
                            "404": {"description": "nf"},
                            "200": {"description": "ok"},
                            "default": {"description": "d"}
                        }
                    }
                }
            }
        });
        let ops = build_operations(&doc);
        let keys: Vec<_> = ops[0].responses.keys().cloned().collect();
        assert_eq!(keys, vec!["404", "200", "default"]);
    }

    #[test]
    fn test_extract_security_schemes() {
        let schemes = extract_security_schemes(&doc());
        assert_eq!(schemes.len(), 1);
        assert_eq!(schemes["apiKey"]["type"], json!("apiKey"));
    }
}
