use crate::error::EngineError;
use crate::spec::{expand_schema, Operation, ParameterLocation};
use indexmap::IndexMap;
use jsonschema::Validator;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

/// Compiled response-header validators for one status key, one per
/// set-match flavor, plus the declared header schemas for value coercion.
pub struct HeaderValidators {
    pub any: Arc<Validator>,
    pub superset: Arc<Validator>,
    pub subset: Arc<Validator>,
    pub exact: Arc<Validator>,
    pub(crate) properties: Map<String, Value>,
}

/// All compiled validators for one operation.
pub struct OperationValidators {
    /// Request validators in execution order: body (when declared) first,
    /// then parameters. Both run over the same composite instance.
    pub request: Vec<Arc<Validator>>,
    /// Combined `oneOf` across every declared response schema.
    pub response: Option<Arc<Validator>>,
    /// Per-status-key response validators.
    pub by_status: IndexMap<String, Arc<Validator>>,
    /// Per-status-key response-header validators.
    pub headers: IndexMap<String, HeaderValidators>,
    /// Declared parameters' schemas for value coercion at validation time.
    pub(crate) parameter_schemas: Vec<(ParameterLocation, String, Option<Value>)>,
}

/// Compiled validators for every operation that carries an `operationId`.
#[derive(Default)]
pub struct ValidatorSet {
    pub(crate) by_operation: HashMap<String, OperationValidators>,
}

impl ValidatorSet {
    pub fn get(&self, operation_id: &str) -> Option<&OperationValidators> {
        self.by_operation.get(operation_id)
    }
}

/// Wrap a request-body schema so it validates the `requestBody` slot of the
/// composite instance. The slot is required only when `application/json` is
/// the sole declared media type.
pub(crate) fn build_request_body_schema(operation: &Operation) -> Option<Value> {
    let schema = operation.request_body_json_schema()?.clone();
    let required: Vec<Value> = if operation.body_is_json_only() {
        vec![json!("requestBody")]
    } else {
        Vec::new()
    };
    Some(json!({
        "type": "object",
        "additionalProperties": true,
        "properties": { "requestBody": schema },
        "required": required,
    }))
}

/// Build the composite parameter schema: one sub-object per location.
///
/// `path` and `query` close over their declared properties
/// (`additionalProperties: false`); `header` and `cookie` stay open since
/// transports add their own. Required parameters are listed both in their
/// sub-object and, via the location name, in the outer `required`.
pub(crate) fn build_params_schema(operation: &Operation) -> Value {
    let locations = [
        (ParameterLocation::Path, false),
        (ParameterLocation::Query, false),
        (ParameterLocation::Header, true),
        (ParameterLocation::Cookie, true),
    ];

    let mut properties = Map::new();
    let mut outer_required: Vec<Value> = Vec::new();

    for (location, additional) in locations {
        let mut props = Map::new();
        let mut required: Vec<Value> = Vec::new();
        for param in &operation.parameters {
            if param.location != location {
                continue;
            }
            let schema = param.effective_schema().cloned().unwrap_or_else(|| json!({}));
            props.insert(param.name.clone(), schema);
            if param.required {
                required.push(json!(param.name));
                let slot = json!(location.as_str());
                if !outer_required.contains(&slot) {
                    outer_required.push(slot);
                }
            }
        }
        properties.insert(
            location.as_str().to_string(),
            json!({
                "type": "object",
                "properties": props,
                "required": required,
                "additionalProperties": additional,
            }),
        );
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": outer_required,
    })
}

fn response_json_schema(response: &Value) -> Option<&Value> {
    response
        .get("content")
        .and_then(|c| c.get("application/json"))
        .and_then(|media| media.get("schema"))
}

/// Gather each status key's `application/json` schema.
pub(crate) fn build_response_schemas(operation: &Operation) -> IndexMap<String, Value> {
    let mut schemas = IndexMap::new();
    for (status_key, response) in &operation.responses {
        if let Some(schema) = response_json_schema(response) {
            schemas.insert(status_key.clone(), schema.clone());
        }
    }
    schemas
}

/// The four set-match envelopes for one status's declared headers.
///
/// The flavors differ only in `additionalProperties` and `required`:
/// Any (open, nothing required), Superset (open, all required), Subset
/// (closed, nothing required), Exact (closed, all required). The returned
/// map holds the expanded per-header schemas for value coercion.
pub(crate) fn build_headers_schemas(
    document: &Value,
    headers: &Value,
) -> Option<(Map<String, Value>, [Value; 4])> {
    let declared = headers.as_object()?;
    let mut props = Map::new();
    let mut expanded = Map::new();
    for (name, header) in declared {
        let schema = header.get("schema").cloned().unwrap_or_else(|| json!({}));
        expanded.insert(
            name.to_ascii_lowercase(),
            expand_schema(document, &schema),
        );
        props.insert(name.to_ascii_lowercase(), schema);
    }
    let all: Vec<Value> = props.keys().map(|name| json!(name)).collect();

    let envelope = |additional: bool, required: &[Value]| {
        json!({
            "type": "object",
            "properties": {
                "headers": {
                    "type": "object",
                    "properties": props.clone(),
                    "required": required,
                    "additionalProperties": additional,
                }
            }
        })
    };

    let schemas = [
        envelope(true, &[]),
        envelope(true, &all),
        envelope(false, &[]),
        envelope(false, &all),
    ];
    Some((expanded, schemas))
}

fn compile(
    document: &Value,
    schema: &Value,
    operation_id: &str,
    what: &str,
    strict: bool,
) -> Result<Option<Arc<Validator>>, EngineError> {
    let expanded = expand_schema(document, schema);
    match jsonschema::validator_for(&expanded) {
        Ok(validator) => Ok(Some(Arc::new(validator))),
        Err(err) => {
            if strict {
                return Err(EngineError::InvalidDocument(format!(
                    "cannot compile {what} schema for {operation_id}: {err}"
                )));
            }
            error!(operation_id, what, error = %err, "schema compilation failed; validator skipped");
            Ok(None)
        }
    }
}

/// Compile the four validator families for every operation with an id.
///
/// Operations without an `operationId` cannot be addressed and are skipped.
/// In strict mode a compile failure aborts init; otherwise it is logged and
/// the operation simply lacks that validator.
pub fn build_validator_set(
    document: &Value,
    operations: &[Arc<Operation>],
    strict: bool,
) -> Result<ValidatorSet, EngineError> {
    let mut set = ValidatorSet::default();

    for operation in operations {
        let Some(operation_id) = operation.operation_id.as_deref() else {
            continue;
        };

        let mut request = Vec::new();
        if let Some(schema) = build_request_body_schema(operation) {
            if let Some(v) = compile(document, &schema, operation_id, "request body", strict)? {
                request.push(v);
            }
        }
        let params_schema = build_params_schema(operation);
        if let Some(v) = compile(document, &params_schema, operation_id, "parameters", strict)? {
            request.push(v);
        }

        let response_schemas = build_response_schemas(operation);
        let mut by_status = IndexMap::new();
        for (status_key, schema) in &response_schemas {
            let what = format!("response {status_key}");
            if let Some(v) = compile(document, schema, operation_id, &what, strict)? {
                by_status.insert(status_key.clone(), v);
            }
        }
        let response = if response_schemas.is_empty() {
            None
        } else {
            let one_of: Vec<Value> = response_schemas.values().cloned().collect();
            compile(document, &json!({ "oneOf": one_of }), operation_id, "response", strict)?
        };

        let mut headers = IndexMap::new();
        for (status_key, response_obj) in &operation.responses {
            let Some(declared) = response_obj.get("headers") else {
                continue;
            };
            let Some((properties, schemas)) = build_headers_schemas(document, declared) else {
                continue;
            };
            let what = format!("response headers {status_key}");
            let [any, superset, subset, exact] = schemas;
            let compiled = (
                compile(document, &any, operation_id, &what, strict)?,
                compile(document, &superset, operation_id, &what, strict)?,
                compile(document, &subset, operation_id, &what, strict)?,
                compile(document, &exact, operation_id, &what, strict)?,
            );
            if let (Some(any), Some(superset), Some(subset), Some(exact)) = compiled {
                headers.insert(
                    status_key.clone(),
                    HeaderValidators {
                        any,
                        superset,
                        subset,
                        exact,
                        properties,
                    },
                );
            }
        }

        // expanded here so value coercion can read the declared types even
        // when a parameter schema is a component reference
        let parameter_schemas = operation
            .parameters
            .iter()
            .map(|p| {
                let schema = p
                    .effective_schema()
                    .map(|s| expand_schema(document, s));
                (p.location, p.name.clone(), schema)
            })
            .collect();

        set.by_operation.insert(
            operation_id.to_string(),
            OperationValidators {
                request,
                response,
                by_status,
                headers,
                parameter_schemas,
            },
        );
    }

    info!(operations = set.by_operation.len(), "validators compiled");
    Ok(set)
}
