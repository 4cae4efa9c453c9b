//! # Validator Module
//!
//! Compiles per-operation validators out of the contract and runs them
//! against parsed requests and handler responses.
//!
//! Four validator families exist per operation: request (body validator
//! first, then the composite parameter validator; both run over one
//! instance, accumulating errors without short-circuiting), a combined
//! `oneOf` response validator, per-status response validators, and
//! per-status response-header validators in four set-match flavors.
//!
//! The schema engine receives every schema only after cycle-safe `$ref`
//! expansion, and it never coerces: string parameter values are decoded to
//! their schema types here before validation, body values never are.

mod build;

pub use build::{build_validator_set, HeaderValidators, OperationValidators, ValidatorSet};

use crate::error::EngineError;
use crate::router::ParsedRequest;
use crate::spec::{Operation, ParameterLocation};
use crate::status::{find_default_status_code_match, find_status_code_match};
use jsonschema::Validator;
use serde_json::{json, Map, Value};

/// One accumulated validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The failed keyword (`required`, `type`, ...); `parse` for the
    /// synthetic malformed-JSON-body error.
    pub keyword: String,
    pub instance_path: String,
    pub schema_path: String,
    pub message: String,
}

/// Result of a validation run. Failures are data, never `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Option<Vec<ValidationError>>,
}

impl Default for ValidationOutcome {
    fn default() -> Self {
        Self::valid()
    }
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        ValidationOutcome {
            valid: true,
            errors: None,
        }
    }

    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        if errors.is_empty() {
            Self::valid()
        } else {
            ValidationOutcome {
                valid: false,
                errors: Some(errors),
            }
        }
    }
}

/// Policy for matching returned response headers against the declared set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SetMatchType {
    /// Declared headers validate when present; anything extra is fine.
    #[default]
    Any,
    /// Every declared header must be present; extras are fine.
    Superset,
    /// Only declared headers may appear; none are mandatory.
    Subset,
    /// Exactly the declared headers, all present, nothing else.
    Exact,
}

impl std::str::FromStr for SetMatchType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Any" => Ok(SetMatchType::Any),
            "Superset" => Ok(SetMatchType::Superset),
            "Subset" => Ok(SetMatchType::Subset),
            "Exact" => Ok(SetMatchType::Exact),
            other => Err(EngineError::UnknownSetMatchType(other.to_string())),
        }
    }
}

/// Run a compiled validator, mapping the engine's errors into ours.
fn collect_errors(validator: &Validator, instance: &Value) -> Vec<ValidationError> {
    validator
        .iter_errors(instance)
        .map(|err| {
            let kind = format!("{:?}", err.kind());
            let keyword = kind
                .split([' ', '(', '{'])
                .next()
                .unwrap_or("schema")
                .to_ascii_lowercase();
            ValidationError {
                keyword,
                instance_path: err.instance_path().to_string(),
                schema_path: err.schema_path().to_string(),
                message: err.to_string(),
            }
        })
        .collect()
}

/// Decode a raw parameter value to its schema type.
///
/// Parameters arrive as strings; the schema engine does not coerce, so
/// integers, numbers, booleans, arrays, and JSON-ish objects are converted
/// here. A singular value whose schema wants an array is wrapped into a
/// one-element list. Unconvertible values are left alone so the validator
/// reports them.
pub(crate) fn decode_value(value: &Value, schema: Option<&Value>) -> Value {
    let Some(ty) = schema.and_then(|s| s.get("type")).and_then(Value::as_str) else {
        return value.clone();
    };
    match ty {
        "array" => {
            let items = schema.and_then(|s| s.get("items"));
            match value {
                Value::Array(parts) => {
                    Value::Array(parts.iter().map(|p| decode_value(p, items)).collect())
                }
                single => Value::Array(vec![decode_value(single, items)]),
            }
        }
        "object" => match value {
            Value::String(raw) => {
                serde_json::from_str(raw).unwrap_or_else(|_| value.clone())
            }
            other => other.clone(),
        },
        _ => coerce_primitive(value, ty),
    }
}

fn coerce_primitive(value: &Value, ty: &str) -> Value {
    let Value::String(raw) = value else {
        return value.clone();
    };
    match ty {
        "integer" => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| value.clone()),
        "number" => raw
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or_else(|_| value.clone()),
        "boolean" => raw
            .parse::<bool>()
            .map(Value::from)
            .unwrap_or_else(|_| value.clone()),
        _ => value.clone(),
    }
}

impl OperationValidators {
    fn parameter_schema(&self, location: ParameterLocation, name: &str) -> Option<&Value> {
        self.parameter_schemas
            .iter()
            .find(|(loc, n, _)| *loc == location && n == name)
            .and_then(|(_, _, schema)| schema.as_ref())
    }
}

impl ValidatorSet {
    /// Validate a parsed request against an operation's compiled validators.
    ///
    /// Builds the composite instance (four parameter buckets plus the
    /// `requestBody` slot), decodes parameter strings to their schema
    /// types, and runs every request validator in order, accumulating
    /// errors. A string body where `application/json` is the only declared
    /// media type is JSON-parsed; failure is recorded as a synthetic
    /// `parse` error at `#/requestBody`.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownOperation`] when the operation has no id or the
    /// id was never compiled; a programmer error, unlike invalid input.
    pub fn validate_request(
        &self,
        operation: &Operation,
        parsed: &ParsedRequest,
    ) -> Result<ValidationOutcome, EngineError> {
        let operation_id = operation
            .operation_id
            .as_deref()
            .ok_or_else(|| EngineError::UnknownOperation(format!("{} {}", operation.method, operation.path)))?;
        let compiled = self
            .by_operation
            .get(operation_id)
            .ok_or_else(|| EngineError::UnknownOperation(operation_id.to_string()))?;

        let mut errors = Vec::new();
        let mut instance = Map::new();

        let mut path = Map::new();
        for (name, raw) in &parsed.params {
            let schema = compiled.parameter_schema(ParameterLocation::Path, name);
            path.insert(name.clone(), decode_value(&Value::String(raw.clone()), schema));
        }
        instance.insert("path".to_string(), Value::Object(path));

        let mut query = Map::new();
        for (name, value) in &parsed.query {
            let schema = compiled.parameter_schema(ParameterLocation::Query, name);
            query.insert(name.clone(), decode_value(value, schema));
        }
        instance.insert("query".to_string(), Value::Object(query));

        let mut header = Map::new();
        for (name, raw) in &parsed.headers {
            let schema = compiled.parameter_schema(ParameterLocation::Header, name);
            header.insert(name.clone(), decode_value(&Value::String(raw.clone()), schema));
        }
        instance.insert("header".to_string(), Value::Object(header));

        let mut cookie = Map::new();
        for (name, raw) in &parsed.cookies {
            let schema = compiled.parameter_schema(ParameterLocation::Cookie, name);
            cookie.insert(name.clone(), decode_value(&Value::String(raw.clone()), schema));
        }
        instance.insert("cookie".to_string(), Value::Object(cookie));

        let mut body = parsed.request_body.clone();
        if let Some(Value::String(raw)) = &body {
            if operation.body_is_json_only() {
                match serde_json::from_str::<Value>(raw) {
                    Ok(parsed_body) => body = Some(parsed_body),
                    Err(_) => errors.push(ValidationError {
                        keyword: "parse".to_string(),
                        instance_path: String::new(),
                        schema_path: "#/requestBody".to_string(),
                        message: "request body is not parseable JSON".to_string(),
                    }),
                }
            }
        }
        let json_content_type = parsed
            .header("content-type")
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);
        if let Some(body) = body {
            if body.is_object() || body.is_array() || json_content_type {
                instance.insert("requestBody".to_string(), body);
            }
        }

        let instance = Value::Object(instance);
        for validator in &compiled.request {
            errors.extend(collect_errors(validator, &instance));
        }
        Ok(ValidationOutcome::from_errors(errors))
    }

    /// Validate a response body.
    ///
    /// With a status code, the per-status validator is resolved through the
    /// status matcher; without one, the combined `oneOf` validator runs. A
    /// missing validator means nothing was declared, which validates.
    pub fn validate_response(
        &self,
        operation_id: &str,
        response: &Value,
        status: Option<u16>,
    ) -> Result<ValidationOutcome, EngineError> {
        let compiled = self
            .by_operation
            .get(operation_id)
            .ok_or_else(|| EngineError::UnknownOperation(operation_id.to_string()))?;
        let validator = match status {
            Some(code) => find_status_code_match(code, &compiled.by_status),
            None => compiled.response.as_ref(),
        };
        Ok(match validator {
            Some(v) => ValidationOutcome::from_errors(collect_errors(v, response)),
            None => ValidationOutcome::valid(),
        })
    }

    /// Validate response headers against the declared set for a status.
    ///
    /// Header names are lowercased and values decoded per their declared
    /// schemas before validation. Without a status the representative
    /// response is used. Statuses that declare no headers validate.
    pub fn validate_response_headers(
        &self,
        operation_id: &str,
        headers: &Map<String, Value>,
        status: Option<u16>,
        set_match: SetMatchType,
    ) -> Result<ValidationOutcome, EngineError> {
        let compiled = self
            .by_operation
            .get(operation_id)
            .ok_or_else(|| EngineError::UnknownOperation(operation_id.to_string()))?;
        let by_status = match status {
            Some(code) => find_status_code_match(code, &compiled.headers),
            None => find_default_status_code_match(&compiled.headers).map(|(_, v)| v),
        };
        let Some(header_validators) = by_status else {
            return Ok(ValidationOutcome::valid());
        };
        let validator = match set_match {
            SetMatchType::Any => &header_validators.any,
            SetMatchType::Superset => &header_validators.superset,
            SetMatchType::Subset => &header_validators.subset,
            SetMatchType::Exact => &header_validators.exact,
        };

        let mut lowered = Map::new();
        for (name, value) in headers {
            let name = name.to_ascii_lowercase();
            let decoded = decode_value(value, header_validators.properties.get(&name));
            lowered.insert(name, decoded);
        }
        let instance = json!({ "headers": lowered });
        Ok(ValidationOutcome::from_errors(collect_errors(
            validator, &instance,
        )))
    }
}
