use http::Method;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Where a parameter is carried in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    /// The bucket name used in the composite parameter-validation instance.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialization style of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterStyle {
    Matrix,
    Label,
    Form,
    Simple,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

/// One parameter declaration, after `$ref` resolution and header-name
/// lowercasing.
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub schema: Option<Value>,
    /// Media-type keyed alternative to `schema`; only
    /// `application/json` is consulted.
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub style: Option<ParameterStyle>,
    #[serde(default)]
    pub explode: Option<bool>,
}

impl Parameter {
    /// The schema under `content["application/json"]`, if declared that way.
    pub fn json_content_schema(&self) -> Option<&Value> {
        self.content
            .as_ref()
            .and_then(|c| c.get("application/json"))
            .and_then(|media| media.get("schema"))
    }

    /// The effective schema: JSON content schema if present, else `schema`.
    pub fn effective_schema(&self) -> Option<&Value> {
        self.json_content_schema().or(self.schema.as_ref())
    }
}

/// One alternative authorization requirement: scheme name to required
/// scopes. A request is authorized by a requirement when every scheme in it
/// succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SecurityRequirement(pub IndexMap<String, Vec<String>>);

/// One `(method, path)` operation flattened out of the document.
///
/// Built once at init and immutable afterwards. `parameters` carries the
/// merged operation-level and path-level declarations (operation wins on
/// conflicts); `security` is the effective requirement list after
/// operation/document inheritance.
#[derive(Debug, Clone)]
pub struct Operation {
    pub method: Method,
    pub path: String,
    pub operation_id: Option<String>,
    pub parameters: Vec<Parameter>,
    /// The raw `requestBody` object (content map and friends).
    pub request_body: Option<Value>,
    /// Response objects keyed by status key (`"200"`, `"2XX"`, `"default"`),
    /// document order preserved.
    pub responses: IndexMap<String, Value>,
    pub security: Vec<SecurityRequirement>,
}

impl Operation {
    /// The request-body schema for `application/json`, if declared.
    pub fn request_body_json_schema(&self) -> Option<&Value> {
        self.request_body
            .as_ref()
            .and_then(|rb| rb.get("content"))
            .and_then(|c| c.get("application/json"))
            .and_then(|media| media.get("schema"))
    }

    /// True when the request body declares exactly one media type and it is
    /// `application/json`.
    pub fn body_is_json_only(&self) -> bool {
        self.request_body
            .as_ref()
            .and_then(|rb| rb.get("content"))
            .and_then(Value::as_object)
            .map(|content| content.len() == 1 && content.contains_key("application/json"))
            .unwrap_or(false)
    }
}

/// Severity of a structural problem found in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Fails init in strict mode.
    Error,
    /// Logged; the affected operation is skipped or degraded.
    Warning,
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueSeverity::Error => write!(f, "error"),
            IssueSeverity::Warning => write!(f, "warning"),
        }
    }
}

/// A structural problem found while checking the document at init.
#[derive(Debug, Clone)]
pub struct SpecIssue {
    /// Where the issue occurred (e.g. `paths./pets.get`).
    pub location: String,
    pub severity: IssueSeverity,
    /// Short machine-readable kind (e.g. `missing_operation_id`).
    pub kind: String,
    pub message: String,
}

impl SpecIssue {
    pub fn new(
        location: impl Into<String>,
        severity: IssueSeverity,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SpecIssue {
            location: location.into(),
            severity,
            kind: kind.into(),
            message: message.into(),
        }
    }
}
