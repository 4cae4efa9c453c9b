use super::types::{IssueSeverity, SpecIssue};
use serde_json::Value;

pub(crate) const KNOWN_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Load an OpenAPI document from a file into a JSON value.
///
/// YAML and JSON are supported, chosen by file extension. The document is
/// kept as a raw value so that key order survives and schema fragments can
/// be lifted out verbatim; `$ref`s stay in place until schemas are expanded.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn load_document(file_path: &str) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(file_path)?;
    let value: Value = if file_path.ends_with(".yaml") || file_path.ends_with(".yml") {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(value)
}

/// Check a document for the structural problems that break the engine.
///
/// This is not a full OpenAPI validation; it covers the shape the engine
/// relies on. Error-severity issues fail init in strict mode, warnings are
/// logged and the affected operation degrades (no validators, no handler).
pub fn check_document(doc: &Value) -> Vec<SpecIssue> {
    let mut issues = Vec::new();

    let root = match doc.as_object() {
        Some(obj) => obj,
        None => {
            issues.push(SpecIssue::new(
                "#",
                IssueSeverity::Error,
                "not_an_object",
                "document root must be an object",
            ));
            return issues;
        }
    };

    match root.get("openapi").and_then(Value::as_str) {
        None => issues.push(SpecIssue::new(
            "openapi",
            IssueSeverity::Error,
            "missing_version",
            "missing `openapi` version field",
        )),
        Some(version) if !version.starts_with("3.0") => issues.push(SpecIssue::new(
            "openapi",
            IssueSeverity::Warning,
            "unsupported_version",
            format!("document declares version {version}, engine targets 3.0"),
        )),
        Some(_) => {}
    }

    let paths = match root.get("paths") {
        Some(Value::Object(paths)) => paths,
        Some(_) => {
            issues.push(SpecIssue::new(
                "paths",
                IssueSeverity::Error,
                "invalid_paths",
                "`paths` must be an object",
            ));
            return issues;
        }
        None => {
            issues.push(SpecIssue::new(
                "paths",
                IssueSeverity::Error,
                "missing_paths",
                "document has no `paths`",
            ));
            return issues;
        }
    };

    for (path, item) in paths {
        let item = match item.as_object() {
            Some(obj) => obj,
            None => {
                issues.push(SpecIssue::new(
                    format!("paths.{path}"),
                    IssueSeverity::Error,
                    "invalid_path_item",
                    "path item must be an object",
                ));
                continue;
            }
        };
        if !path.starts_with('/') {
            issues.push(SpecIssue::new(
                format!("paths.{path}"),
                IssueSeverity::Warning,
                "invalid_path",
                "path templates must begin with `/`",
            ));
        }
        for (method, op) in item {
            if !KNOWN_METHODS.contains(&method.as_str()) {
                continue;
            }
            let location = format!("paths.{path}.{method}");
            match op.as_object() {
                None => issues.push(SpecIssue::new(
                    location,
                    IssueSeverity::Error,
                    "invalid_operation",
                    "operation must be an object",
                )),
                Some(op) if !op.contains_key("operationId") => {
                    issues.push(SpecIssue::new(
                        location,
                        IssueSeverity::Warning,
                        "missing_operation_id",
                        "operation has no operationId; it will route but cannot \
                         be validated or handled",
                    ));
                }
                Some(_) => {}
            }
        }
    }

    issues
}

/// Log a batch of issues at the severity-appropriate level.
pub(crate) fn report_issues(issues: &[SpecIssue]) {
    for issue in issues {
        match issue.severity {
            IssueSeverity::Error => tracing::error!(
                location = %issue.location,
                kind = %issue.kind,
                "{}", issue.message
            ),
            IssueSeverity::Warning => tracing::warn!(
                location = %issue.location,
                kind = %issue.kind,
                "{}", issue.message
            ),
        }
    }
}
