//! # Security Module
//!
//! Pluggable authentication for the dispatcher. The contract declares
//! *what* must be satisfied (security requirements naming schemes); callers
//! register *how* each scheme authenticates by name. A handler returns any
//! value: truthy means the scheme passed, and the value itself is exposed
//! to operation handlers so they can read claims or principals.
//!
//! Requirement semantics follow OpenAPI's OR-of-ANDs: a request is
//! authorized when at least one requirement object has every one of its
//! schemes succeed. An empty requirement list means the operation is open.

use crate::engine::Context;
use crate::spec::SecurityRequirement;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// A scheme authenticator: inspects the context, returns a truthy value on
/// success. The return value lands in `context.security.results`.
pub type SecurityHandler = Arc<dyn Fn(&Context) -> Value + Send + Sync>;

/// Authentication state carried on the [`Context`].
#[derive(Debug, Clone, Default)]
pub struct SecurityOutcome {
    /// True iff some requirement object had all of its schemes succeed.
    pub authorized: bool,
    /// Raw handler return values by scheme name; `Null` for schemes whose
    /// handler is missing.
    pub results: IndexMap<String, Value>,
}

impl SecurityOutcome {
    /// Open-access outcome: authorized, nothing evaluated.
    pub fn open() -> Self {
        SecurityOutcome {
            authorized: true,
            results: IndexMap::new(),
        }
    }

    /// A scheme's handler result, if that scheme was evaluated.
    pub fn result(&self, scheme: &str) -> Option<&Value> {
        self.results.get(scheme)
    }
}

/// JS-style truthiness over JSON values: `null`, `false`, `0`, and `""`
/// are falsy, everything else truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Evaluate OR-of-ANDs authorization over collected scheme results.
///
/// `results` must contain an entry for every scheme named by the
/// requirements (missing handlers contribute `Null`). An empty requirement
/// list authorizes; so does an empty requirement object, which requires
/// nothing.
pub fn evaluate_requirements(
    requirements: &[SecurityRequirement],
    results: &IndexMap<String, Value>,
) -> bool {
    if requirements.is_empty() {
        return true;
    }
    requirements.iter().any(|requirement| {
        requirement
            .0
            .keys()
            .all(|scheme| results.get(scheme).map(is_truthy).unwrap_or(false))
    })
}
