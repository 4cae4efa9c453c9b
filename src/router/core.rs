use crate::error::EngineError;
use crate::spec::Operation;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A raw incoming request, as handed over by a transport adapter.
///
/// `path` may still carry a query string; `headers` are arbitrary-case.
/// The engine never mutates a raw request.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub query: Option<QueryInput>,
    pub body: Option<Value>,
}

/// Query input: either an already-decoded map or a raw query string.
#[derive(Debug, Clone)]
pub enum QueryInput {
    Map(serde_json::Map<String, Value>),
    Raw(String),
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Request {
            method: method.into(),
            path: path.into(),
            headers: Vec::new(),
            query: None,
            body: None,
        }
    }
}

/// Outcome of a route lookup, before strictness is applied.
#[derive(Debug, Clone)]
pub enum RouteLookup {
    Matched(Arc<Operation>),
    /// The path is served, but not with this method.
    MethodMismatch,
    /// Nothing serves the path (or it lies outside the api root).
    NoPath,
}

struct CompiledRoute {
    operation: Arc<Operation>,
    regex: Regex,
    param_names: Vec<String>,
    /// Template length with all `{...}` placeholders removed; longer means
    /// more literal text and wins ordering.
    specificity: usize,
}

/// Matches normalized requests against the operation index.
///
/// Exact path equality wins outright; otherwise templates are tried with
/// `{name}` matching one non-slash segment, ordered by specificity
/// (descending), ties broken by index order.
pub struct Router {
    api_root: String,
    routes: Vec<CompiledRoute>,
}

impl Router {
    pub fn new(operations: Vec<Arc<Operation>>, api_root: &str) -> Self {
        let routes: Vec<CompiledRoute> = operations
            .into_iter()
            .filter_map(|operation| {
                let (regex, param_names) = match path_to_regex(&operation.path) {
                    Ok(compiled) => compiled,
                    Err(err) => {
                        warn!(path = %operation.path, error = %err, "skipping unroutable path template");
                        return None;
                    }
                };
                let specificity = template_specificity(&operation.path);
                Some(CompiledRoute {
                    operation,
                    regex,
                    param_names,
                    specificity,
                })
            })
            .collect();

        info!(
            routes_count = routes.len(),
            api_root = %api_root,
            "routing table built"
        );

        Router {
            api_root: api_root.to_string(),
            routes,
        }
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Strip the configured api root prefix, leaving the relative route path.
    pub fn normalize_path(&self, path: &str) -> String {
        let root = self.api_root.trim_end_matches('/');
        if root.is_empty() {
            return path.to_string();
        }
        match path.strip_prefix(root) {
            Some("") => "/".to_string(),
            Some(rest) if rest.starts_with('/') => rest.to_string(),
            _ => path.to_string(),
        }
    }

    fn within_api_root(&self, path: &str) -> bool {
        let root = self.api_root.trim_end_matches('/');
        if root.is_empty() {
            return true;
        }
        match path.strip_prefix(root) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }

    /// Look a request up in the routing table.
    pub fn lookup(&self, req: &Request) -> RouteLookup {
        let norm = normalize_request(req);
        debug!(method = %norm.method, path = %norm.path, "route match attempt");

        if !self.within_api_root(&norm.path) {
            warn!(path = %norm.path, api_root = %self.api_root, "path outside api root");
            return RouteLookup::NoPath;
        }
        let rel = self.normalize_path(&norm.path);

        // exact path equality first
        let exact: Vec<&CompiledRoute> = self
            .routes
            .iter()
            .filter(|r| r.operation.path == rel)
            .collect();
        if let Some(route) = exact
            .iter()
            .find(|r| r.operation.method.as_str().eq_ignore_ascii_case(&norm.method))
        {
            debug!(path = %route.operation.path, "exact route matched");
            return RouteLookup::Matched(Arc::clone(&route.operation));
        }

        let mut templated: Vec<(usize, &CompiledRoute)> = self
            .routes
            .iter()
            .enumerate()
            .filter(|(_, r)| r.regex.is_match(&rel))
            .collect();
        if exact.is_empty() && templated.is_empty() {
            warn!(method = %norm.method, path = %norm.path, "no route matched");
            return RouteLookup::NoPath;
        }

        templated.sort_by(|(ia, a), (ib, b)| {
            b.specificity.cmp(&a.specificity).then(ia.cmp(ib))
        });
        if let Some((_, route)) = templated
            .iter()
            .find(|(_, r)| r.operation.method.as_str().eq_ignore_ascii_case(&norm.method))
        {
            debug!(
                path = %route.operation.path,
                specificity = route.specificity,
                "template route matched"
            );
            return RouteLookup::Matched(Arc::clone(&route.operation));
        }

        warn!(method = %norm.method, path = %norm.path, "method not allowed on path");
        RouteLookup::MethodMismatch
    }

    /// Match a request to one operation.
    ///
    /// In strict mode a miss is an error with an observable
    /// `404-notFound:` / `405-methodNotAllowed:` prefix; otherwise misses
    /// yield `None`.
    pub fn match_operation(
        &self,
        req: &Request,
        strict: bool,
    ) -> Result<Option<Arc<Operation>>, EngineError> {
        match self.lookup(req) {
            RouteLookup::Matched(op) => Ok(Some(op)),
            RouteLookup::NoPath if strict => Err(EngineError::NotFound {
                method: req.method.clone(),
                path: req.path.clone(),
            }),
            RouteLookup::MethodMismatch if strict => Err(EngineError::MethodNotAllowed {
                method: req.method.clone(),
                path: req.path.clone(),
            }),
            _ => Ok(None),
        }
    }

    /// Extract `{name}` path variables for an operation from a relative path.
    pub(crate) fn extract_path_params(
        &self,
        operation: &Operation,
        rel_path: &str,
    ) -> std::collections::HashMap<String, String> {
        let route = self.routes.iter().find(|r| {
            r.operation.path == operation.path && r.operation.method == operation.method
        });
        let mut params = std::collections::HashMap::new();
        if let Some(route) = route {
            if let Some(captures) = route.regex.captures(rel_path) {
                for (i, name) in route.param_names.iter().enumerate() {
                    if let Some(m) = captures.get(i + 1) {
                        params.insert(name.clone(), m.as_str().to_string());
                    }
                }
            }
        }
        params
    }
}

/// Lowercase the method and canonicalize the path: query string stripped,
/// trailing slashes removed, exactly one leading slash. Idempotent; the
/// input is left untouched.
pub fn normalize_request(req: &Request) -> Request {
    let bare = req.path.split('?').next().unwrap_or("");
    let core = bare.trim_matches('/');
    let path = if core.is_empty() {
        "/".to_string()
    } else {
        format!("/{core}")
    };
    Request {
        method: req.method.to_ascii_lowercase(),
        path,
        headers: req.headers.clone(),
        query: req.query.clone(),
        body: req.body.clone(),
    }
}

/// Compile a `{name}` path template into an anchored regex plus the ordered
/// placeholder names. Each placeholder matches one non-slash segment.
pub(crate) fn path_to_regex(path: &str) -> Result<(Regex, Vec<String>), regex::Error> {
    let mut pattern = String::with_capacity(path.len() + 8);
    pattern.push('^');
    let mut param_names = Vec::new();
    for segment in path.split('/') {
        if segment.is_empty() {
            continue;
        }
        pattern.push('/');
        if segment.starts_with('{') && segment.ends_with('}') {
            param_names.push(segment[1..segment.len() - 1].to_string());
            pattern.push_str("([^/]+)");
        } else {
            pattern.push_str(&regex::escape(segment));
        }
    }
    if param_names.is_empty() && pattern == "^" {
        pattern.push('/');
    }
    pattern.push('$');
    Ok((Regex::new(&pattern)?, param_names))
}

fn template_specificity(path: &str) -> usize {
    let mut len = 0;
    let mut in_placeholder = false;
    for c in path.chars() {
        match c {
            '{' => in_placeholder = true,
            '}' => in_placeholder = false,
            _ if !in_placeholder => len += 1,
            _ => {}
        }
    }
    len
}
