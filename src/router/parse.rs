use super::core::{normalize_request, QueryInput, Request, Router};
use crate::spec::{Operation, ParameterLocation, ParameterStyle};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// A request after normalization and decoding, as handlers see it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRequest {
    /// Lowercased method.
    pub method: String,
    /// Normalized path, relative to the api root.
    pub path: String,
    /// Path variables captured from the matched template.
    pub params: HashMap<String, String>,
    /// Decoded query parameters; repeated keys and `explode=false` lists
    /// become arrays.
    pub query: Map<String, Value>,
    /// Headers with lowercased names.
    pub headers: HashMap<String, String>,
    /// Cookies parsed from the `Cookie` header.
    pub cookies: HashMap<String, String>,
    /// Request body, JSON-parsed where possible.
    pub request_body: Option<Value>,
}

impl ParsedRequest {
    /// Get a header by name (names are stored lowercased).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Parse the RFC 6265 `Cookie` header value into a map.
pub(crate) fn parse_cookies(headers: &HashMap<String, String>) -> HashMap<String, String> {
    match headers.get("cookie") {
        Some(raw) => raw
            .split(';')
            .filter_map(|pair| {
                let mut parts = pair.trim().splitn(2, '=');
                let name = parts.next()?.trim();
                if name.is_empty() {
                    return None;
                }
                let value = parts.next().unwrap_or("").trim();
                Some((name.to_string(), value.to_string()))
            })
            .collect(),
        None => HashMap::new(),
    }
}

/// Decode a query string into a map, collecting repeated keys into arrays.
pub(crate) fn parse_query_string(query: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    map
}

/// Apply style-aware coercions to `in:query` parameter values.
///
/// Parameters declared with `content["application/json"]` get their raw
/// string JSON-parsed. Parameters with `explode: false` carry their whole
/// list in one entry; the entry is re-split on commas, after normalizing
/// the `spaceDelimited` / `pipeDelimited` separators (including their
/// percent-encoded forms) to commas.
fn coerce_query_styles(query: &mut Map<String, Value>, operation: &Operation) {
    for param in &operation.parameters {
        if param.location != ParameterLocation::Query {
            continue;
        }
        let Some(entry) = query.get_mut(&param.name) else {
            continue;
        };
        if param.json_content_schema().is_some() {
            if let Value::String(raw) = entry {
                if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
                    *entry = parsed;
                }
            }
            continue;
        }
        if param.explode == Some(false) {
            if let Value::String(raw) = entry {
                let joined = match param.style {
                    Some(ParameterStyle::SpaceDelimited) => {
                        raw.replace("%20", ",").replace(' ', ",")
                    }
                    Some(ParameterStyle::PipeDelimited) => {
                        raw.replace("%7C", ",").replace('|', ",")
                    }
                    _ => raw.clone(),
                };
                *entry = Value::Array(
                    joined
                        .split(',')
                        .map(|part| Value::String(part.to_string()))
                        .collect(),
                );
            }
        }
    }
}

impl Router {
    /// Produce a [`ParsedRequest`] from a raw request.
    ///
    /// Header keys are lowercased, cookies split out of the `Cookie`
    /// header, the query decoded (from the supplied map or the raw path's
    /// query string), path variables captured against the operation's
    /// template, and query parameter styles applied.
    pub fn parse_request(&self, req: &Request, operation: Option<&Operation>) -> ParsedRequest {
        let norm = normalize_request(req);

        let request_body = req.body.as_ref().map(|body| match body {
            // non-object payloads may still be JSON text; a failed parse is
            // surfaced later by the validator when JSON is required
            Value::String(raw) => serde_json::from_str::<Value>(raw)
                .unwrap_or_else(|_| Value::String(raw.clone())),
            other => other.clone(),
        });

        let headers: HashMap<String, String> = req
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        let cookies = parse_cookies(&headers);

        let mut query = match &req.query {
            Some(QueryInput::Map(map)) => map.clone(),
            Some(QueryInput::Raw(raw)) => parse_query_string(raw),
            None => req
                .path
                .split_once('?')
                .map(|(_, qs)| parse_query_string(qs))
                .unwrap_or_default(),
        };

        let path = self.normalize_path(&norm.path);
        let params = operation
            .map(|op| self.extract_path_params(op, &path))
            .unwrap_or_default();
        if let Some(op) = operation {
            coerce_query_styles(&mut query, op);
        }

        debug!(
            method = %norm.method,
            path = %path,
            param_count = params.len(),
            query_count = query.len(),
            "request parsed"
        );

        ParsedRequest {
            method: norm.method,
            path,
            params,
            query,
            headers,
            cookies,
            request_body,
        }
    }
}
