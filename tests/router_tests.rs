#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Unit tests for routing and request parsing
//!
//! # Test Coverage
//!
//! - Exact-path precedence over templates
//! - Template matching with specificity ordering (longest literal prefix)
//! - Strict-mode 404/405 errors with observable message prefixes
//! - Api-root stripping
//! - Request normalization idempotence
//! - Cookie, query, and parameter-style parsing

use openapi_engine::{
    normalize_request, EngineError, QueryInput, Request, Router,
};
use openapi_engine::spec::build_operations;
use serde_json::{json, Value};
use std::sync::Arc;

fn router_for(doc: &Value, api_root: &str) -> Router {
    let operations = build_operations(doc).into_iter().map(Arc::new).collect();
    Router::new(operations, api_root)
}

fn pets_doc() -> Value {
    json!({
        "openapi": "3.0.0",
        "paths": {
            "/pets": {
                "get": {"operationId": "listPets"},
                "post": {"operationId": "createPet"}
            },
            "/pets/{id}": {
                "get": {"operationId": "getPet"},
                "delete": {"operationId": "deletePet"}
            },
            "/pets/meta": {
                "get": {"operationId": "getPetsMeta"}
            },
            "/users/{id}/posts": {
                "get": {"operationId": "listUserPosts"}
            },
            "/users/{id}/{anything}": {
                "get": {"operationId": "getUserAnything"}
            }
        }
    })
}

#[test]
fn test_exact_match_beats_template() {
    let router = router_for(&pets_doc(), "/");
    let op = router
        .match_operation(&Request::new("GET", "/pets/meta"), false)
        .unwrap()
        .unwrap();
    assert_eq!(op.operation_id.as_deref(), Some("getPetsMeta"));
}

#[test]
fn test_template_matches_when_no_exact_path() {
    let router = router_for(&pets_doc(), "/");
    let op = router
        .match_operation(&Request::new("GET", "/pets/123"), false)
        .unwrap()
        .unwrap();
    assert_eq!(op.operation_id.as_deref(), Some("getPet"));
}

#[test]
fn test_specificity_prefers_longer_literal_prefix() {
    let router = router_for(&pets_doc(), "/");
    // /users/{id}/posts has more literal text than /users/{id}/{anything}
    let op = router
        .match_operation(&Request::new("GET", "/users/7/posts"), false)
        .unwrap()
        .unwrap();
    assert_eq!(op.operation_id.as_deref(), Some("listUserPosts"));

    let op = router
        .match_operation(&Request::new("GET", "/users/7/comments"), false)
        .unwrap()
        .unwrap();
    assert_eq!(op.operation_id.as_deref(), Some("getUserAnything"));
}

#[test]
fn test_method_routing_on_same_path() {
    let router = router_for(&pets_doc(), "/");
    let op = router
        .match_operation(&Request::new("POST", "/pets"), false)
        .unwrap()
        .unwrap();
    assert_eq!(op.operation_id.as_deref(), Some("createPet"));
}

#[test]
fn test_lax_mode_misses_yield_none() {
    let router = router_for(&pets_doc(), "/");
    assert!(router
        .match_operation(&Request::new("GET", "/nothing"), false)
        .unwrap()
        .is_none());
    assert!(router
        .match_operation(&Request::new("PATCH", "/pets"), false)
        .unwrap()
        .is_none());
}

#[test]
fn test_strict_not_found_error_prefix() {
    let router = router_for(&pets_doc(), "/");
    let err = router
        .match_operation(&Request::new("GET", "/nothing"), true)
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert!(err.to_string().starts_with("404-notFound:"));
}

#[test]
fn test_strict_method_not_allowed_error_prefix() {
    let router = router_for(&pets_doc(), "/");
    let err = router
        .match_operation(&Request::new("PATCH", "/pets"), true)
        .unwrap_err();
    assert!(matches!(err, EngineError::MethodNotAllowed { .. }));
    assert!(err.to_string().starts_with("405-methodNotAllowed:"));
}

#[test]
fn test_method_comparison_is_case_insensitive() {
    let router = router_for(&pets_doc(), "/");
    let op = router
        .match_operation(&Request::new("get", "/pets"), false)
        .unwrap()
        .unwrap();
    assert_eq!(op.operation_id.as_deref(), Some("listPets"));
}

#[test]
fn test_api_root_stripping() {
    let router = router_for(&pets_doc(), "/api/v1");
    let op = router
        .match_operation(&Request::new("GET", "/api/v1/pets"), false)
        .unwrap()
        .unwrap();
    assert_eq!(op.operation_id.as_deref(), Some("listPets"));

    // outside the api root nothing matches
    assert!(router
        .match_operation(&Request::new("GET", "/other/pets"), false)
        .unwrap()
        .is_none());
    let err = router
        .match_operation(&Request::new("GET", "/other/pets"), true)
        .unwrap_err();
    assert!(err.to_string().starts_with("404-notFound:"));
}

#[test]
fn test_normalization_handles_noise() {
    let router = router_for(&pets_doc(), "/");
    let op = router
        .match_operation(&Request::new("GET", "/pets/?limit=5"), false)
        .unwrap()
        .unwrap();
    assert_eq!(op.operation_id.as_deref(), Some("listPets"));
}

#[test]
fn test_normalize_request_idempotent() {
    let raw = Request::new("GeT", "//pets///?a=1");
    let once = normalize_request(&raw);
    let twice = normalize_request(&once);
    assert_eq!(once.method, twice.method);
    assert_eq!(once.path, twice.path);
    assert_eq!(once.path, "/pets");
}

#[test]
fn test_parse_request_extracts_everything() {
    let doc = json!({
        "paths": {
            "/users/{userId}/posts/{postId}": {
                "get": {"operationId": "getUserPost"}
            }
        }
    });
    let router = router_for(&doc, "/");
    let op = build_operations(&doc).remove(0);

    let mut req = Request::new("GET", "/users/7/posts/42?verbose=true");
    req.headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Cookie".to_string(), "session=abc; theme=dark".to_string()),
    ];
    req.body = Some(json!(r#"{"note":"hi"}"#));

    let parsed = router.parse_request(&req, Some(&op));
    assert_eq!(parsed.method, "get");
    assert_eq!(parsed.path, "/users/7/posts/42");
    assert_eq!(parsed.params.get("userId").map(String::as_str), Some("7"));
    assert_eq!(parsed.params.get("postId").map(String::as_str), Some("42"));
    assert_eq!(parsed.query["verbose"], json!("true"));
    assert_eq!(
        parsed.headers.get("content-type").map(String::as_str),
        Some("application/json")
    );
    assert_eq!(parsed.cookies.get("session").map(String::as_str), Some("abc"));
    assert_eq!(parsed.cookies.get("theme").map(String::as_str), Some("dark"));
    // string bodies holding JSON text are parsed
    assert_eq!(parsed.request_body, Some(json!({"note": "hi"})));
}

#[test]
fn test_parse_request_reparse_is_stable() {
    let doc = json!({
        "paths": {"/pets/{id}": {"get": {"operationId": "getPet"}}}
    });
    let router = router_for(&doc, "/");
    let op = build_operations(&doc).remove(0);
    let req = Request::new("GET", "/pets/9?tag=cat");

    let parsed = router.parse_request(&req, Some(&op));
    let renormalized = Request {
        method: parsed.method.clone(),
        path: parsed.path.clone(),
        ..Request::new("", "")
    };
    let reparsed = router.parse_request(&renormalized, Some(&op));
    assert_eq!(reparsed.method, parsed.method);
    assert_eq!(reparsed.path, parsed.path);
    assert_eq!(reparsed.params, parsed.params);
}

#[test]
fn test_query_styles_comma_space_pipe() {
    let doc = json!({
        "paths": {"/search": {"get": {
            "operationId": "search",
            "parameters": [
                {"name": "form", "in": "query", "style": "form", "explode": false,
                 "schema": {"type": "array", "items": {"type": "string"}}},
                {"name": "space", "in": "query", "style": "spaceDelimited", "explode": false,
                 "schema": {"type": "array", "items": {"type": "string"}}},
                {"name": "pipe", "in": "query", "style": "pipeDelimited", "explode": false,
                 "schema": {"type": "array", "items": {"type": "string"}}}
            ]
        }}}
    });
    let router = router_for(&doc, "/");
    let op = build_operations(&doc).remove(0);

    let req = Request::new("GET", "/search?form=1,2,3");
    let parsed = router.parse_request(&req, Some(&op));
    assert_eq!(parsed.query["form"], json!(["1", "2", "3"]));

    let req = Request::new("GET", "/search?space=1%202%203");
    let parsed = router.parse_request(&req, Some(&op));
    assert_eq!(parsed.query["space"], json!(["1", "2", "3"]));

    let req = Request::new("GET", "/search?pipe=1|2|3");
    let parsed = router.parse_request(&req, Some(&op));
    assert_eq!(parsed.query["pipe"], json!(["1", "2", "3"]));
}

#[test]
fn test_query_json_content_parameter() {
    let doc = json!({
        "paths": {"/search": {"get": {
            "operationId": "search",
            "parameters": [
                {"name": "filter", "in": "query", "content": {
                    "application/json": {"schema": {"type": "object"}}
                }}
            ]
        }}}
    });
    let router = router_for(&doc, "/");
    let op = build_operations(&doc).remove(0);

    let mut req = Request::new("GET", "/search");
    req.query = Some(QueryInput::Raw("filter={\"tag\":\"cat\"}".to_string()));
    let parsed = router.parse_request(&req, Some(&op));
    assert_eq!(parsed.query["filter"], json!({"tag": "cat"}));
}

#[test]
fn test_query_map_input_is_cloned() {
    let doc = json!({
        "paths": {"/search": {"get": {"operationId": "search"}}}
    });
    let router = router_for(&doc, "/");
    let op = build_operations(&doc).remove(0);

    let mut map = serde_json::Map::new();
    map.insert("q".to_string(), json!("cats"));
    let mut req = Request::new("GET", "/search");
    req.query = Some(QueryInput::Map(map));
    let parsed = router.parse_request(&req, Some(&op));
    assert_eq!(parsed.query["q"], json!("cats"));
}

#[test]
fn test_unparseable_string_body_left_as_is() {
    let doc = json!({
        "paths": {"/pets": {"post": {"operationId": "createPet"}}}
    });
    let router = router_for(&doc, "/");
    let op = build_operations(&doc).remove(0);

    let mut req = Request::new("POST", "/pets");
    req.body = Some(json!("{not json"));
    let parsed = router.parse_request(&req, Some(&op));
    assert_eq!(parsed.request_body, Some(json!("{not json")));
}
