//! # openapi-engine
//!
//! A framework-agnostic backend engine driven by an OpenAPI 3.0 contract.
//! Given a raw request (method, path, headers, body, query, cookies) it
//! matches the request to an operation declared in the contract, validates
//! inputs against the operation's parameter and body schemas, applies the
//! declared security requirements through pluggable authenticators,
//! dispatches to a registered operation handler, and can synthesize mock
//! responses and validate responses and response headers.
//!
//! ## Architecture
//!
//! - **[`spec`]** - document loading, structural checks, the operation
//!   index, and cycle-safe `$ref` expansion
//! - **[`router`]** - request normalization, path-template matching with
//!   specificity ordering, and request parsing
//! - **[`validator`]** - per-operation request/response/header validators
//!   compiled from synthesized composite schemas
//! - **[`mock`]** - mock responses from examples or schema instantiation
//! - **[`security`]** - pluggable scheme handlers and OR-of-ANDs
//!   requirement evaluation
//! - **[`status`]** - status-code resolution over exact / `NXX` / `default`
//!   response keys
//! - **[`engine`]** - the dispatcher tying it all together
//!
//! Transports stay outside: any HTTP framework (or test harness) can build
//! a [`Request`] and hand it to [`Engine::handle_request`]. JSON Schema
//! execution is delegated to the `jsonschema` crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use openapi_engine::{Engine, EngineOptions, Request};
//! use serde_json::json;
//!
//! let mut engine = Engine::new(EngineOptions::new("openapi.yaml"));
//! engine.init().expect("contract should load");
//! engine
//!     .register_handler("listPets", |_ctx| json!([{"id": 1, "name": "Garfield"}]))
//!     .expect("listPets is declared in the contract");
//!
//! let response = engine.handle_request(&Request::new("GET", "/pets"));
//! ```
//!
//! ## Lifecycle
//!
//! `init` loads and checks the document and compiles every index and
//! validator exactly once; request handling never mutates them. The handler
//! registries are configure-then-serve. Strict mode turns tolerated
//! problems (bad documents, unknown handler ids, routing misses in direct
//! matches) into errors; lax mode logs them and keeps the engine partially
//! usable.

pub mod engine;
pub mod error;
pub mod mock;
pub mod router;
pub mod security;
pub mod spec;
pub mod status;
pub mod validator;

pub use engine::{
    Context, Definition, Engine, EngineOptions, Handler, ValidateOption, WELL_KNOWN_HANDLERS,
};
pub use error::EngineError;
pub use mock::MockOptions;
pub use router::{normalize_request, ParsedRequest, QueryInput, Request, Router};
pub use security::{SecurityHandler, SecurityOutcome};
pub use spec::{
    load_document, Operation, Parameter, ParameterLocation, ParameterStyle, SecurityRequirement,
    SpecIssue,
};
pub use validator::{SetMatchType, ValidationError, ValidationOutcome};
