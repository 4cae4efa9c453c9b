use crate::error::EngineError;
use crate::mock::{mock_response, MockOptions};
use crate::router::{ParsedRequest, Request, RouteLookup, Router};
use crate::security::{evaluate_requirements, SecurityHandler, SecurityOutcome};
use crate::spec::{
    build_operations, check_document, extract_security_schemes, load_document, report_issues,
    IssueSeverity, Operation, SpecIssue,
};
use crate::validator::{
    build_validator_set, SetMatchType, ValidationOutcome, ValidatorSet,
};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The well-known handler slots next to operation ids.
pub const WELL_KNOWN_HANDLERS: [&str; 6] = [
    "notFound",
    "notImplemented",
    "methodNotAllowed",
    "validationFail",
    "unauthorizedHandler",
    "postResponseHandler",
];

/// An operation or well-known handler. Receives the mutable request
/// context; whatever it returns becomes `context.response`.
pub type Handler = Arc<dyn Fn(&mut Context) -> Value + Send + Sync>;

/// The object every handler works on: one per request, never shared.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub request: ParsedRequest,
    pub operation: Option<Arc<Operation>>,
    pub validation: ValidationOutcome,
    pub security: SecurityOutcome,
    pub response: Option<Value>,
}

/// Where the contract comes from.
#[derive(Debug, Clone)]
pub enum Definition {
    /// An in-memory document.
    Document(Value),
    /// A YAML or JSON file path.
    File(String),
}

impl From<Value> for Definition {
    fn from(document: Value) -> Self {
        Definition::Document(document)
    }
}

impl From<&str> for Definition {
    fn from(path: &str) -> Self {
        Definition::File(path.to_string())
    }
}

impl From<String> for Definition {
    fn from(path: String) -> Self {
        Definition::File(path)
    }
}

/// Whether `handle_request` validates requests before dispatching.
#[derive(Clone, Default)]
pub enum ValidateOption {
    #[default]
    Always,
    Never,
    /// Per-request predicate over the context.
    When(Arc<dyn Fn(&Context) -> bool + Send + Sync>),
}

impl From<bool> for ValidateOption {
    fn from(on: bool) -> Self {
        if on {
            ValidateOption::Always
        } else {
            ValidateOption::Never
        }
    }
}

impl std::fmt::Debug for ValidateOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidateOption::Always => write!(f, "Always"),
            ValidateOption::Never => write!(f, "Never"),
            ValidateOption::When(_) => write!(f, "When(..)"),
        }
    }
}

/// Engine configuration. Cloned into the engine, so a caller may keep and
/// reuse the options value freely.
#[derive(Clone)]
pub struct EngineOptions {
    pub definition: Definition,
    /// Path prefix stripped before routing.
    pub api_root: String,
    /// Strict mode turns tolerated problems into errors: bad documents at
    /// init, unknown ids at registration, routing misses in direct matches.
    pub strict: bool,
    /// Skip the structural document checks at init.
    pub quick: bool,
    pub validate: ValidateOption,
    handlers: Vec<(String, Handler)>,
    security_handlers: Vec<(String, SecurityHandler)>,
}

impl EngineOptions {
    pub fn new(definition: impl Into<Definition>) -> Self {
        EngineOptions {
            definition: definition.into(),
            api_root: "/".to_string(),
            strict: false,
            quick: false,
            validate: ValidateOption::Always,
            handlers: Vec::new(),
            security_handlers: Vec::new(),
        }
    }

    pub fn api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn quick(mut self, quick: bool) -> Self {
        self.quick = quick;
        self
    }

    pub fn validate(mut self, validate: impl Into<ValidateOption>) -> Self {
        self.validate = validate.into();
        self
    }

    /// Queue a handler for registration during `init`.
    pub fn handler<F>(mut self, id: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Context) -> Value + Send + Sync + 'static,
    {
        self.handlers.push((id.into(), Arc::new(handler)));
        self
    }

    /// Queue a security handler for registration during `init`.
    pub fn security_handler<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Context) -> Value + Send + Sync + 'static,
    {
        self.security_handlers.push((name.into(), Arc::new(handler)));
        self
    }
}

/// The engine: compiled contract, registries, and the request lifecycle.
///
/// Built once from an [`EngineOptions`], initialized once with [`init`],
/// then served. All compiled state is read-only during request handling;
/// the handler registries are mutable but meant to be configured before
/// serving.
///
/// [`init`]: Engine::init
pub struct Engine {
    definition: Definition,
    api_root: String,
    strict: bool,
    quick: bool,
    validate: ValidateOption,
    document: Value,
    operations: Vec<Arc<Operation>>,
    router: Option<Router>,
    validators: ValidatorSet,
    security_schemes: IndexMap<String, Value>,
    handlers: HashMap<String, Handler>,
    security_handlers: HashMap<String, SecurityHandler>,
    pending_handlers: Vec<(String, Handler)>,
    pending_security_handlers: Vec<(String, SecurityHandler)>,
    issues: Vec<SpecIssue>,
    initialized: bool,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        Engine {
            definition: options.definition,
            api_root: options.api_root,
            strict: options.strict,
            quick: options.quick,
            validate: options.validate,
            document: Value::Null,
            operations: Vec::new(),
            router: None,
            validators: ValidatorSet::default(),
            security_schemes: IndexMap::new(),
            handlers: HashMap::new(),
            security_handlers: HashMap::new(),
            pending_handlers: options.handlers,
            pending_security_handlers: options.security_handlers,
            issues: Vec::new(),
            initialized: false,
        }
    }

    /// Load the document, build the operation index, router, and
    /// validators, and register the queued handlers.
    ///
    /// In strict mode any load or structural failure is an error; otherwise
    /// problems are logged and the engine stays partially usable (a bad
    /// schema just means that operation has no validator).
    pub fn init(&mut self) -> Result<(), EngineError> {
        let document = match self.load_definition() {
            Ok(document) => document,
            Err(err) => {
                if self.strict {
                    return Err(err);
                }
                warn!(error = %err, "definition load failed; continuing with empty document");
                Value::Object(Map::new())
            }
        };

        if !self.quick {
            let issues = check_document(&document);
            report_issues(&issues);
            if self.strict {
                if let Some(issue) = issues
                    .iter()
                    .find(|i| i.severity == IssueSeverity::Error)
                {
                    return Err(EngineError::InvalidDocument(format!(
                        "{}: {}",
                        issue.location, issue.message
                    )));
                }
            }
            self.issues = issues;
        }

        self.operations = build_operations(&document)
            .into_iter()
            .map(Arc::new)
            .collect();
        self.router = Some(Router::new(self.operations.clone(), &self.api_root));
        self.validators = build_validator_set(&document, &self.operations, self.strict)?;
        self.security_schemes = extract_security_schemes(&document);
        self.document = document;
        self.initialized = true;

        for (id, handler) in std::mem::take(&mut self.pending_handlers) {
            self.register_handler_arc(&id, handler)?;
        }
        for (name, handler) in std::mem::take(&mut self.pending_security_handlers) {
            self.register_security_handler_arc(&name, handler)?;
        }

        info!(
            operations = self.operations.len(),
            strict = self.strict,
            quick = self.quick,
            "engine initialized"
        );
        Ok(())
    }

    fn load_definition(&self) -> Result<Value, EngineError> {
        match &self.definition {
            Definition::Document(document) => Ok(document.clone()),
            Definition::File(path) => Ok(load_document(path)?),
        }
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Structural issues collected at init (empty in quick mode).
    pub fn issues(&self) -> &[SpecIssue] {
        &self.issues
    }

    pub fn operations(&self) -> &[Arc<Operation>] {
        &self.operations
    }

    /// Linear scan for the first operation with this id.
    pub fn operation(&self, operation_id: &str) -> Option<Arc<Operation>> {
        self.operations
            .iter()
            .find(|op| op.operation_id.as_deref() == Some(operation_id))
            .cloned()
    }

    pub fn router(&self) -> Option<&Router> {
        self.router.as_ref()
    }

    /// Every id a handler may be registered under: all operation ids plus
    /// the well-known slots.
    pub fn allowed_handlers(&self) -> Vec<String> {
        let mut allowed: Vec<String> = WELL_KNOWN_HANDLERS
            .iter()
            .map(|s| s.to_string())
            .collect();
        allowed.extend(
            self.operations
                .iter()
                .filter_map(|op| op.operation_id.clone()),
        );
        allowed
    }

    fn is_allowed_handler(&self, id: &str) -> bool {
        WELL_KNOWN_HANDLERS.contains(&id)
            || self
                .operations
                .iter()
                .any(|op| op.operation_id.as_deref() == Some(id))
    }

    /// Register a handler for an operation id or well-known slot.
    ///
    /// Unknown ids are an error in strict mode and a warning otherwise
    /// (the registration still happens, matching configure-then-serve use
    /// where the contract may still be loading).
    pub fn register_handler<F>(&mut self, id: &str, handler: F) -> Result<(), EngineError>
    where
        F: Fn(&mut Context) -> Value + Send + Sync + 'static,
    {
        self.register_handler_arc(id, Arc::new(handler))
    }

    fn register_handler_arc(&mut self, id: &str, handler: Handler) -> Result<(), EngineError> {
        if !self.is_allowed_handler(id) {
            if self.strict {
                return Err(EngineError::UnknownHandler(id.to_string()));
            }
            warn!(id, "registering handler for an id the contract does not declare");
        }
        debug!(id, "handler registered");
        self.handlers.insert(id.to_string(), handler);
        Ok(())
    }

    /// Register several handlers at once.
    pub fn register_handlers<I>(&mut self, handlers: I) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = (String, Handler)>,
    {
        for (id, handler) in handlers {
            self.register_handler_arc(&id, handler)?;
        }
        Ok(())
    }

    /// Look a registered handler up by id.
    pub fn handler(&self, id: &str) -> Option<&Handler> {
        self.handlers.get(id)
    }

    /// Register an authenticator for a named security scheme.
    pub fn register_security_handler<F>(
        &mut self,
        name: &str,
        handler: F,
    ) -> Result<(), EngineError>
    where
        F: Fn(&Context) -> Value + Send + Sync + 'static,
    {
        self.register_security_handler_arc(name, Arc::new(handler))
    }

    fn register_security_handler_arc(
        &mut self,
        name: &str,
        handler: SecurityHandler,
    ) -> Result<(), EngineError> {
        if !self.security_schemes.contains_key(name) {
            if self.strict {
                return Err(EngineError::UnknownSecurityScheme(name.to_string()));
            }
            warn!(name, "registering security handler for an undeclared scheme");
        }
        self.security_handlers.insert(name.to_string(), handler);
        Ok(())
    }

    /// Run the full request lifecycle: route, parse, authenticate,
    /// validate, dispatch, post-process.
    ///
    /// Routing misses never error here; they fall back through the
    /// well-known handlers (`methodNotAllowed` → `notFound` →
    /// `notImplemented`). Only a completely empty fallback chain is an
    /// error, as is calling before `init`.
    pub fn handle_request(&self, req: &Request) -> Result<Value, EngineError> {
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }
        let router = self.router.as_ref().ok_or(EngineError::NotInitialized)?;

        let lookup = router.lookup(req);
        let operation = match &lookup {
            RouteLookup::Matched(op) => Some(Arc::clone(op)),
            _ => None,
        };
        let parsed = router.parse_request(req, operation.as_deref());
        let mut context = Context {
            request: parsed,
            operation: operation.clone(),
            validation: ValidationOutcome::valid(),
            security: SecurityOutcome::open(),
            response: None,
        };

        let operation = match lookup {
            RouteLookup::Matched(op) => op,
            RouteLookup::MethodMismatch => {
                debug!(method = %req.method, path = %req.path, "method mismatch; invoking fallback");
                return self.run_fallback(
                    context,
                    &["methodNotAllowed", "notFound", "notImplemented"],
                );
            }
            RouteLookup::NoPath => {
                debug!(method = %req.method, path = %req.path, "no route; invoking fallback");
                return self.run_fallback(context, &["notFound", "notImplemented"]);
            }
        };

        if !operation.security.is_empty() {
            let mut results = IndexMap::new();
            for requirement in &operation.security {
                for scheme in requirement.0.keys() {
                    if results.contains_key(scheme) {
                        continue;
                    }
                    let value = match self.security_handlers.get(scheme) {
                        Some(handler) => handler(&context),
                        None => {
                            debug!(%scheme, "no security handler registered for scheme");
                            Value::Null
                        }
                    };
                    results.insert(scheme.clone(), value);
                }
            }
            let authorized = evaluate_requirements(&operation.security, &results);
            context.security = SecurityOutcome {
                authorized,
                results,
            };
            if !authorized {
                warn!(
                    operation_id = operation.operation_id.as_deref().unwrap_or(""),
                    "request not authorized"
                );
                if let Some(handler) = self.handlers.get("unauthorizedHandler").cloned() {
                    return self.finish(context, handler);
                }
                // without an unauthorized handler the operation observes
                // the failed auth itself via context.security
            }
        }

        let should_validate = match &self.validate {
            ValidateOption::Always => true,
            ValidateOption::Never => false,
            ValidateOption::When(predicate) => predicate(&context),
        };
        if should_validate {
            if let Some(id) = operation.operation_id.as_deref() {
                if self.validators.get(id).is_some() {
                    context.validation =
                        self.validators.validate_request(&operation, &context.request)?;
                }
            }
            if !context.validation.valid {
                if let Some(handler) = self.handlers.get("validationFail").cloned() {
                    return self.finish(context, handler);
                }
            }
        }

        let handler = operation
            .operation_id
            .as_deref()
            .and_then(|id| self.handlers.get(id))
            .cloned();
        match handler {
            Some(handler) => self.finish(context, handler),
            None => {
                let missing = operation
                    .operation_id
                    .clone()
                    .unwrap_or_else(|| "notImplemented".to_string());
                debug!(id = %missing, "no operation handler; invoking notImplemented");
                match self.handlers.get("notImplemented").cloned() {
                    Some(handler) => self.finish(context, handler),
                    None => Err(EngineError::HandlerNotRegistered(missing)),
                }
            }
        }
    }

    fn run_fallback(&self, context: Context, chain: &[&str]) -> Result<Value, EngineError> {
        for slot in chain {
            if let Some(handler) = self.handlers.get(*slot).cloned() {
                return self.finish(context, handler);
            }
        }
        Err(EngineError::HandlerNotRegistered(
            chain.last().unwrap_or(&"notImplemented").to_string(),
        ))
    }

    fn finish(&self, mut context: Context, handler: Handler) -> Result<Value, EngineError> {
        let response = handler(&mut context);
        context.response = Some(response);
        if let Some(post) = self.handlers.get("postResponseHandler").cloned() {
            return Ok(post(&mut context));
        }
        Ok(context.response.unwrap_or(Value::Null))
    }

    /// Validate a request outside the dispatch flow.
    ///
    /// Without an explicit operation id the request is routed first; a
    /// request that resolves to no addressable operation is a programmer
    /// error, unlike invalid input which comes back as an outcome.
    pub fn validate_request(
        &self,
        req: &Request,
        operation_id: Option<&str>,
    ) -> Result<ValidationOutcome, EngineError> {
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }
        let router = self.router.as_ref().ok_or(EngineError::NotInitialized)?;
        let operation = match operation_id {
            Some(id) => Some(
                self.operation(id)
                    .ok_or_else(|| EngineError::UnknownOperation(id.to_string()))?,
            ),
            None => router.match_operation(req, false)?,
        };
        let operation = operation.ok_or_else(|| {
            EngineError::UnknownOperation(format!("{} {}", req.method, req.path))
        })?;
        let parsed = router.parse_request(req, Some(operation.as_ref()));
        self.validators.validate_request(&operation, &parsed)
    }

    /// Validate a response body for an operation.
    pub fn validate_response(
        &self,
        operation_id: &str,
        response: &Value,
        status: Option<u16>,
    ) -> Result<ValidationOutcome, EngineError> {
        self.operation(operation_id)
            .ok_or_else(|| EngineError::UnknownOperation(operation_id.to_string()))?;
        self.validators.validate_response(operation_id, response, status)
    }

    /// Validate response headers for an operation.
    pub fn validate_response_headers(
        &self,
        operation_id: &str,
        headers: &Map<String, Value>,
        status: Option<u16>,
        set_match: SetMatchType,
    ) -> Result<ValidationOutcome, EngineError> {
        self.operation(operation_id)
            .ok_or_else(|| EngineError::UnknownOperation(operation_id.to_string()))?;
        self.validators
            .validate_response_headers(operation_id, headers, status, set_match)
    }

    /// Synthesize a mock response for an operation from its examples or
    /// schemas.
    pub fn mock_response_for_operation(
        &self,
        operation_id: &str,
        options: &MockOptions,
    ) -> Result<(u16, Value), EngineError> {
        let operation = self
            .operation(operation_id)
            .ok_or_else(|| EngineError::UnknownOperation(operation_id.to_string()))?;
        mock_response(&self.document, &operation, options)
            .ok_or_else(|| EngineError::NoMockableResponse(operation_id.to_string()))
    }
}
