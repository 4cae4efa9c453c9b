use thiserror::Error;

/// Errors surfaced by the engine outside of validation outcomes.
///
/// Validation failures are data ([`crate::validator::ValidationOutcome`]),
/// never errors. This enum covers routing failures in strict matches,
/// lifecycle misuse, and programmer errors such as registering a handler
/// for an id the contract does not declare.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No operation matched the request path (strict routing only).
    #[error("404-notFound: no operation matches {method} {path}")]
    NotFound { method: String, path: String },

    /// The path matched but no operation accepts the method (strict routing only).
    #[error("405-methodNotAllowed: {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    /// A request path was exercised before `init` completed.
    #[error("engine not initialized")]
    NotInitialized,

    /// An operation id was passed that the contract does not declare.
    #[error("unknown operation {0}")]
    UnknownOperation(String),

    /// `register_handler` was called with an id outside `allowed_handlers`.
    #[error("unknown handler id {0}")]
    UnknownHandler(String),

    /// `register_security_handler` was called for an undeclared scheme.
    #[error("unknown security scheme {0}")]
    UnknownSecurityScheme(String),

    /// The routing fallback chain ran out of registered handlers.
    #[error("no handler registered for {0}")]
    HandlerNotRegistered(String),

    /// An unrecognized set-match type was requested for header validation.
    #[error("unknown set match type {0}")]
    UnknownSetMatchType(String),

    /// The operation declares no response a mock could be built from.
    #[error("no mockable response for {0}")]
    NoMockableResponse(String),

    /// The document failed structural checks at init (strict mode).
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The definition could not be read or parsed.
    #[error(transparent)]
    Load(#[from] anyhow::Error),
}
