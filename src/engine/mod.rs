//! # Engine Module
//!
//! The dispatcher and lifecycle facade. An [`Engine`] is built from
//! [`EngineOptions`], initialized once (document load, operation index,
//! router, validators), and then serves requests:
//!
//! 1. Route the request; misses fall back through the well-known handlers
//!    (`methodNotAllowed` → `notFound` → `notImplemented`).
//! 2. Parse the request and seed a fresh [`Context`].
//! 3. Evaluate security requirements via registered scheme handlers
//!    (OR-of-ANDs; handler return values are exposed on the context).
//! 4. Validate the request unless configured off; failures route to the
//!    `validationFail` handler when registered.
//! 5. Dispatch to the operation handler by `operationId`.
//! 6. Hand the context to `postResponseHandler` when registered.
//!
//! Handlers and well-known handlers share one signature; dispatch is a
//! table lookup, not virtual dispatch. The registries are mutable but
//! writes are meant to happen before serving.

mod core;

pub use core::{
    Context, Definition, Engine, EngineOptions, Handler, ValidateOption, WELL_KNOWN_HANDLERS,
};
