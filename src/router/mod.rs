//! # Router Module
//!
//! Request normalization, path-template matching, and request parsing.
//!
//! Matching is exact-first: a path that literally equals a declared route
//! wins over any template. Template matches (`{name}` placeholders, one
//! non-slash segment each) are ordered by specificity, the length of the
//! template with every placeholder removed, so `/pets/meta` beats
//! `/pets/{id}` and `/users/{id}/posts` beats `/users/{id}`. Ties keep
//! index order.
//!
//! Strictness only changes how a miss is reported: strict calls get an
//! error with a `404-notFound:` or `405-methodNotAllowed:` prefix, lax
//! calls get `None` and leave fallback handling to the dispatcher.

mod core;
mod parse;

pub use core::{normalize_request, QueryInput, Request, RouteLookup, Router};
pub use parse::ParsedRequest;
