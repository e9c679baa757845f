//! Bearer token validation for OAuth2 resource servers
//!
//! A [`TokenValidator`] accepts a token only if it is signed by a key the
//! authority publishes at `{authority}/.well-known/jwks.json`, is within its
//! validity period, names the expected issuer, and grants every required
//! [scope](scope::Scope). Key sets are fetched on demand and cached per
//! authority.
//!
//! Scopes follow the definition of OAuth2 in
//! [RFC 6749](https://datatracker.ietf.org/doc/html/rfc6749).
//!
//! # Feature flags
//!
//! The `reqwest` feature (on by default) provides [`HttpJwksSource`] and the
//! [`client_credentials`] grant. This crate does not enable TLS support in
//! `reqwest` itself. If your application already uses `reqwest` with some
//! TLS settings, those settings are used automatically. Otherwise, enable
//! the `default-tls` or `rustls-tls` feature to call out to HTTPS endpoints.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod cache;
mod claims;
#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub mod client_credentials;
pub mod outcome;
pub mod resolver;
pub mod scope;
pub mod source;
mod validator;

pub use cache::{CachedKeys, InMemoryKeyCache, KeyCache};
pub use claims::Claims;
pub use outcome::{Reason, Severity, ValidationError, ValidationOutcome};
pub use resolver::{KeyResolver, ResolveError};
pub use scope::{HasScope, InsufficientScope, Scope, ScopeToken, ScopeTokenRef};
#[cfg(feature = "reqwest")]
pub use source::HttpJwksSource;
pub use source::{FetchError, JwksSource};
pub use validator::{TokenValidator, ValidatorConfig};
