//! Verification primitives for JSON Web Tokens signed with published RSA keys
//!
//! This crate implements the parts of the JOSE standards a resource server
//! needs in order to accept bearer tokens:
//!
//! * JSON Web Signature (JWS) verification: [RFC7515][]
//! * JSON Web Key (JWK) sets: [RFC7517][]
//! * The RSA family of JSON Web Algorithms (JWA): [RFC7518][]
//! * JSON Web Token (JWT) decoding and claims checks: [RFC7519][]
//!
//! Signing is not supported.
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515
//! [RFC7517]: https://tools.ietf.org/html/rfc7517
//! [RFC7518]: https://tools.ietf.org/html/rfc7518
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//!
//! # Example
//!
//! ```
//! use authgate::{jwt, jwt::CoreHeaders, Jwks, JwtRef};
//!
//! let jwks: Jwks = serde_json::from_str(r#"{"keys":[]}"#).unwrap();
//! let token = JwtRef::from_str("eyJhbGciOiJSUzI1NiIsImtpZCI6ImFiYyJ9.eyJzdWIiOiJ1In0.c2ln");
//!
//! let decomposed: jwt::Decomposed = token.decompose().unwrap();
//! let kid = decomposed.untrusted_header().kid().unwrap();
//!
//! assert!(jwks.get_key_by_id(kid).is_none());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod b64;
pub mod error;
pub mod jwa;
pub mod jwk;
mod jwks;
pub mod jws;
pub mod jwt;


#[doc(inline)]
pub use jwk::Jwk;
#[doc(inline)]
pub use jwks::Jwks;
#[doc(inline)]
pub use jwt::{Jwt, JwtRef};
