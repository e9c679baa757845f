//! Extracting bearer tokens from the `Authorization` header

use axum::{async_trait, extract::FromRequestParts};
use http::{header, request::Parts, HeaderMap};
use thiserror::Error;

use crate::error::ApiError;

/// An error while attempting to extract a bearer token from headers
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Error)]
pub enum BearerError {
    /// The request does not have an authorization header
    #[error("authorization header missing")]
    MissingAuthorizationHeader,

    /// The authorization scheme is incorrect
    #[error("authorization scheme is not 'bearer'")]
    IncorrectAuthorizationScheme,
}

/// Extracts the token from an `Authorization` header value
///
/// The scheme is matched without regard to case, and whitespace around the
/// token is dropped.
///
/// ```
/// use authgate_axum::bearer::{extract_bearer, BearerError};
///
/// assert_eq!(extract_bearer("bearer abc.def.ghi"), Ok("abc.def.ghi"));
/// assert_eq!(
///     extract_bearer("Basic dXNlcjpwYXNz"),
///     Err(BearerError::IncorrectAuthorizationScheme)
/// );
/// ```
pub fn extract_bearer(auth: &str) -> Result<&str, BearerError> {
    if auth.len() <= 7 || !auth.is_char_boundary(7) || !auth[..7].eq_ignore_ascii_case("bearer ") {
        return Err(BearerError::IncorrectAuthorizationScheme);
    }

    Ok(auth[7..].trim())
}

/// Extracts the bearer token from a request's headers
pub fn bearer_from_headers(headers: &HeaderMap) -> Result<&str, BearerError> {
    let auth = headers
        .get(header::AUTHORIZATION)
        .ok_or(BearerError::MissingAuthorizationHeader)?
        .to_str()
        .map_err(|_| BearerError::IncorrectAuthorizationScheme)?;

    extract_bearer(auth)
}

/// A bearer token taken from the `Authorization` header
///
/// Rejects the request with `401 Unauthorized` when no bearer token is
/// present. Use `Option<BearerToken>` to handle that case in the handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BearerToken(pub String);

impl BearerToken {
    /// The raw token
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match bearer_from_headers(&parts.headers) {
            Ok(token) if !token.is_empty() => Ok(Self(token.to_owned())),
            Ok(_) => Err(ApiError::Unauthorized("No token provided".to_owned())),
            Err(err) => {
                tracing::debug!(error = %err, "no bearer token on request");
                Err(ApiError::Unauthorized("No token provided".to_owned()))
            }
        }
    }
}
