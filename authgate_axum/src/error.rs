//! Error responses produced by the API

use authgate_oauth2::{client_credentials::TokenRequestError, Reason, ValidationError};
use axum::{
    extract::rejection::JsonRejection,
    response::{IntoResponse, Response},
    Json,
};
use http::{header, HeaderValue, StatusCode};
use serde_json::json;
use thiserror::Error;

/// A failed API request
#[derive(Debug, Error)]
pub enum ApiError {
    /// The bearer token on the request was missing or rejected
    #[error("{0}")]
    Unauthorized(String),

    /// A token submitted for inspection was rejected
    #[error(transparent)]
    Rejected(ValidationError),

    /// The request body was incomplete or invalid
    #[error("{0}")]
    BadRequest(String),

    /// The token endpoint refused to issue a token
    #[error("Failed to generate token")]
    TokenEndpoint {
        /// The status the token endpoint answered with
        status: u16,
        /// The OAuth2 error code
        error: Option<String>,
        /// The human-readable error description
        error_description: Option<String>,
    },

    /// The token endpoint could not be reached or answered with garbage
    #[error("Error connecting to token endpoint")]
    TokenEndpointUnreachable(#[source] TokenRequestError),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Rejected(err)
    }
}

impl From<TokenRequestError> for ApiError {
    fn from(err: TokenRequestError) -> Self {
        match err {
            TokenRequestError::ErrorResponse {
                status,
                error,
                error_description,
            } => Self::TokenEndpoint {
                status,
                error,
                error_description,
            },
            other => Self::TokenEndpointUnreachable(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "unreadable request body");
        Self::BadRequest("Invalid request body".to_owned())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized(message) => {
                let challenge = invalid_token(&message);
                (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, challenge)],
                    Json(json!({ "error": message })),
                )
                    .into_response()
            }
            Self::Rejected(err) => {
                let status = err.status();
                let message = err.to_string();
                let body = Json(json!({
                    "error": {
                        "message": &message,
                        "status": status,
                    },
                }));
                let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

                match err.reason() {
                    Reason::InsufficientScope => (
                        code,
                        [(header::WWW_AUTHENTICATE, insufficient_scope(&message))],
                        body,
                    )
                        .into_response(),
                    _ if code == StatusCode::UNAUTHORIZED => (
                        code,
                        [(header::WWW_AUTHENTICATE, invalid_token(&message))],
                        body,
                    )
                        .into_response(),
                    _ => (code, body).into_response(),
                }
            }
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "message": message }))).into_response()
            }
            Self::TokenEndpoint {
                status,
                error,
                error_description,
            } => {
                let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (
                    code,
                    Json(json!({
                        "message": "Failed to generate token",
                        "error": error,
                        "error_description": error_description,
                    })),
                )
                    .into_response()
            }
            Self::TokenEndpointUnreachable(err) => {
                let error: &dyn std::error::Error = &err;
                tracing::warn!(error, "unable to obtain token from token endpoint");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "Error connecting to token endpoint" })),
                )
                    .into_response()
            }
        }
    }
}

const INVALID_TOKEN: &str = r#"Bearer error="invalid_token""#;
const INSUFFICIENT_SCOPE: &str = r#"Bearer error="insufficient_scope""#;

fn invalid_token(description: &str) -> HeaderValue {
    challenge(INVALID_TOKEN, description)
}

fn insufficient_scope(description: &str) -> HeaderValue {
    challenge(INSUFFICIENT_SCOPE, description)
}

// `escape_default` leaves only printable ASCII, so the formatted value is
// always a valid header value.
fn challenge(base: &'static str, description: &str) -> HeaderValue {
    if description.is_empty() {
        return HeaderValue::from_static(base);
    }

    HeaderValue::try_from(format!(
        r#"{base} error_description="{}""#,
        description.escape_default()
    ))
    .unwrap_or_else(|_| HeaderValue::from_static(base))
}
