//! Route handlers

use std::sync::Arc;

use authgate::jwt::CoreClaims;
use authgate_oauth2::{
    client_credentials::{self, ClientCredentials, ClientId, ClientSecret, TokenResponse},
    scope, HasScope, Scope, ScopeToken,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{bearer::BearerToken, ApiError, AppState};

/// Scopes a token must grant to read the protected resource
pub const PROTECTED_SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// The body returned by the protected resource
#[derive(Clone, Debug, Serialize)]
pub struct ProtectedResource {
    /// A fixed greeting
    pub message: &'static str,
    /// Who the token was issued to
    pub user: UserInfo,
}

/// The caller, as described by their token
#[derive(Clone, Debug, Serialize)]
pub struct UserInfo {
    /// The `sub` claim
    pub sub: Option<String>,
    /// The `username` claim
    pub username: Option<String>,
    /// The granted scopes, space-delimited
    pub scopes: String,
}

/// Serves the protected resource
///
/// Any rejection, including a missing token, is answered with
/// `401 Unauthorized`.
#[tracing::instrument(skip_all)]
pub async fn protected(
    State(state): State<Arc<AppState>>,
    token: Option<BearerToken>,
) -> Result<Json<ProtectedResource>, ApiError> {
    let required: Vec<ScopeToken> = PROTECTED_SCOPES
        .iter()
        .map(|&s| ScopeToken::from_static(s))
        .collect();

    let token = token.as_ref().map_or("", BearerToken::as_str);

    let claims = state
        .validator()
        .validate(token, &required, state.authority(), state.issuer())
        .await
        .into_result()
        .map_err(|err| ApiError::Unauthorized(err.to_string()))?;

    Ok(Json(ProtectedResource {
        message: "This data is private",
        user: UserInfo {
            sub: claims.sub().map(|s| s.as_str().to_owned()),
            username: claims.username().map(str::to_owned),
            scopes: claims.scope().to_string(),
        },
    }))
}

/// A token submitted for inspection
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenRequest {
    /// The token to validate
    #[serde(default)]
    pub token: Option<String>,
    /// Scopes the token must grant
    ///
    /// Each entry may hold several space-delimited scopes.
    #[serde(default)]
    pub required_scopes: Option<Vec<String>>,
}

/// The answer given for an accepted token
#[derive(Clone, Debug, Serialize)]
pub struct Accepted {
    /// A fixed acknowledgement
    pub message: &'static str,
}

/// Validates a token submitted in the request body
///
/// A rejected token is answered with the status of the rejection.
#[tracing::instrument(skip_all)]
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ValidateTokenRequest>, JsonRejection>,
) -> Result<Json<Accepted>, ApiError> {
    let Json(request) = payload?;

    let token = match request.token {
        Some(token) if !token.is_empty() => token,
        _ => return Err(ApiError::BadRequest("Token is required".to_owned())),
    };

    let required: Vec<ScopeToken> = request
        .required_scopes
        .iter()
        .flatten()
        .flat_map(|s| scope::split_scope_tokens(s))
        .collect();

    let _claims = state
        .validator()
        .validate(&token, &required, state.authority(), state.issuer())
        .await
        .into_result()?;

    Ok(Json(Accepted {
        message: "Token is valid, you can pass",
    }))
}

/// Parameters for obtaining a token with the client credentials grant
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTokenRequest {
    /// The client ID
    #[serde(default)]
    pub client_id: Option<String>,
    /// The client secret
    #[serde(default)]
    pub client_secret: Option<ClientSecret>,
    /// Where to request the token
    #[serde(default)]
    pub token_endpoint: Option<String>,
    /// The scopes to request, as a space-delimited string or an array
    #[serde(default)]
    pub scopes: Option<Scope>,
}

/// Obtains a token from a token endpoint and passes it on
///
/// A refusal from the token endpoint is answered with the same status.
#[tracing::instrument(skip_all)]
pub async fn generate_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateTokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = payload?;

    let (client_id, client_secret, token_endpoint) = match (
        request.client_id.filter(|s| !s.is_empty()),
        request.client_secret.filter(|s| !s.as_str().is_empty()),
        request.token_endpoint.filter(|s| !s.is_empty()),
    ) {
        (Some(id), Some(secret), Some(endpoint)) => (id, secret, endpoint),
        _ => {
            return Err(ApiError::BadRequest(
                "Missing required parameters".to_owned(),
            ))
        }
    };

    let credentials = ClientCredentials {
        client_id: ClientId::new(client_id),
        client_secret,
        scope: request.scopes,
    };

    let token =
        client_credentials::request_token(state.client(), &token_endpoint, &credentials).await?;

    Ok(Json(token))
}
