//! Requesting tokens with the client credentials grant
//!
//! A single form POST to the authority's token endpoint as described in
//! [RFC 6749, Section 4.4](https://datatracker.ietf.org/doc/html/rfc6749#section-4.4).
//! No retries are attempted and nothing is cached.

use std::fmt;

use aliri_braid::braid;
use authgate_clock::DurationSecs;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::scope::Scope;

/// A client ID
#[braid(serde, ref_doc = "A borrowed reference to a [`ClientId`]")]
pub struct ClientId;

/// A client secret
#[braid(
    serde,
    debug = "owned",
    display = "owned",
    ord = "omit",
    ref_doc = "A borrowed reference to a [`ClientSecret`]"
)]
pub struct ClientSecret;

/// An access token issued by an authority
#[braid(
    serde,
    debug = "owned",
    display = "owned",
    ord = "omit",
    ref_doc = "A borrowed reference to an [`AccessToken`]"
)]
pub struct AccessToken;

macro_rules! redacted {
    ($ty:ty: $hidden:literal) => {
        /// Prints a placeholder unless the alternate form (`{:#}`) is requested
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str(&self.0)
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(concat!("***", $hidden, "***"))
            }
        }
    };
}

redacted!(ClientSecretRef: "CLIENT SECRET");
redacted!(AccessTokenRef: "ACCESS TOKEN");

/// Credentials for the client credentials grant
#[derive(Clone, Debug)]
pub struct ClientCredentials {
    /// The client ID
    pub client_id: ClientId,

    /// The client secret
    pub client_secret: ClientSecret,

    /// The scope to request, if any
    pub scope: Option<Scope>,
}

impl Serialize for ClientCredentials {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut ser = serializer.serialize_struct("ClientCredentials", 4)?;
        ser.serialize_field("grant_type", "client_credentials")?;
        ser.serialize_field("client_id", &self.client_id)?;
        ser.serialize_field("client_secret", &self.client_secret)?;
        match &self.scope {
            Some(scope) if !scope.is_empty() => ser.serialize_field("scope", scope)?,
            _ => ser.skip_field("scope")?,
        }
        ser.end()
    }
}

/// A successful token response
///
/// Fields the authority adds beyond the standard ones are kept in `extra`
/// so that the response can be passed on unchanged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The issued access token
    pub access_token: AccessToken,

    /// The token type, usually `Bearer`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Seconds until the access token expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<DurationSecs>,

    /// The granted scope, if it differs from the requested one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Any other fields in the response
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// An error while attempting to request a new token from the authority
#[derive(Debug, Error)]
pub enum TokenRequestError {
    /// Unable to send a token request to the authority
    #[error("error sending request to authority")]
    RequestSend(#[source] reqwest::Error),

    /// Unable to read the response
    #[error("error reading response body")]
    BodyRead(#[source] reqwest::Error),

    /// The authority answered with an error status
    #[error("authority rejected token request with status {status}")]
    ErrorResponse {
        /// The HTTP status code
        status: u16,
        /// The OAuth2 error code, if the body carried one
        error: Option<String>,
        /// The human-readable error description, if the body carried one
        error_description: Option<String>,
    },

    /// Unable to deserialize the token body
    #[error("error deserializing token body from authority")]
    TokenBody(#[from] serde_json::Error),
}

/// Requests an access token using the client credentials grant
///
/// # Errors
///
/// Returns an error if the request cannot be sent, if the authority
/// answers with a non-2xx status, or if the response is not a token.
#[tracing::instrument(
    err,
    skip(client, credentials),
    fields(
        credentials.grant_type = "client_credentials",
        credentials.client_id = %credentials.client_id,
    ),
)]
pub async fn request_token(
    client: &reqwest::Client,
    token_url: &str,
    credentials: &ClientCredentials,
) -> Result<TokenResponse, TokenRequestError> {
    tracing::trace!("requesting token from authority");

    let resp = client
        .post(token_url)
        .form(credentials)
        .send()
        .await
        .map_err(TokenRequestError::RequestSend)?;

    let status = resp.status().as_u16();
    tracing::debug!(
        response.status = status,
        "received token response from issuing authority"
    );

    let body = resp
        .bytes()
        .await
        .map_err(TokenRequestError::BodyRead)?;

    if !(200..300).contains(&status) {
        let ErrorBody {
            error,
            error_description,
        } = serde_json::from_slice(&body).unwrap_or_default();

        return Err(TokenRequestError::ErrorResponse {
            status,
            error,
            error_description,
        });
    }

    let token: TokenResponse = serde_json::from_slice(&body)?;

    tracing::info!(
        token_type = token.token_type.as_deref(),
        expires_in = token.expires_in.map(|d| d.0),
        "received new token"
    );

    Ok(token)
}
