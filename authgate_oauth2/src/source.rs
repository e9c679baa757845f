//! Where key sets come from

use std::error::Error as StdError;
#[cfg(feature = "reqwest")]
use std::time::Duration;

use async_trait::async_trait;
use authgate::Jwks;
#[cfg(feature = "reqwest")]
use reqwest::Client;
use thiserror::Error;

/// The key set could not be obtained
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the connection failed
    #[error("request failed")]
    Transport(#[source] Box<dyn StdError + Send + Sync + 'static>),

    /// The endpoint answered with a status other than 2xx
    #[error("unexpected response status {status}")]
    UnexpectedStatus {
        /// The HTTP status code
        status: u16,
    },

    /// The response body is not a key set
    #[error("response body is not a valid key set")]
    InvalidBody(#[source] Box<dyn StdError + Send + Sync + 'static>),
}

impl FetchError {
    /// Wraps a transport failure
    pub fn transport(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Transport(Box::new(err))
    }

    /// Wraps a body decoding failure
    pub fn invalid_body(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::InvalidBody(Box::new(err))
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_body(err)
    }
}

/// A source of key sets
///
/// The resolver calls [`fetch`](Self::fetch) with the full key set URL
/// whenever its cache cannot answer a lookup.
#[async_trait]
pub trait JwksSource: Send + Sync {
    /// Retrieves the key set published at `url`
    async fn fetch(&self, url: &str) -> Result<Jwks, FetchError>;
}

#[async_trait]
impl<S: JwksSource + ?Sized> JwksSource for std::sync::Arc<S> {
    async fn fetch(&self, url: &str) -> Result<Jwks, FetchError> {
        S::fetch(self, url).await
    }
}

/// Fetches key sets over HTTP
#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
#[derive(Clone, Debug)]
pub struct HttpJwksSource {
    client: Client,
}

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
impl HttpJwksSource {
    /// Constructs a source with a default client and no request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(Self::client_builder().build()?))
    }

    /// Constructs a source whose requests give up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(
            Self::client_builder().timeout(timeout).build()?,
        ))
    }

    /// Constructs a source from an existing client
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn client_builder() -> reqwest::ClientBuilder {
        Client::builder().user_agent(concat!("authgate_oauth2/", env!("CARGO_PKG_VERSION")))
    }
}

#[cfg(feature = "reqwest")]
#[async_trait]
impl JwksSource for HttpJwksSource {
    #[tracing::instrument(skip_all, fields(jwks.url = %url))]
    async fn fetch(&self, url: &str) -> Result<Jwks, FetchError> {
        tracing::debug!("fetching JWKS");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                let error: &dyn StdError = &err;
                tracing::warn!(error, "JWKS fetch failed; unable to send request");
                return Err(FetchError::transport(err));
            }
        };

        if let Err(err) = response.error_for_status_ref() {
            let error: &dyn StdError = &err;
            tracing::warn!(
                error,
                http.status_code = response.status().as_u16(),
                "JWKS fetch failed; unexpected response status",
            );
            return Err(FetchError::UnexpectedStatus {
                status: response.status().as_u16(),
            });
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                let error: &dyn StdError = &err;
                tracing::warn!(error, "JWKS fetch failed; unable to read body");
                return Err(FetchError::transport(err));
            }
        };

        match serde_json::from_slice::<Jwks>(&body) {
            Ok(jwks) => {
                tracing::info!(jwks.keys = jwks.keys().len(), "JWKS refreshed");
                Ok(jwks)
            }
            Err(err) => {
                let error: &dyn StdError = &err;
                tracing::warn!(error, "JWKS fetch failed; unexpected body");
                Err(err.into())
            }
        }
    }
}
