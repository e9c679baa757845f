//! Server configuration, read from flags or the environment

use std::{net::SocketAddr, time::Duration};

use authgate_oauth2::{
    resolver::DEFAULT_CACHE_TTL_SECS, HttpJwksSource, InMemoryKeyCache, TokenValidator,
    ValidatorConfig,
};
use clap::Parser;

use crate::AppState;

const USER_AGENT: &str = concat!("authgate_axum/", env!("CARGO_PKG_VERSION"));

/// Configuration for the resource server
///
/// Every option may also be set through its `AUTHGATE_*` environment
/// variable. A `.env` file in the working directory is loaded first.
#[derive(Clone, Debug, Parser)]
#[command(version, about)]
pub struct Opts {
    /// The authority whose key set is trusted
    ///
    /// Keys are fetched from `{authority}/.well-known/jwks.json`.
    #[arg(long, env = "AUTHGATE_AUTHORITY")]
    pub authority: Option<String>,

    /// The expected `iss` claim, if it differs from the authority
    #[arg(long, env = "AUTHGATE_ISSUER")]
    pub issuer: Option<String>,

    /// The address to listen on
    #[arg(long, env = "AUTHGATE_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// How long a fetched key set is trusted, in seconds
    #[arg(long, env = "AUTHGATE_JWKS_TTL_SECS", default_value_t = DEFAULT_CACHE_TTL_SECS)]
    pub jwks_ttl_secs: u64,

    /// Grace period on `exp` and `nbf`, in seconds
    #[arg(long, env = "AUTHGATE_LEEWAY_SECS", default_value_t = 0)]
    pub leeway_secs: u64,

    /// Timeout for calls to the authority, in seconds
    #[arg(long, env = "AUTHGATE_HTTP_TIMEOUT_SECS", default_value_t = 10)]
    pub http_timeout_secs: u64,
}

impl Opts {
    /// The validator settings described by these options
    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig::new()
            .with_cache_ttl(Duration::from_secs(self.jwks_ttl_secs))
            .with_leeway(Duration::from_secs(self.leeway_secs))
    }

    /// Builds the shared server state
    ///
    /// A missing authority is not an error here. Requests are answered with
    /// a server error instead, so that misconfiguration is visible to
    /// callers.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn into_state(self) -> Result<AppState, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(self.http_timeout_secs))
            .build()?;

        let validator = TokenValidator::new(
            HttpJwksSource::with_client(client.clone()),
            InMemoryKeyCache::new(),
            self.validator_config(),
        );

        let authority = self.authority.unwrap_or_default();
        if authority.is_empty() {
            tracing::warn!("no authority configured; every token will be rejected");
        }

        let mut state = AppState::new(validator, authority, client);
        if let Some(issuer) = self.issuer {
            state = state.with_issuer(issuer);
        }

        Ok(state)
    }
}
