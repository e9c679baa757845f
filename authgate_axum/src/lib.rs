//! An `axum` resource server guarded by bearer tokens
//!
//! The server trusts a single OAuth2 authority. Tokens are validated with
//! [`authgate_oauth2::TokenValidator`] against the key set the authority
//! publishes, which is fetched on first use and cached.
//!
//! Three routes are exposed:
//!
//! * `GET /api/protected` requires a bearer token granting `openid`,
//!   `email`, and `profile`
//! * `POST /api/validate-token` reports whether a submitted token grants the
//!   submitted scopes
//! * `POST /api/generate-token` obtains a token from a token endpoint using
//!   the client credentials grant
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use authgate_axum::{config::Opts, router};
//! use clap::Parser;
//!
//! # async fn run() -> color_eyre::Result<()> {
//! let opts = Opts::parse();
//! let listen = opts.listen;
//! let app = router(Arc::new(opts.into_state()?));
//!
//! let listener = tokio::net::TcpListener::bind(listen).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

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

use std::sync::Arc;

use authgate_oauth2::{HttpJwksSource, InMemoryKeyCache, TokenValidator};
use axum::{
    routing::{get, post},
    Router,
};

pub mod bearer;
pub mod config;
mod error;
pub mod routes;

pub use error::ApiError;

/// The validator used by the server
pub type HttpTokenValidator = TokenValidator<HttpJwksSource, InMemoryKeyCache>;

/// State shared by every request
#[derive(Debug)]
pub struct AppState {
    validator: HttpTokenValidator,
    authority: String,
    issuer: Option<String>,
    client: reqwest::Client,
}

impl AppState {
    /// Constructs the state for a server that trusts `authority`
    ///
    /// `client` is used for requests to token endpoints.
    pub fn new(
        validator: HttpTokenValidator,
        authority: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            validator,
            authority: authority.into(),
            issuer: None,
            client,
        }
    }

    /// Expects `issuer` in the `iss` claim instead of the authority
    #[must_use]
    pub fn with_issuer(self, issuer: impl Into<String>) -> Self {
        Self {
            issuer: Some(issuer.into()),
            ..self
        }
    }

    /// The trusted authority
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// The expected issuer, if it differs from the authority
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// The token validator
    #[must_use]
    pub fn validator(&self) -> &HttpTokenValidator {
        &self.validator
    }

    /// The client used for requests to token endpoints
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

/// Builds the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/protected", get(routes::protected))
        .route("/api/validate-token", post(routes::validate_token))
        .route("/api/generate-token", post(routes::generate_token))
        .with_state(state)
}
