//! The token validation pipeline

use std::{fmt, time::Duration};

use authgate::{
    jwt::{Audience, BasicHeaders, CoreHeaders, CoreValidator, Decomposed, Issuer},
    JwtRef,
};
use authgate_clock::{Clock, System};

use crate::{
    cache::KeyCache,
    claims::Claims,
    outcome::{ValidationError, ValidationOutcome},
    resolver::{KeyResolver, DEFAULT_CACHE_TTL_SECS},
    scope::{authorize, HasScope, ScopeToken},
    source::JwksSource,
};

/// Settings for a [`TokenValidator`]
///
/// By default, key sets are cached for 24 hours, no leeway is given on
/// `exp` and `nbf`, tokens without `exp` are accepted, any audience is
/// accepted, and time is read from the system clock.
#[derive(Clone, Debug)]
#[must_use]
pub struct ValidatorConfig<C = System> {
    cache_ttl: Duration,
    core: CoreValidator,
    clock: C,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            core: CoreValidator::default(),
            clock: System,
        }
    }
}

impl ValidatorConfig {
    /// The default configuration
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C> ValidatorConfig<C> {
    /// Sets how long a fetched key set is trusted
    pub fn with_cache_ttl(self, cache_ttl: Duration) -> Self {
        Self { cache_ttl, ..self }
    }

    /// Allows a grace period on either side of `exp` and `nbf`
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self {
            core: self.core.with_leeway(leeway),
            ..self
        }
    }

    /// Accepts tokens issued for `audience`
    ///
    /// Once any audience is added, tokens for other audiences are rejected.
    pub fn add_allowed_audience(self, audience: Audience) -> Self {
        Self {
            core: self.core.add_allowed_audience(audience),
            ..self
        }
    }

    /// Rejects tokens without an `exp` claim
    pub fn require_expiration(self) -> Self {
        Self {
            core: self.core.require_expiration(),
            ..self
        }
    }

    /// Replaces the clock used for expiry and cache freshness
    pub fn with_clock<C2>(self, clock: C2) -> ValidatorConfig<C2> {
        ValidatorConfig {
            cache_ttl: self.cache_ttl,
            core: self.core,
            clock,
        }
    }

    /// How long a fetched key set is trusted
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// The grace period on `exp` and `nbf`
    #[must_use]
    pub fn leeway(&self) -> Duration {
        self.core.leeway()
    }
}

/// Validates bearer tokens issued by OAuth2 authorities
///
/// Each call to [`validate`](Self::validate) runs the whole pipeline:
///
/// 1. reject an empty token or authority
/// 2. decode the header and claims and read the `kid`
/// 3. resolve the key from the authority's key set
/// 4. check `exp` and `nbf`, then the signature, then issuer and audience
/// 5. check that every required scope was granted
///
/// The only state carried between calls is the key cache.
///
/// # Example
///
/// ```no_run
/// use authgate_oauth2::{
///     HttpJwksSource, InMemoryKeyCache, ScopeToken, TokenValidator, ValidationOutcome,
///     ValidatorConfig,
/// };
///
/// # async fn example(token: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let validator = TokenValidator::new(
///     HttpJwksSource::new()?,
///     InMemoryKeyCache::new(),
///     ValidatorConfig::new(),
/// );
///
/// let required = [ScopeToken::from_static("read")];
/// match validator
///     .validate(token, &required, "https://idp.example.com/", None)
///     .await
/// {
///     ValidationOutcome::Valid(claims) => println!("welcome {:?}", claims),
///     ValidationOutcome::Invalid(err) => println!("{} ({})", err, err.status()),
/// }
/// # Ok(())
/// # }
/// ```
pub struct TokenValidator<S, K, C = System> {
    resolver: KeyResolver<S, K, C>,
    core: CoreValidator,
}

impl<S, K, C> TokenValidator<S, K, C> {
    /// Constructs a validator that fetches key sets from `source` and keeps
    /// them in `cache`
    pub fn new(source: S, cache: K, config: ValidatorConfig<C>) -> Self {
        // Partial seconds round up
        let ttl_secs = config
            .cache_ttl
            .as_secs()
            .saturating_add(u64::from(config.cache_ttl.subsec_nanos() > 0));

        let resolver = KeyResolver::new(source, cache)
            .with_ttl_secs(ttl_secs)
            .with_clock(config.clock);

        Self {
            resolver,
            core: config.core,
        }
    }

    /// The key resolver used by this validator
    pub fn resolver(&self) -> &KeyResolver<S, K, C> {
        &self.resolver
    }
}

impl<S, K, C> fmt::Debug for TokenValidator<S, K, C>
where
    K: fmt::Debug,
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenValidator")
            .field("resolver", &self.resolver)
            .field("core", &self.core)
            .finish()
    }
}

impl<S, K, C> TokenValidator<S, K, C>
where
    S: JwksSource,
    K: KeyCache,
    C: Clock,
{
    /// Validates `token` against the keys published by `authority`
    ///
    /// The token's `iss` must equal `issuer`, or `authority` verbatim if no
    /// issuer is given. If `required_scopes` is not empty, every one of them
    /// must have been granted.
    ///
    /// Every failure is reported as [`ValidationOutcome::Invalid`].
    #[tracing::instrument(skip(self, token, required_scopes))]
    pub async fn validate(
        &self,
        token: &str,
        required_scopes: &[ScopeToken],
        authority: &str,
        issuer: Option<&str>,
    ) -> ValidationOutcome {
        let result = self
            .validate_inner(token, required_scopes, authority, issuer)
            .await;

        if let Err(err) = &result {
            let error: &dyn std::error::Error = err;
            tracing::debug!(error, reason = ?err.reason(), "token rejected");
        }

        result.into()
    }

    async fn validate_inner(
        &self,
        token: &str,
        required_scopes: &[ScopeToken],
        authority: &str,
        issuer: Option<&str>,
    ) -> Result<Claims, ValidationError> {
        if token.is_empty() {
            return Err(ValidationError::NoToken);
        }

        if authority.is_empty() {
            return Err(ValidationError::AuthorityMissing);
        }

        let decomposed: Decomposed<Claims, BasicHeaders> = JwtRef::from_str(token).decompose()?;

        let kid = decomposed
            .untrusted_header()
            .kid()
            .filter(|kid| !kid.as_str().is_empty())
            .ok_or(ValidationError::MissingKeyId)?;

        let key = self.resolver.resolve(authority, kid).await?;

        let issuer = Issuer::new(issuer.unwrap_or(authority).to_owned());
        let validator = self.core.clone().require_issuer(issuer);

        let validated = decomposed.verify(key.jwk(), &validator, self.resolver.clock())?;
        let (_, claims) = validated.extract();

        authorize(claims.scope(), required_scopes)?;

        Ok(claims)
    }
}
