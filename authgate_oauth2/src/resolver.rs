//! Resolution of key IDs to published keys

use std::{fmt, sync::Arc};

use authgate::{error::UnsupportedKeyType, jwk::KeyIdRef, Jwk};
use authgate_clock::{Clock, System};
use thiserror::Error;

use crate::{
    cache::{CachedKeys, KeyCache},
    source::{FetchError, JwksSource},
};

/// Where an authority publishes its key set
const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Key sets are reused for a day unless a lookup misses
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// The key set URL for an authority
///
/// A single trailing `/` on the authority is ignored.
///
/// ```
/// use authgate_oauth2::resolver::jwks_url;
///
/// assert_eq!(
///     jwks_url("https://idp.example.com/"),
///     "https://idp.example.com/.well-known/jwks.json",
/// );
/// ```
#[must_use]
pub fn jwks_url(authority: &str) -> String {
    format!("{}{}", normalize_authority(authority), JWKS_PATH)
}

fn normalize_authority(authority: &str) -> &str {
    authority.strip_suffix('/').unwrap_or(authority)
}

/// A key could not be resolved
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The authority's key set could not be fetched
    #[error("unable to fetch {url}: {source}")]
    KeyFetchFailed {
        /// The key set URL
        url: String,
        /// Why the fetch failed
        #[source]
        source: FetchError,
    },

    /// No key with the requested ID is published, even after a fresh fetch
    #[error("Token key (kid) not found in JWKS")]
    KeyNotFound {
        /// The requested key ID
        kid: String,
    },

    /// The key exists but cannot verify signatures
    #[error("Unsupported key type, only RSA is supported")]
    UnsupportedKeyType(#[from] UnsupportedKeyType),
}

/// A key found in a cached key set
///
/// Holds the set alive so that the key can be borrowed while a concurrent
/// refresh replaces the cache entry.
#[derive(Clone, Debug)]
pub struct ResolvedKey {
    keys: Arc<CachedKeys>,
    index: usize,
}

impl ResolvedKey {
    fn find(keys: Arc<CachedKeys>, kid: &KeyIdRef) -> Option<Self> {
        // The last entry published under an ID wins
        let index = keys.jwks().keys().iter().rposition(|k| k.key_id() == kid)?;
        Some(Self { keys, index })
    }

    /// The resolved key
    #[must_use]
    pub fn jwk(&self) -> &Jwk {
        &self.keys.jwks().keys()[self.index]
    }

    /// The key set the key was found in
    #[must_use]
    pub fn keys(&self) -> &Arc<CachedKeys> {
        &self.keys
    }
}

/// Resolves `(authority, kid)` pairs to verification keys
///
/// Each authority's key set is cached for a fixed time to live. Within that
/// window a lookup is answered from the cache if the key is present. A
/// lookup that misses, or that finds no fresh set, fetches the set again and
/// replaces the cache entry before searching once more.
pub struct KeyResolver<S, K, C = System> {
    source: S,
    cache: K,
    ttl: u64,
    clock: C,
}

impl<S, K> KeyResolver<S, K> {
    /// Constructs a resolver with the default time to live and the system clock
    pub fn new(source: S, cache: K) -> Self {
        Self {
            source,
            cache,
            ttl: DEFAULT_CACHE_TTL_SECS,
            clock: System,
        }
    }
}

impl<S, K, C> KeyResolver<S, K, C> {
    /// Sets how long, in seconds, a fetched key set is trusted
    #[must_use]
    pub fn with_ttl_secs(self, ttl: u64) -> Self {
        Self { ttl, ..self }
    }

    /// Replaces the clock used to judge freshness
    pub fn with_clock<C2>(self, clock: C2) -> KeyResolver<S, K, C2> {
        KeyResolver {
            source: self.source,
            cache: self.cache,
            ttl: self.ttl,
            clock,
        }
    }

    /// The configured time to live, in seconds
    #[must_use]
    pub fn ttl_secs(&self) -> u64 {
        self.ttl
    }

    /// The key set source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The key cache
    pub fn cache(&self) -> &K {
        &self.cache
    }

    /// The clock used to judge freshness
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<S, K, C> fmt::Debug for KeyResolver<S, K, C>
where
    K: fmt::Debug,
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KeyResolver")
            .field("cache", &self.cache)
            .field("ttl", &self.ttl)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl<S, K, C> KeyResolver<S, K, C>
where
    S: JwksSource,
    K: KeyCache,
    C: Clock,
{
    /// Finds the RSA key published by `authority` under `kid`
    ///
    /// # Errors
    ///
    /// Returns an error if the key set cannot be fetched, if no key has the
    /// given ID after a fresh fetch, or if the key is not an RSA key.
    #[tracing::instrument(skip(self, kid), fields(jwk.kid = %kid))]
    pub async fn resolve(
        &self,
        authority: &str,
        kid: &KeyIdRef,
    ) -> Result<ResolvedKey, ResolveError> {
        let authority = normalize_authority(authority);

        if let Some(cached) = self.cache.get(authority) {
            if cached.is_fresh(self.clock.now(), self.ttl) {
                if let Some(found) = ResolvedKey::find(cached, kid) {
                    tracing::debug!("JWKS cache hit");
                    found.jwk().ensure_supported()?;
                    return Ok(found);
                }
                tracing::debug!("key ID not in cached JWKS");
            } else {
                tracing::debug!("cached JWKS expired");
            }
        } else {
            tracing::debug!("JWKS cache miss");
        }

        let url = jwks_url(authority);
        let jwks = self
            .source
            .fetch(&url)
            .await
            .map_err(|source| ResolveError::KeyFetchFailed { url, source })?;

        let cached = self.cache.put(authority, jwks, self.clock.now());

        let found = ResolvedKey::find(cached, kid).ok_or_else(|| {
            tracing::debug!("unable to find matching key");
            ResolveError::KeyNotFound {
                kid: kid.as_str().to_owned(),
            }
        })?;

        found.jwk().ensure_supported()?;
        Ok(found)
    }
}
