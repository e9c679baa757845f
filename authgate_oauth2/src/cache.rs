//! Storage for key sets fetched from authorities

use std::{collections::HashMap, fmt, sync::Arc};

use arc_swap::ArcSwap;
use authgate::Jwks;
use authgate_clock::UnixTime;

/// A key set along with the time it was fetched
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedKeys {
    jwks: Jwks,
    fetched_at: UnixTime,
}

impl CachedKeys {
    /// Wraps a freshly fetched key set
    #[must_use]
    pub fn new(jwks: Jwks, fetched_at: UnixTime) -> Self {
        Self { jwks, fetched_at }
    }

    /// The cached key set
    #[must_use]
    pub fn jwks(&self) -> &Jwks {
        &self.jwks
    }

    /// When the key set was fetched
    #[must_use]
    pub fn fetched_at(&self) -> UnixTime {
        self.fetched_at
    }

    /// Whether the key set is still within `ttl` seconds of being fetched
    #[must_use]
    pub fn is_fresh(&self, now: UnixTime, ttl: u64) -> bool {
        now.duration_since(self.fetched_at).0 < ttl
    }
}

/// A store of key sets, one per authority
///
/// Implementations must replace entries atomically: a reader sees either
/// the previous set or the new one in full. Concurrent writers may race, and
/// the last write wins.
pub trait KeyCache: Send + Sync {
    /// The key set last stored for `authority`, if any
    fn get(&self, authority: &str) -> Option<Arc<CachedKeys>>;

    /// Replaces the key set stored for `authority`
    fn put(&self, authority: &str, jwks: Jwks, fetched_at: UnixTime) -> Arc<CachedKeys>;
}

impl<C: KeyCache + ?Sized> KeyCache for Arc<C> {
    #[inline]
    fn get(&self, authority: &str) -> Option<Arc<CachedKeys>> {
        C::get(self, authority)
    }

    #[inline]
    fn put(&self, authority: &str, jwks: Jwks, fetched_at: UnixTime) -> Arc<CachedKeys> {
        C::put(self, authority, jwks, fetched_at)
    }
}

/// A lock-free, in-process [`KeyCache`]
///
/// Lookups never block. Each `put` swaps in a new map that shares every
/// untouched entry with the old one.
#[derive(Default)]
pub struct InMemoryKeyCache {
    entries: ArcSwap<HashMap<String, Arc<CachedKeys>>>,
}

impl InMemoryKeyCache {
    /// Constructs an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the key set stored for `authority`
    pub fn evict(&self, authority: &str) {
        self.entries.rcu(|entries| {
            let mut entries = HashMap::clone(entries);
            entries.remove(authority);
            entries
        });
    }

    /// The number of authorities with a stored key set
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Whether nothing has been stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}

impl fmt::Debug for InMemoryKeyCache {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let entries = self.entries.load();
        f.debug_map()
            .entries(entries.iter().map(|(k, v)| (k, v.fetched_at)))
            .finish()
    }
}

impl KeyCache for InMemoryKeyCache {
    fn get(&self, authority: &str) -> Option<Arc<CachedKeys>> {
        self.entries.load().get(authority).cloned()
    }

    fn put(&self, authority: &str, jwks: Jwks, fetched_at: UnixTime) -> Arc<CachedKeys> {
        let cached = Arc::new(CachedKeys::new(jwks, fetched_at));

        self.entries.rcu(|entries| {
            let mut entries = HashMap::clone(entries);
            entries.insert(authority.to_owned(), Arc::clone(&cached));
            entries
        });

        cached
    }
}
