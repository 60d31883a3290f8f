//! TTL-cached URL lookup.

use std::time::Duration;

use async_trait::async_trait;

use qmdown_core::cache::{DEFAULT_TTL, TtlCache};
use qmdown_core::download::QualityTier;
use qmdown_core::ports::{LookupError, UrlLookupPort, UrlMap};

/// Cache key: the requested identifiers (sorted, deduplicated) and the tier id.
type LookupKey = (Vec<String>, String);

/// Wraps a [`UrlLookupPort`] so repeated identical requests within the TTL
/// are answered from memory.
///
/// The request order of identifiers does not matter. Failed lookups are
/// passed through and not cached.
pub struct CachedUrlLookup<L> {
    inner: L,
    cache: TtlCache<LookupKey, UrlMap>,
}

impl<L: UrlLookupPort> CachedUrlLookup<L> {
    /// Wrap `inner` with entries living for `ttl`.
    pub fn new(inner: L, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
        }
    }

    /// Wrap `inner` with the default two-minute lifetime.
    pub fn with_default_ttl(inner: L) -> Self {
        Self::new(inner, DEFAULT_TTL)
    }

    /// The wrapped lookup.
    pub const fn inner(&self) -> &L {
        &self.inner
    }

    /// The backing cache.
    pub const fn cache(&self) -> &TtlCache<LookupKey, UrlMap> {
        &self.cache
    }
}

fn cache_key(ids: &[String], tier: &QualityTier) -> LookupKey {
    let mut ids = ids.to_vec();
    ids.sort();
    ids.dedup();
    (ids, tier.id.clone())
}

#[async_trait]
impl<L: UrlLookupPort> UrlLookupPort for CachedUrlLookup<L> {
    async fn lookup_urls(&self, ids: &[String], tier: &QualityTier) -> Result<UrlMap, LookupError> {
        self.cache
            .get_or_try_insert_with(cache_key(ids, tier), || self.inner.lookup_urls(ids, tier))
            .await
    }
}
