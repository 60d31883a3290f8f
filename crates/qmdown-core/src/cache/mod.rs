//! Time-to-live memoization for idempotent async lookups.
//!
//! A [`TtlCache`] holds one value per key together with its expiry time.
//! All access goes through a single async mutex that stays locked while a
//! miss is being filled, so concurrent callers are serialized even for
//! unrelated keys. This trades throughput for the guarantee that a key is
//! never fetched twice concurrently.
//!
//! Entries expire lazily: a stale entry is removed by the next access to
//! its key. There is no background sweep and no capacity limit. Failed
//! lookups are never stored.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use qmdown_core::cache::memoize;
//!
//! # tokio_test::block_on(async {
//! let detail = memoize(
//!     |mid: String| async move { Ok::<_, std::io::Error>(format!("detail of {mid}")) },
//!     |mid: &String| mid.clone(),
//!     Duration::from_secs(120),
//! );
//! let first = detail.call("003OUlho2HcRHC".to_string()).await.unwrap();
//! let again = detail.call("003OUlho2HcRHC".to_string()).await.unwrap();
//! assert_eq!(first, again);
//! # });
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::marker::PhantomData;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(120);

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Keyed value store with per-entry expiry.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Debug,
    V: Clone,
{
    /// Create an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Entry lifetime.
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the live value for `key`, or run `init` and store its result.
    ///
    /// The cache lock is held while `init` runs. If `init` fails the error is
    /// returned as-is and nothing is stored.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        if let Some(entry) = entries.get(&key) {
            if now < entry.expires_at {
                tracing::debug!(target: "qmdown.cache", key = ?key, "cache hit");
                return Ok(entry.value.clone());
            }
            entries.remove(&key);
            tracing::debug!(target: "qmdown.cache", key = ?key, "cache entry expired");
        }

        tracing::debug!(
            target: "qmdown.cache",
            key = ?key,
            entries = entries.len(),
            "cache miss"
        );
        let value = init().await?;
        entries.insert(
            key,
            CacheEntry {
                value: value.clone(),
                expires_at: now + self.ttl,
            },
        );
        Ok(value)
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

/// An async function wrapped with a [`TtlCache`].
///
/// Created by [`memoize`]. Cloning is not supported; share it behind an
/// `Arc` so every caller sees the same cache.
pub struct Memoized<A, F, KF, K, V> {
    lookup: F,
    key_fn: KF,
    cache: TtlCache<K, V>,
    _args: PhantomData<fn(A)>,
}

/// Wrap an idempotent async `lookup`, keying calls with `key_fn`.
pub fn memoize<A, F, Fut, E, KF, K, V>(
    lookup: F,
    key_fn: KF,
    ttl: Duration,
) -> Memoized<A, F, KF, K, V>
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<V, E>>,
    KF: Fn(&A) -> K,
    K: Eq + Hash + Debug,
    V: Clone,
{
    Memoized {
        lookup,
        key_fn,
        cache: TtlCache::new(ttl),
        _args: PhantomData,
    }
}

impl<A, F, KF, K, V> Memoized<A, F, KF, K, V>
where
    KF: Fn(&A) -> K,
    K: Eq + Hash + Debug,
    V: Clone,
{
    /// Call through the cache.
    pub async fn call<Fut, E>(&self, args: A) -> Result<V, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let key = (self.key_fn)(&args);
        self.cache
            .get_or_try_insert_with(key, || (self.lookup)(args))
            .await
    }

    /// The backing cache.
    pub const fn cache(&self) -> &TtlCache<K, V> {
        &self.cache
    }
}
