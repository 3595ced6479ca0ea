//! # Universal Resolver + Cache (C5)
//!
//! Dispatches a DID to the driver registered for its method, fronted by a
//! TTL+LRU cache that coalesces concurrent lookups of the same DID into one
//! driver call (spec §4.5). Positive entries' TTL is derived from the
//! resolved document's `updated` timestamp when present; negative entries
//! (`notFound`) use a short TTL so a just-published DID becomes resolvable
//! again quickly. Only `Ok` and `notFound` outcomes are cached — transient
//! failures are retried on the next call.

mod cache;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::did::{DidDriver, DidResolutionError, ResolutionOptions, ResolutionResult};
use cache::{CacheEntry, ResolverExpiry};

/// Positive cache entry TTL when the document carries no `updated` timestamp.
pub const DEFAULT_POSITIVE_TTL_SECS: u64 = 300;
/// Cache entry TTL for `notFound` results.
pub const DEFAULT_NEGATIVE_TTL_SECS: u64 = 30;
/// Default cache capacity, in entries.
pub const DEFAULT_CACHE_CAPACITY: u64 = 1024;

/// Dispatches DIDs to registered [`DidDriver`]s and caches results.
pub struct UniversalResolver {
    drivers: HashMap<&'static str, Arc<dyn DidDriver>>,
    cache: Cache<String, CacheEntry>,
    positive_ttl: Duration,
    negative_ttl: Duration,
}

impl UniversalResolver {
    /// Build a resolver with the default cache capacity and TTLs.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Build a resolver with a custom cache capacity (LRU eviction once
    /// exceeded), default TTLs.
    #[must_use]
    pub fn with_capacity(capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(capacity).expire_after(ResolverExpiry).build();
        Self {
            drivers: HashMap::new(),
            cache,
            positive_ttl: Duration::from_secs(DEFAULT_POSITIVE_TTL_SECS),
            negative_ttl: Duration::from_secs(DEFAULT_NEGATIVE_TTL_SECS),
        }
    }

    /// Override the positive/negative TTLs (builder-style).
    #[must_use]
    pub const fn with_ttls(mut self, positive: Duration, negative: Duration) -> Self {
        self.positive_ttl = positive;
        self.negative_ttl = negative;
        self
    }

    /// Register a driver for the method it declares via [`DidDriver::method`].
    /// Registering a second driver for the same method replaces the first.
    pub fn register(&mut self, driver: Arc<dyn DidDriver>) {
        self.drivers.insert(driver.method(), driver);
    }

    fn method_of(did: &str) -> Option<&str> {
        did.strip_prefix("did:")?.split(':').next()
    }

    async fn dispatch(&self, did: &str, options: &ResolutionOptions) -> ResolutionResult {
        let Some(method) = Self::method_of(did) else {
            tracing::warn!(did, "not a DID");
            return ResolutionResult::error(DidResolutionError::InvalidDid, format!("not a DID: {did}"));
        };
        let Some(driver) = self.drivers.get(method) else {
            tracing::warn!(did, method, "no driver registered for method");
            return ResolutionResult::error(
                DidResolutionError::MethodNotSupported,
                format!("no driver registered for method {method}"),
            );
        };
        tracing::debug!(did, method, "dispatching to driver");
        let result = driver.resolve(did, options).await;
        tracing::debug!(did, method, error = ?result.did_resolution_metadata.error, "driver resolution complete");
        result
    }

    /// Positive-entry TTL: when the document carries an `updated`
    /// timestamp, the entry lives for however long the document has
    /// already been stable, capped at `positive_ttl` — a document updated
    /// seconds ago is rechecked again soon, one untouched for days gets
    /// the full default (spec §4.5). Without `updated`, `positive_ttl`
    /// applies unconditionally.
    fn ttl_for(&self, result: &ResolutionResult) -> Duration {
        if result.is_ok() {
            result.did_document_metadata.updated.map_or(self.positive_ttl, |updated| {
                let age = chrono::Utc::now().signed_duration_since(updated);
                age.to_std().map_or(self.positive_ttl, |age| age.min(self.positive_ttl))
            })
        } else if result.did_resolution_metadata.error == Some(DidResolutionError::NotFound) {
            self.negative_ttl
        } else {
            Duration::ZERO
        }
    }

    /// Resolve `did`, consulting the cache unless `options.force_refresh` is
    /// set.
    pub async fn resolve(&self, did: &str, options: &ResolutionOptions) -> ResolutionResult {
        if options.force_refresh {
            let result = self.dispatch(did, options).await;
            let ttl = self.ttl_for(&result);
            self.cache.insert(did.to_string(), CacheEntry { result: result.clone(), ttl }).await;
            return result;
        }

        if self.cache.contains_key(did) {
            tracing::trace!(did, "resolver cache hit");
        }
        let entry = self
            .cache
            .get_with(did.to_string(), async {
                let result = self.dispatch(did, options).await;
                let ttl = self.ttl_for(&result);
                CacheEntry { result, ttl }
            })
            .await;
        entry.result
    }

    /// Evict the cached entry for `did`, if any.
    pub async fn invalidate(&self, did: &str) {
        self.cache.invalidate(did).await;
    }
}

impl Default for UniversalResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::did::DidDocument;

    struct CountingDriver {
        calls: Arc<AtomicUsize>,
        method: &'static str,
        outcome: fn(&str) -> ResolutionResult,
    }

    #[async_trait::async_trait]
    impl DidDriver for CountingDriver {
        fn method(&self) -> &'static str {
            self.method
        }

        async fn resolve(&self, did: &str, _options: &ResolutionOptions) -> ResolutionResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)(did)
        }
    }

    fn ok_result(did: &str) -> ResolutionResult {
        ResolutionResult::ok(
            DidDocument { id: did.to_string(), ..Default::default() },
            crate::did::DocumentMetadata::default(),
        )
    }

    fn not_found_result(did: &str) -> ResolutionResult {
        ResolutionResult::error(DidResolutionError::NotFound, format!("{did} absent"))
    }

    #[tokio::test]
    async fn caches_successful_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = UniversalResolver::new();
        resolver.register(Arc::new(CountingDriver { calls: calls.clone(), method: "example", outcome: ok_result }));

        let options = ResolutionOptions::default();
        resolver.resolve("did:example:1", &options).await;
        resolver.resolve("did:example:1", &options).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn caches_not_found() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = UniversalResolver::new();
        resolver.register(Arc::new(CountingDriver {
            calls: calls.clone(),
            method: "example",
            outcome: not_found_result,
        }));

        let options = ResolutionOptions::default();
        resolver.resolve("did:example:missing", &options).await;
        resolver.resolve("did:example:missing", &options).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = UniversalResolver::new();
        resolver.register(Arc::new(CountingDriver { calls: calls.clone(), method: "example", outcome: ok_result }));

        let mut options = ResolutionOptions::default();
        resolver.resolve("did:example:1", &options).await;
        options.force_refresh = true;
        resolver.resolve("did:example:1", &options).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unregistered_method_is_method_not_supported() {
        let resolver = UniversalResolver::new();
        let result = resolver.resolve("did:unknownmethod:1", &ResolutionOptions::default()).await;
        assert_eq!(result.did_resolution_metadata.error, Some(DidResolutionError::MethodNotSupported));
    }

    fn ok_result_updated(did: &str, updated: chrono::DateTime<chrono::Utc>) -> ResolutionResult {
        ResolutionResult::ok(
            DidDocument { id: did.to_string(), ..Default::default() },
            crate::did::DocumentMetadata { updated: Some(updated), ..Default::default() },
        )
    }

    #[test]
    fn ttl_derives_from_updated_when_present() {
        let resolver = UniversalResolver::new();

        let no_updated = ok_result("did:example:1");
        assert_eq!(resolver.ttl_for(&no_updated), resolver.positive_ttl);

        let just_updated = ok_result_updated("did:example:2", chrono::Utc::now());
        let ttl = resolver.ttl_for(&just_updated);
        assert!(ttl < resolver.positive_ttl, "a freshly updated document should get a shorter TTL");

        let long_stable =
            ok_result_updated("did:example:3", chrono::Utc::now() - chrono::Duration::days(30));
        assert_eq!(resolver.ttl_for(&long_stable), resolver.positive_ttl);
    }

    #[tokio::test]
    async fn concurrent_resolutions_coalesce() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = UniversalResolver::new();
        resolver.register(Arc::new(CountingDriver { calls: calls.clone(), method: "example", outcome: ok_result }));
        let resolver = Arc::new(resolver);

        let options = ResolutionOptions::default();
        let a = resolver.clone();
        let b = resolver.clone();
        let (r1, r2) = tokio::join!(
            a.resolve("did:example:concurrent", &options),
            b.resolve("did:example:concurrent", &options)
        );
        assert!(r1.is_ok());
        assert!(r2.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
