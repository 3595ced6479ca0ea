//! Per-entry expiry policy for the resolver cache.
//!
//! `moka`'s default cache applies one TTL to every entry; Status List
//! entries and negative (`notFound`) lookups need different lifetimes, so
//! each cached value carries its own TTL and a custom [`Expiry`]
//! implementation reads it back at insertion time.

use std::time::{Duration, Instant};

use moka::Expiry;

use crate::did::ResolutionResult;

/// A resolver cache value: the resolution outcome plus the TTL it should
/// live for.
#[derive(Clone)]
pub struct CacheEntry {
    /// The cached resolution result.
    pub result: ResolutionResult,
    /// How long this specific entry should live. `Duration::ZERO` for
    /// results that should not meaningfully be cached (anything besides
    /// success or `notFound`); such entries expire on next housekeeping.
    pub ttl: Duration,
}

/// Reads [`CacheEntry::ttl`] to give each entry its own lifetime.
pub struct ResolverExpiry;

impl Expiry<String, CacheEntry> for ResolverExpiry {
    fn expire_after_create(&self, _key: &String, value: &CacheEntry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }
}
