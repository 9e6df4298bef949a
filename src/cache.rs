//! In-memory cache for source lookups.
//!
//! Keyed by the canonical `(source id, endpoint, sorted parameters)` string.
//! Backed by [`moka`] with a bounded capacity and a time-to-live, so
//! identical lookups within a short horizon are served without re-invoking
//! the source and the cache never grows without bound. Only successful
//! payloads are stored.

use std::time::Duration;

use moka::future::Cache;

use crate::models::{LookupParams, SourcePayload};

/// Canonical cache key for one lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from a source, endpoint and parameter set.
    ///
    /// Parameters are a sorted map, so `{b, a}` and `{a, b}` produce the
    /// same key. Nested objects are also sorted by `serde_json`.
    pub fn new(source_id: &str, endpoint: &str, params: &LookupParams) -> Self {
        let serialized = serde_json::to_string(params).unwrap_or_default();
        Self(format!("{}-{}-{}", source_id, endpoint, serialized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Shared, cheaply clonable lookup cache.
#[derive(Clone)]
pub struct ResultCache {
    inner: Cache<CacheKey, SourcePayload>,
}

impl ResultCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Look up a cached payload. Returns `None` on miss or expiry.
    pub async fn get(&self, key: &CacheKey) -> Option<SourcePayload> {
        self.inner.get(key).await
    }

    /// Store a payload, overwriting any prior entry for the key.
    pub async fn put(&self, key: CacheKey, payload: SourcePayload) {
        self.inner.insert(key, payload).await;
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PayloadKind;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> LookupParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[test]
    fn key_is_order_independent() {
        let forward = params(&[("compound", "imatinib"), ("limit", "5")]);
        let reversed = params(&[("limit", "5"), ("compound", "imatinib")]);
        let a = CacheKey::new("PubChem", "compound", &forward);
        let b = CacheKey::new("PubChem", "compound", &reversed);
        assert_eq!(a, b);
        assert_eq!(
            a.as_str(),
            r#"PubChem-compound-{"compound":"imatinib","limit":"5"}"#
        );
    }

    #[test]
    fn key_differs_by_source_and_endpoint() {
        let p = params(&[("query", "egfr")]);
        let base = CacheKey::new("UniProt", "search", &p);
        assert_ne!(base, CacheKey::new("OpenTargets", "search", &p));
        assert_ne!(base, CacheKey::new("UniProt", "uniprotkb", &p));
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let cache = ResultCache::new(10, Duration::from_secs(60));
        let key = CacheKey::new("FDA", "adverse-events", &params(&[("drug", "imatinib")]));
        assert!(cache.get(&key).await.is_none());

        let records = vec![json!({"reaction": "Rash"})];
        let payload = SourcePayload::new(PayloadKind::AdverseEvents, records);
        cache.put(key.clone(), payload.clone()).await;
        assert_eq!(cache.get(&key).await, Some(payload));
    }

    #[tokio::test]
    async fn put_overwrites() {
        let cache = ResultCache::new(10, Duration::from_secs(60));
        let key = CacheKey::new("ChEMBL", "molecule", &params(&[("query", "x")]));
        cache
            .put(key.clone(), SourcePayload::new(PayloadKind::Molecules, vec![]))
            .await;
        cache
            .put(key.clone(), SourcePayload::new(PayloadKind::Molecules, vec![json!(1), json!(2)]))
            .await;
        assert_eq!(cache.get(&key).await.map(|p| p.records.len()), Some(2));
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = ResultCache::new(10, Duration::from_millis(50));
        let key = CacheKey::new("UniProt", "search", &params(&[("query", "egfr")]));
        cache
            .put(key.clone(), SourcePayload::new(PayloadKind::Proteins, vec![]))
            .await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn clear_drops_entries() {
        let cache = ResultCache::new(10, Duration::from_secs(60));
        let key = CacheKey::new("HPA", "search", &LookupParams::new());
        cache
            .put(key.clone(), SourcePayload::new(PayloadKind::Placeholder, vec![]))
            .await;
        cache.clear();
        assert!(cache.get(&key).await.is_none());
    }
}
