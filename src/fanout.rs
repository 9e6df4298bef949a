//! Concurrent fan-out across data sources.
//!
//! [`Coordinator::gather`] takes a query, its extracted entities and an
//! ordered list of source ids, and invokes every eligible source
//! concurrently.
//!
//! # Pipeline
//!
//! 1. Resolve every id against the registry; one unknown id rejects the
//!    whole call with [`SourceError::UnknownSource`] before anything runs.
//! 2. Ask each source for its parameters; sources missing a required entity
//!    are skipped and produce no result.
//! 3. For each remaining source, in parallel via
//!    [`futures::future::join_all`]: rate limiter, then cache, then lookup
//!    with a per-attempt timeout and linear-backoff retry.
//! 4. Return one [`SourceResult`] per invoked source, in input order.
//!
//! The futures run inside the caller's task, so dropping the `gather` future
//! cancels every in-flight lookup.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{CacheKey, ResultCache};
use crate::config::Config;
use crate::error::{Result, SourceError};
use crate::limiter::FixedWindowLimiter;
use crate::models::{EntitySet, LookupParams, SourcePayload, SourceResult};
use crate::registry::{SourceDescriptor, SourceRegistry};
use crate::stats::{LookupEvent, LookupMetrics};

/// Linear backoff: the wait after attempt `n` is `n * base_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// Dispatches lookups to registered sources.
pub struct Coordinator {
    registry: Arc<SourceRegistry>,
    limiter: Arc<FixedWindowLimiter>,
    cache: ResultCache,
    metrics: Arc<LookupMetrics>,
    retry: RetryPolicy,
    attempt_timeout: Duration,
    gather_timeout: Option<Duration>,
}

impl Coordinator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        limiter: Arc<FixedWindowLimiter>,
        cache: ResultCache,
    ) -> Self {
        Self {
            registry,
            limiter,
            cache,
            metrics: Arc::new(LookupMetrics::new()),
            retry: RetryPolicy::default(),
            attempt_timeout: Duration::from_secs(10),
            gather_timeout: None,
        }
    }

    /// Build a coordinator with limiter, cache and retry settings from config.
    pub fn from_config(registry: Arc<SourceRegistry>, config: &Config) -> Self {
        let limiter = Arc::new(registry.rate_limiter(&config.rate_limit));
        let cache = ResultCache::new(
            config.cache.capacity,
            Duration::from_secs(config.cache.ttl_secs),
        );
        Self::new(registry, limiter, cache)
            .with_retry(RetryPolicy {
                max_attempts: config.fanout.max_attempts,
                base_delay: config.fanout.base_delay(),
            })
            .with_attempt_timeout(config.fanout.attempt_timeout())
            .with_gather_timeout(config.fanout.gather_timeout())
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_gather_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.gather_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn metrics(&self) -> &LookupMetrics {
        &self.metrics
    }

    /// Invoke every eligible source concurrently and collect results in
    /// input order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnknownSource`] if any id is not registered.
    /// Per-source failures are returned as failed results instead.
    pub async fn gather(
        &self,
        query: &str,
        entities: &EntitySet,
        source_ids: &[String],
    ) -> Result<Vec<SourceResult>> {
        let descriptors = source_ids
            .iter()
            .map(|id| self.registry.resolve(id))
            .collect::<Result<Vec<_>>>()?;

        let planned: Vec<(&SourceDescriptor, LookupParams)> = descriptors
            .into_iter()
            .filter_map(|d| match d.source().params(query, entities) {
                Some(params) => Some((d, params)),
                None => {
                    tracing::debug!(source = %d.id, "skipping source: required entity missing");
                    None
                }
            })
            .collect();

        let deadline = self.gather_timeout.map(|t| tokio::time::Instant::now() + t);

        let futures = planned.iter().map(|(descriptor, params)| async move {
            let invocation = self.invoke(descriptor, &descriptor.endpoint, params);
            match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, invocation).await {
                    Ok(result) => result,
                    Err(_) => {
                        let err = SourceError::Timeout(format!(
                            "{} did not finish before the gather deadline",
                            descriptor.id
                        ));
                        tracing::warn!(source = %descriptor.id, "gather deadline reached");
                        self.metrics.record(
                            &descriptor.id,
                            LookupEvent::Failure(&err),
                            Duration::ZERO,
                        );
                        SourceResult::failure(&descriptor.id, &err)
                    }
                },
                None => invocation.await,
            }
        });

        Ok(futures::future::join_all(futures).await)
    }

    /// Run one source through the rate limiter, cache and retrying lookup.
    ///
    /// Cache hits report `attempts == 0`.
    pub async fn invoke(
        &self,
        descriptor: &SourceDescriptor,
        endpoint: &str,
        params: &LookupParams,
    ) -> SourceResult {
        let started = Instant::now();
        let id = descriptor.id.as_str();

        if !self.limiter.allow(id) {
            let err = SourceError::RateLimitExceeded(id.to_string());
            tracing::warn!(source = id, "rate limit exceeded");
            self.metrics.record(id, LookupEvent::Failure(&err), started.elapsed());
            return SourceResult::failure(id, &err);
        }

        let key = CacheKey::new(id, endpoint, params);
        if let Some(payload) = self.cache.get(&key).await {
            tracing::debug!(source = id, "cache hit");
            self.metrics.record(id, LookupEvent::CacheHit, started.elapsed());
            return SourceResult::success(id, payload, 0, true);
        }

        let (outcome, attempts) = self.lookup_with_retry(descriptor, endpoint, params).await;
        match outcome {
            Ok(payload) => {
                tracing::debug!(
                    source = id,
                    attempts,
                    records = payload.record_count(),
                    "lookup succeeded"
                );
                let bytes = payload.wire_size();
                self.cache.put(key, payload.clone()).await;
                self.metrics.record(id, LookupEvent::Success { bytes }, started.elapsed());
                SourceResult::success(id, payload, attempts, false)
            }
            Err(err) => {
                tracing::warn!(source = id, attempts, error = %err, "lookup failed");
                self.metrics.record(id, LookupEvent::Failure(&err), started.elapsed());
                SourceResult::failure(id, &err)
            }
        }
    }

    async fn lookup_with_retry(
        &self,
        descriptor: &SourceDescriptor,
        endpoint: &str,
        params: &LookupParams,
    ) -> (Result<SourcePayload>, u32) {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(
                self.attempt_timeout,
                descriptor.source().lookup(endpoint, params),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(SourceError::Timeout(format!(
                    "{} after {} ms",
                    descriptor.id,
                    self.attempt_timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(payload) => return (Ok(payload), attempt),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        source = %descriptor.id,
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "lookup attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return (Err(err), attempt),
            }
        }
    }
}
