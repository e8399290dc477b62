//! Registration-expiry resolution: wildcard guard, eTLD+1 reduction, cache,
//! WHOIS gate and retry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use crate::cache::ExpiryCache;
use crate::domain_utils::{is_wildcard, registrable_domain};
use crate::errors::{CheckerError, Result};
use crate::retry::{RetryExecutor, TransientOnly};
use crate::whois::{WhoisTransport, parse_registration_expiry};

/// Default number of WHOIS lookups in flight across all workers.
pub const DEFAULT_WHOIS_CONCURRENCY: usize = 2;

pub struct RegistrationResolver {
    transport: Arc<dyn WhoisTransport>,
    cache: Arc<dyn ExpiryCache>,
    gate: Semaphore,
    retry: RetryExecutor,
}

impl RegistrationResolver {
    pub fn new(
        transport: Arc<dyn WhoisTransport>,
        cache: Arc<dyn ExpiryCache>,
        whois_concurrency: usize,
        retry: RetryExecutor,
    ) -> Self {
        Self {
            transport,
            cache,
            gate: Semaphore::new(whois_concurrency.max(1)),
            retry,
        }
    }

    /// Registration expiry of the domain `host` belongs to.
    pub async fn resolve(&self, host: &str) -> Result<DateTime<Utc>> {
        if is_wildcard(host) {
            return Err(CheckerError::SkippedWildcard {
                domain: host.to_string(),
            });
        }
        let registrable = registrable_domain(host)?;
        self.cached_expiry(&registrable).await
    }

    /// Cache hit, or one gated WHOIS lookup whose success is stored.
    ///
    /// Concurrent misses for the same key each run their own lookup.
    pub async fn cached_expiry(&self, registrable: &str) -> Result<DateTime<Utc>> {
        if let Some(expiry) = self.cache.get(registrable) {
            tracing::trace!(domain = %registrable, "registration expiry cache hit");
            return Ok(expiry);
        }

        let raw = {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| CheckerError::configuration("WHOIS gate closed"))?;
            self.lookup_with_retry(registrable).await?
        };

        let expiry = parse_registration_expiry(registrable, &raw)?;
        self.cache.put(registrable, expiry);
        Ok(expiry)
    }

    async fn lookup_with_retry(&self, registrable: &str) -> Result<String> {
        self.retry
            .execute(
                |attempt| {
                    tracing::debug!(domain = %registrable, attempt, "WHOIS lookup");
                    self.transport.lookup(registrable)
                },
                TransientOnly,
            )
            .await
            .map_err(|failure| CheckerError::Lookup {
                domain: registrable.to_string(),
                attempts: failure.attempts,
                source: failure.error,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::errors::{TransportError, TransportErrorKind};
    use crate::retry::RetryConfig;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RESPONSE: &str = "Domain Name: EXAMPLE.COM\nRegistry Expiry Date: 2030-01-02T00:00:00Z\n";

    /// Serves scripted responses and records every query.
    #[derive(Default)]
    struct ScriptedWhois {
        queries: Mutex<Vec<String>>,
        failures_before_success: AtomicUsize,
        failure_kind: Option<TransportErrorKind>,
        body: &'static str,
    }

    impl ScriptedWhois {
        fn ok(body: &'static str) -> Self {
            Self {
                body,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.queries.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl WhoisTransport for ScriptedWhois {
        async fn lookup(&self, domain: &str) -> std::result::Result<String, TransportError> {
            self.queries.lock().unwrap().push(domain.to_string());
            if let Some(kind) = self.failure_kind {
                let left = self.failures_before_success.load(Ordering::SeqCst);
                if left > 0 {
                    self.failures_before_success.store(left - 1, Ordering::SeqCst);
                    return Err(TransportError::new(kind, "whois.test", "read", "scripted"));
                }
            }
            Ok(self.body.to_string())
        }
    }

    fn resolver(transport: Arc<ScriptedWhois>, cache: Arc<MemoryCache>) -> RegistrationResolver {
        RegistrationResolver::new(transport, cache, 2, RetryExecutor::new(RetryConfig::default()))
    }

    #[tokio::test]
    async fn second_resolution_hits_cache() {
        let transport = Arc::new(ScriptedWhois::ok(RESPONSE));
        let cache = Arc::new(MemoryCache::new());
        let resolver = resolver(Arc::clone(&transport), Arc::clone(&cache));

        let first = resolver.resolve("shop.example.com").await.unwrap();
        let second = resolver.resolve("api.example.com").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.calls(), 1);
        assert_eq!(transport.queries.lock().unwrap()[0], "example.com");
        assert!(cache.get("example.com").is_some());
    }

    #[tokio::test]
    async fn wildcard_never_reaches_transport() {
        let transport = Arc::new(ScriptedWhois::ok(RESPONSE));
        let resolver = resolver(Arc::clone(&transport), Arc::new(MemoryCache::new()));

        let err = resolver.resolve("*.example.com").await.unwrap_err();
        assert!(matches!(err, CheckerError::SkippedWildcard { .. }));
        let err = resolver.resolve("a.*.example.com").await.unwrap_err();
        assert!(matches!(err, CheckerError::SkippedWildcard { .. }));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn bare_suffix_is_rejected_before_lookup() {
        let transport = Arc::new(ScriptedWhois::ok(RESPONSE));
        let resolver = resolver(Arc::clone(&transport), Arc::new(MemoryCache::new()));

        let err = resolver.resolve("co.uk").await.unwrap_err();
        assert!(matches!(err, CheckerError::UnknownRegistrableSuffix { .. }));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let transport = Arc::new(ScriptedWhois {
            failures_before_success: AtomicUsize::new(2),
            failure_kind: Some(TransportErrorKind::Timeout),
            body: RESPONSE,
            ..Default::default()
        });
        let resolver = resolver(Arc::clone(&transport), Arc::new(MemoryCache::new()));

        assert!(resolver.resolve("example.com").await.is_ok());
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_are_lookup_errors_and_not_cached() {
        let transport = Arc::new(ScriptedWhois {
            failures_before_success: AtomicUsize::new(10),
            failure_kind: Some(TransportErrorKind::ConnectionReset),
            body: RESPONSE,
            ..Default::default()
        });
        let cache = Arc::new(MemoryCache::new());
        let resolver = resolver(Arc::clone(&transport), Arc::clone(&cache));

        match resolver.resolve("example.com").await.unwrap_err() {
            CheckerError::Lookup { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn unregistered_domain_is_not_found() {
        let transport = Arc::new(ScriptedWhois::ok("No match for \"NOPE-XYZ.COM\".\n"));
        let resolver = resolver(transport, Arc::new(MemoryCache::new()));

        assert!(matches!(
            resolver.resolve("nope-xyz.com").await.unwrap_err(),
            CheckerError::NotFound { .. }
        ));
    }
}
