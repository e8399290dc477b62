//! Reachability classification of in-window records.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain_utils::{is_wildcard, strip_wildcard};
use crate::errors::{CheckerError, Result};
use crate::evaluation::DomainEvaluation;

/// Timeout for one HTTPS probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn is_reachable(&self, domain: &str) -> bool;
}

/// `GET https://<domain>` with normal certificate validation.
pub struct HttpsReachability {
    client: reqwest::Client,
}

impl HttpsReachability {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CheckerError::configuration(format!("HTTP client setup: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpsReachability {
    async fn is_reachable(&self, domain: &str) -> bool {
        let url = format!("https://{}", strip_wildcard(domain));
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_server_error() => {
                tracing::debug!(%domain, status = %resp.status(), "server error");
                false
            }
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(%domain, error = %e, "probe failed");
                false
            }
        }
    }
}

/// In-window records split by reachability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub expiring_soon: Vec<DomainEvaluation>,
    pub unreachable: Vec<DomainEvaluation>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.expiring_soon.is_empty() && self.unreachable.is_empty()
    }

    pub fn total(&self) -> usize {
        self.expiring_soon.len() + self.unreachable.len()
    }
}

/// Partition `records`, preserving their order within each side.
///
/// Wildcard domains count as reachable and are never probed.
pub async fn classify(
    records: Vec<DomainEvaluation>,
    probe: &dyn ReachabilityProbe,
) -> Classification {
    let mut out = Classification::default();
    for record in records {
        if !record.is_newsworthy() {
            continue;
        }
        if is_wildcard(&record.domain) || probe.is_reachable(&record.domain).await {
            out.expiring_soon.push(record);
        } else {
            tracing::info!(domain = %record.domain, namespace = %record.namespace, "unreachable");
            out.unreachable.push(record);
        }
    }
    out
}
