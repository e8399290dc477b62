//! Library entry point for one evaluation run.
//!
//! Wires collection, the evaluation pool and the reachability classifier.
//! Every collaborator is injectable so the whole run can be driven by fakes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{ExpiryCache, MemoryCache};
use crate::certs::{CertificateProbe, TlsCertificateProbe};
use crate::collector::{collect_candidates, routing_hosts};
use crate::config::Config;
use crate::errors::Result;
use crate::evaluation::Evaluator;
use crate::inventory::Inventory;
use crate::reachability::{Classification, HttpsReachability, ReachabilityProbe, classify};
use crate::registration::RegistrationResolver;
use crate::retry::RetryExecutor;
use crate::whois::{WhoisClient, WhoisTransport};

/// Counters describing a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub routing_hosts: usize,
    pub candidates: usize,
    pub flagged: usize,
    pub unreachable: usize,
    pub elapsed: Duration,
}

/// Result of one run.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub classification: Classification,
    pub stats: RunStats,
}

pub struct Pipeline {
    evaluator: Evaluator,
    reachability: Arc<dyn ReachabilityProbe>,
}

/// Network collaborators of a pipeline.
pub struct Collaborators {
    pub whois: Arc<dyn WhoisTransport>,
    pub certificates: Arc<dyn CertificateProbe>,
    pub reachability: Arc<dyn ReachabilityProbe>,
    pub cache: Arc<dyn ExpiryCache>,
}

impl Collaborators {
    /// Real network clients configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            whois: Arc::new(WhoisClient::new(config.network.whois_timeout)),
            certificates: Arc::new(TlsCertificateProbe::new(config.network.tls_timeout)?),
            reachability: Arc::new(HttpsReachability::new(config.network.probe_timeout)?),
            cache: Arc::new(MemoryCache::new()),
        })
    }
}

impl Pipeline {
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        let registrations = RegistrationResolver::new(
            collaborators.whois,
            collaborators.cache,
            config.network.max_concurrent_whois,
            RetryExecutor::new(config.retry_config()),
        );
        let evaluator = Evaluator::new(
            config.window,
            collaborators.certificates,
            Arc::new(registrations),
            config.network.max_concurrent_checks,
        );
        Self {
            evaluator,
            reachability: collaborators.reachability,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config, Collaborators::from_config(config)?))
    }

    /// Evaluate every candidate in `inventory` and classify the flagged ones.
    pub async fn run(&self, inventory: &Inventory) -> RunOutcome {
        let start = Instant::now();
        let hosts = routing_hosts(&inventory.ingresses);
        let candidates = collect_candidates(inventory);
        let candidate_count = candidates.len();

        tracing::info!(
            secrets = inventory.secrets.len(),
            ingresses = inventory.ingresses.len(),
            routing_hosts = hosts.len(),
            candidates = candidate_count,
            window_upper = self.evaluator.window().upper,
            window_lower = self.evaluator.window().lower,
            "starting expiry checks"
        );

        let records = self.evaluator.evaluate_candidates(candidates).await;
        let flagged = records.len();
        tracing::info!(
            flagged,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "expiry checks finished"
        );

        let classification = classify(records, self.reachability.as_ref()).await;
        let stats = RunStats {
            routing_hosts: hosts.len(),
            candidates: candidate_count,
            flagged,
            unreachable: classification.unreachable.len(),
            elapsed: start.elapsed(),
        };

        RunOutcome {
            classification,
            stats,
        }
    }
}
