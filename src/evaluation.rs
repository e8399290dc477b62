//! Evaluation worker pool.
//!
//! One task per candidate, admitted through a bounded gate. Each task
//! resolves certificate and registration expiry, applies the expiry window
//! and yields at most one record. Failures are logged with the candidate's
//! `namespace/owner` and the candidate is dropped; nothing is retried at
//! this layer. `evaluate_candidates` returns only after every task has finished.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::certs::{CertificateProbe, domain_from_cert, parse_cert_expiry};
use crate::collector::{Candidate, Provenance};
use crate::errors::{CheckerError, Result};
use crate::registration::RegistrationResolver;

/// Default number of evaluation tasks running at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 20;

/// Day-count range `(lower, upper]` worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryWindow {
    pub upper: i64,
    pub lower: i64,
}

impl Default for ExpiryWindow {
    fn default() -> Self {
        Self {
            upper: 5,
            lower: -5,
        }
    }
}

impl ExpiryWindow {
    pub fn new(upper: i64, lower: i64) -> Self {
        Self { upper, lower }
    }

    /// `lower < 0 < upper`
    pub fn is_valid(&self) -> bool {
        self.lower < 0 && 0 < self.upper
    }

    pub fn contains(&self, days: i64) -> bool {
        days <= self.upper && days > self.lower
    }

    /// Whole days until `expiry`, rounded toward negative infinity.
    pub fn days_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        (expiry - now).num_seconds().div_euclid(86_400)
    }

    pub fn status(&self, expiry: DateTime<Utc>, now: DateTime<Utc>) -> ExpiryStatus {
        let days = Self::days_until(expiry, now);
        ExpiryStatus {
            days,
            expires_at: expiry,
            in_window: self.contains(days),
        }
    }
}

/// Expiry of one certificate or registration relative to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryStatus {
    pub days: i64,
    pub expires_at: DateTime<Utc>,
    pub in_window: bool,
}

/// One evaluated domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEvaluation {
    pub domain: String,
    pub namespace: String,
    pub secret: Option<String>,
    pub ingresses: Vec<String>,
    pub provenance: Provenance,
    pub certificate: ExpiryStatus,
    /// `None` when registration was not looked up (wildcard domains).
    pub registration: Option<ExpiryStatus>,
}

impl DomainEvaluation {
    pub fn certificate_in_window(&self) -> bool {
        self.certificate.in_window
    }

    pub fn registration_in_window(&self) -> bool {
        self.registration.is_some_and(|r| r.in_window)
    }

    pub fn is_newsworthy(&self) -> bool {
        self.certificate_in_window() || self.registration_in_window()
    }
}

/// Bounded pool driving both resolvers for every candidate.
#[derive(Clone)]
pub struct Evaluator {
    window: ExpiryWindow,
    certificates: Arc<dyn CertificateProbe>,
    registrations: Arc<RegistrationResolver>,
    gate: Arc<Semaphore>,
}

impl Evaluator {
    pub fn new(
        window: ExpiryWindow,
        certificates: Arc<dyn CertificateProbe>,
        registrations: Arc<RegistrationResolver>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            window,
            certificates,
            registrations,
            gate: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    pub fn window(&self) -> ExpiryWindow {
        self.window
    }

    /// Evaluate every candidate; records outside the window are dropped.
    pub async fn evaluate_candidates(&self, candidates: Vec<Candidate>) -> Vec<DomainEvaluation> {
        let mut tasks = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let evaluator = self.clone();
            tasks.push(tokio::spawn(async move {
                // Held for the whole task; released on every exit path.
                let _permit = evaluator.gate.acquire().await.ok()?;
                evaluator.evaluate_one(candidate).await
            }));
        }

        // Barrier: nothing is returned before every task has finished.
        let mut records = Vec::new();
        for joined in join_all(tasks).await {
            match joined {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "evaluation task failed"),
            }
        }
        records
    }

    /// Record for one candidate, or `None` when dropped or out of window.
    async fn evaluate_one(&self, candidate: Candidate) -> Option<DomainEvaluation> {
        let owner = candidate.owner();
        let provenance = candidate.provenance();

        let result = match candidate {
            Candidate::Secret {
                name,
                namespace,
                certificate,
                ingresses,
            } => self.evaluate_secret(name, namespace, &certificate, ingresses).await,
            Candidate::Ingress {
                host,
                name,
                namespace,
            } => self.evaluate_host(host, name, namespace).await,
        };

        match result {
            Ok(record) if record.is_newsworthy() => {
                tracing::debug!(
                    domain = %record.domain,
                    owner = %owner,
                    certificate_days = record.certificate.days,
                    "inside expiry window"
                );
                Some(record)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(
                    %provenance,
                    owner = %owner,
                    category = %e.category(),
                    error = %e,
                    "dropping domain"
                );
                None
            }
        }
    }

    async fn evaluate_secret(
        &self,
        name: String,
        namespace: String,
        pem: &[u8],
        ingresses: Vec<String>,
    ) -> Result<DomainEvaluation> {
        let origin = format!("secret {namespace}/{name}");
        let domain = domain_from_cert(pem, &origin)?;
        let cert_expiry = parse_cert_expiry(pem, &origin)?;
        let now = Utc::now();
        let certificate = self.window.status(cert_expiry, now);
        let registration = self.registration_status(&domain, now).await?;

        Ok(DomainEvaluation {
            domain,
            namespace,
            secret: Some(name),
            ingresses,
            provenance: Provenance::Secret,
            certificate,
            registration,
        })
    }

    async fn evaluate_host(
        &self,
        host: String,
        ingress: String,
        namespace: String,
    ) -> Result<DomainEvaluation> {
        let cert_expiry = self.certificates.peer_expiry(&host).await?;
        let now = Utc::now();
        let certificate = self.window.status(cert_expiry, now);
        let registration = self.registration_status(&host, now).await?;

        Ok(DomainEvaluation {
            domain: host,
            namespace,
            secret: None,
            ingresses: vec![ingress],
            provenance: Provenance::Ingress,
            certificate,
            registration,
        })
    }

    /// Wildcards skip the registration lookup instead of dropping the record.
    async fn registration_status(
        &self,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ExpiryStatus>> {
        match self.registrations.resolve(domain).await {
            Ok(expiry) => Ok(Some(self.window.status(expiry, now))),
            Err(CheckerError::SkippedWildcard { .. }) => {
                tracing::debug!(%domain, "registration lookup skipped for wildcard");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
