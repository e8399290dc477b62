//! Candidate collection from fetched inventory.
//!
//! Pure transform: no network, no cache. Each TLS secret yields one
//! candidate whose domain is read later from its certificate; each ingress
//! rule with a concrete host yields one candidate. The same hostname can show
//! up from both sources and is evaluated once per provenance.

use std::collections::BTreeSet;

use crate::domain_utils::is_wildcard;
use crate::inventory::{Ingress, Inventory, TlsSecret};

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    Secret,
    Ingress,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Secret => f.write_str("secret"),
            Provenance::Ingress => f.write_str("ingress"),
        }
    }
}

/// Unit of work for the evaluation pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Domain comes from the certificate stored in the secret.
    Secret {
        name: String,
        namespace: String,
        certificate: Vec<u8>,
        /// Same-namespace ingresses whose TLS blocks reference the secret.
        ingresses: Vec<String>,
    },
    /// Routing host of one ingress rule.
    Ingress {
        host: String,
        name: String,
        namespace: String,
    },
}

impl Candidate {
    pub fn provenance(&self) -> Provenance {
        match self {
            Candidate::Secret { .. } => Provenance::Secret,
            Candidate::Ingress { .. } => Provenance::Ingress,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Candidate::Secret { namespace, .. } | Candidate::Ingress { namespace, .. } => namespace,
        }
    }

    /// `namespace/owner` for log lines.
    pub fn owner(&self) -> String {
        match self {
            Candidate::Secret {
                name, namespace, ..
            }
            | Candidate::Ingress {
                name, namespace, ..
            } => format!("{namespace}/{name}"),
        }
    }
}

/// Distinct routing hosts: empty and wildcard hosts excluded.
pub fn routing_hosts(ingresses: &[Ingress]) -> BTreeSet<String> {
    ingresses
        .iter()
        .flat_map(|ing| ing.rules.iter())
        .map(|rule| rule.host.as_str())
        .filter(|host| !host.is_empty() && !is_wildcard(host))
        .map(str::to_string)
        .collect()
}

/// Names of ingresses in the secret's namespace that reference it.
pub fn ingresses_for_secret(secret: &TlsSecret, ingresses: &[Ingress]) -> Vec<String> {
    ingresses
        .iter()
        .filter(|ing| ing.namespace == secret.namespace && ing.references_secret(&secret.name))
        .map(|ing| ing.name.clone())
        .collect()
}

/// All candidates of a run: secret-derived first, then ingress-derived.
pub fn collect_candidates(inventory: &Inventory) -> Vec<Candidate> {
    let secrets = inventory
        .secrets
        .iter()
        .filter(|s| s.is_tls())
        .map(|s| Candidate::Secret {
            name: s.name.clone(),
            namespace: s.namespace.clone(),
            certificate: s.certificate.clone(),
            ingresses: ingresses_for_secret(s, &inventory.ingresses),
        });

    let hosts = inventory.ingresses.iter().flat_map(|ing| {
        ing.rules
            .iter()
            .filter(|rule| !rule.host.is_empty() && !is_wildcard(&rule.host))
            .map(move |rule| Candidate::Ingress {
                host: rule.host.clone(),
                name: ing.name.clone(),
                namespace: ing.namespace.clone(),
            })
    });

    secrets.chain(hosts).collect()
}
