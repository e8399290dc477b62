//! expirywatch library
//!
//! Finds TLS certificates and domain registrations in a Kubernetes cluster
//! that are about to expire (or just expired) and reports them.
//!
//! - Collects candidate domains from `kubernetes.io/tls` secrets and ingress
//!   routing rules
//! - Reads certificate expiry from stored PEM bytes or a live TLS handshake
//! - Reads registration expiry over WHOIS, rate limited, retried and cached
//!   per registrable domain
//! - Splits in-window domains into reachable and unreachable ones and renders
//!   a report for Telegram
//!
//! # Example
//!
//! ```rust,no_run
//! use expirywatch::config::Config;
//! use expirywatch::inventory::{InventorySource, KubeInventory};
//! use expirywatch::pipeline::Pipeline;
//! use expirywatch::report::format_report;
//!
//! # async fn run() -> expirywatch::Result<()> {
//! let config = Config::from_env();
//! let inventory = KubeInventory::connect().await?.fetch().await?;
//! let outcome = Pipeline::from_config(&config)?.run(&inventory).await;
//! let c = &outcome.classification;
//! println!("{}", format_report(&c.unreachable, &c.expiring_soon, chrono::Utc::now()));
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod cache;
pub mod certs;
pub mod cli;
pub mod collector;
pub mod config;
pub mod domain_utils;
pub mod errors;
pub mod evaluation;
pub mod inventory;
pub mod notifier;
pub mod pipeline;
pub mod reachability;
pub mod registration;
pub mod report;
pub mod retry;
pub mod whois;

pub use cache::{ExpiryCache, MemoryCache};
pub use collector::{Candidate, Provenance};
pub use config::Config;
pub use errors::{CheckerError, ErrorCategory, Result};
pub use evaluation::{DomainEvaluation, ExpiryStatus, ExpiryWindow};
pub use inventory::Inventory;
pub use pipeline::{Collaborators, Pipeline, RunOutcome};
pub use reachability::Classification;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
