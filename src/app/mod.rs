//! Application orchestration for the `expirywatch` binary.
//!
//! Major steps in `App::run`:
//!   1. Config load from the environment, CLI overrides, validation
//!   2. Cluster inventory listing (fatal on failure)
//!   3. Evaluation pipeline and reachability classification
//!   4. Report rendering to stdout
//!   5. Telegram delivery unless `--dry-run`

use anyhow::{Context, Result};
use chrono::Utc;

use crate::cli::Cli;
use crate::config::Config;
use crate::inventory::{InventorySource, KubeInventory};
use crate::notifier::TelegramNotifier;
use crate::pipeline::{Pipeline, RunOutcome};
use crate::report::format_report;

pub struct App;

impl App {
    /// Run one check against the cluster the process has credentials for.
    pub async fn run(cli: &Cli) -> Result<i32> {
        let config = Self::load_config(cli)?;
        let source = KubeInventory::connect()
            .await
            .context("Unable to create Kubernetes client")?;
        Self::run_with_source(cli, &config, &source).await
    }

    /// Same as [`App::run`] with an explicit inventory source.
    pub async fn run_with_source(
        cli: &Cli,
        config: &Config,
        source: &dyn InventorySource,
    ) -> Result<i32> {
        let inventory = source.fetch().await.context("Unable to list cluster inventory")?;

        let pipeline = Pipeline::from_config(config).context("Unable to set up network clients")?;
        let outcome = pipeline.run(&inventory).await;
        Self::log_outcome(&outcome);

        let report = format_report(
            &outcome.classification.unreachable,
            &outcome.classification.expiring_soon,
            Utc::now(),
        );
        println!("{report}");

        if cli.dry_run {
            tracing::info!("dry run, notification skipped");
            return Ok(0);
        }

        let notifier = TelegramNotifier::new(config.telegram.clone())
            .context("Unable to set up Telegram client")?;
        let delivery = notifier.send(&report).await;
        if !delivery.is_complete() {
            // Delivery problems never fail the run.
            tracing::error!(sent = delivery.sent, failed = delivery.failed, "report only partly delivered");
        }
        Ok(0)
    }

    fn load_config(cli: &Cli) -> Result<Config> {
        let mut config = Config::from_env();
        config.merge_with_cli(cli);
        config.validate().context("Configuration error")?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    fn log_outcome(outcome: &RunOutcome) {
        let stats = &outcome.stats;
        tracing::info!(
            routing_hosts = stats.routing_hosts,
            candidates = stats.candidates,
            flagged = stats.flagged,
            unreachable = stats.unreachable,
            duration_ms = stats.elapsed.as_millis() as u64,
            "run complete"
        );
    }
}
