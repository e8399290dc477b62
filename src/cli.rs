use clap::Parser;
use clap::builder::RangedU64ValueParser;

/// Command-line interface definition.
///
/// Everything else is configured through environment variables.
///
/// Verbosity levels:
/// 0 - errors only
/// 1 - warnings (default)
/// 2 - info
/// 3 - debug/trace
#[derive(Parser, Debug, Clone, Default)]
#[command(
    author,
    version,
    about = "Report TLS certificates and domain registrations about to expire in a Kubernetes cluster"
)]
pub struct Cli {
    /// Print the report but do not send it to Telegram
    #[arg(long)]
    pub dry_run: bool,

    /// Verbosity level (0-3); RUST_LOG takes precedence when set
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub verbose: u8,

    /// Override MAX_CONCURRENT_CHECKS
    #[arg(long, value_name = "N", value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub max_concurrency: Option<usize>,

    /// Override MAX_CONCURRENT_WHOIS
    #[arg(long, value_name = "N", value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub whois_concurrency: Option<usize>,
}

impl Cli {
    /// Parse CLI arguments from process args.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Default log filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "error",
            1 => "warn",
            2 => "info",
            _ => "debug",
        }
    }

    pub fn is_trace(&self) -> bool {
        self.verbose >= 3
    }
}
