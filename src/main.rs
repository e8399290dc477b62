use expirywatch::app::App;
use expirywatch::cli::Cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::from_args();

    // Logs go to stderr; stdout carries the report only.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.is_trace())
        .with_writer(std::io::stderr)
        .init();

    match App::run(&cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "run aborted");
            std::process::exit(1);
        }
    }
}
