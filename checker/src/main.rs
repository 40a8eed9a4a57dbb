use std::process::ExitCode;

use clap::Parser;
use particle_check::output::render_error;
use particle_check::Args;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for check output
    let default_filter = if args.verbose {
        "particle_check=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let report = match args.into_config() {
        Ok(config) => particle_check::run(&config).await,
        Err(e) => render_error(&e),
    };

    report.emit()
}
