#![allow(clippy::uninlined_format_args)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use credharvest::{Harvester, MemorySink};

#[derive(Parser)]
#[command(name = "credharvest")]
#[command(about = "Keeps a live authenticated API request template fresh", long_about = None)]
struct Cli {
    /// Run the browser in visible mode
    #[arg(long = "no-headless")]
    no_headless: bool,

    /// Read the initial cookie payload from a file instead of GOOGLE_COOKIES
    #[arg(long)]
    cookies_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credharvest=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();

    let sink = Arc::new(MemorySink::new());
    let harvester = Arc::new(Harvester::new(sink, !cli.no_headless));

    if let Some(path) = &cli.cookies_file {
        let payload = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cookies file {}", path.display()))?;
        harvester.update_cookies(payload);
    }

    let runner = Arc::clone(&harvester);
    let run_task = tokio::spawn(async move { runner.run().await });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested");
    harvester.stop();

    // The harvester exits at its next checkpoint; no forced cancellation
    run_task.await.context("Harvester task panicked")?;
    Ok(())
}
