mod activity;
mod ai;
mod auth;
mod cli;
mod config;
mod error;
mod github;
mod orchestrator;
mod publish;

use auth::CredentialResolver;
use chrono::Utc;
use clap::Parser;
use cli::Cli;
use config::{FileConfig, RunConfig};
use error::Result;
use orchestrator::Orchestrator;
use publish::PushOutcome;
use std::io;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Validate CLI arguments
    if let Err(e) = cli.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    init_logging(cli.verbose);

    if let Err(e) = run(cli, CredentialResolver::default()).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, credentials: CredentialResolver) -> Result<()> {
    let (file, path) = FileConfig::load(cli.config.as_deref())?;
    if let Some(path) = &path {
        debug!(path = %path.display(), "loaded config");
    }

    let config = RunConfig::merge(&cli, &file, Utc::now())?;

    // No client exists until a token does
    let token = credentials.resolve().await?;

    let orchestrator = Orchestrator::new(config, token)?;

    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    let outcome = orchestrator.run(&mut stdout).await?;

    if let Some(path) = &outcome.publish.written {
        info!(path = %path.display(), "Report written");
    }
    match &outcome.publish.pushed {
        Some(PushOutcome::Pushed { branch, commit }) => {
            info!(branch = %branch, commit = %commit, "Report pushed")
        }
        Some(PushOutcome::Unchanged) => info!("Report unchanged, nothing pushed"),
        None => {}
    }
    debug!(printed = outcome.publish.printed, "Publish finished");

    if outcome.warnings.is_empty() {
        info!(
            chars = outcome.report.markdown.len(),
            generated_at = %outcome.report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            "Done"
        );
    } else {
        warn!(count = outcome.warnings.len(), "Completed with warnings");
        for warning in &outcome.warnings {
            eprintln!("  - {}", warning);
        }
    }

    Ok(())
}

/// stderr only; stdout carries the report
fn init_logging(verbose: bool) {
    let default_level = if verbose {
        "info,gh_weekly_updates=debug"
    } else {
        "info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}
