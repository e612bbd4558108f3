pub mod cli;
pub mod commands;
pub mod config;
mod render;

use anyhow::{Context, Result};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

pub use taskdeck_core as core;
pub use taskdeck_core::capture;
pub use taskdeck_core::model;
pub use taskdeck_core::parser;

pub use taskdeck_core::AppConfig;

use crate::cli::Cli;
use crate::commands::App;

/// Resolve configuration, restore the session and run one command against stdout.
pub async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.log_filter.clone())?;

    let config = config::from_cli(&cli).context("failed to resolve configuration")?;
    tracing::debug!(api_url = config.api_url(), data_dir = %config.data_dir().display(), "configuration resolved");
    let app = App::connect(config).context("failed to initialize HTTP client")?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    commands::execute(&app, cli.command, &mut handle).await
}

/// Run a command on an internal Tokio runtime.
pub fn run_blocking(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(run(cli))
}

fn init_tracing(filter: Option<String>) -> Result<()> {
    let filter = filter.unwrap_or_else(|| "warn".to_string());
    let directive: Directive = filter
        .parse()
        .with_context(|| format!("invalid log directive '{filter}'"))?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
    Ok(())
}
