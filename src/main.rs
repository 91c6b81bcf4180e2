use anyhow::Result;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod command;
mod config;
mod domain;
mod probe;
mod resolve;
mod startup;
mod status;

#[cfg(test)]
mod test_support;

use cli::{Cli, Commands};
use command::CommandEnv;
use config::FileConfig;
use probe::HealthProber;
use resolve::ShellResolver;
use startup::StartupSupervisor;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let Some(cmd) = cli.command else {
        // No command specified, show help
        eprintln!("No command specified. Use --help for usage information.");
        eprintln!("Use 'provider-ready doctor' to check configured providers.");
        return Ok(());
    };

    let config_path = match cli.config {
        Some(path) => PathBuf::from(path),
        None => FileConfig::default_path()?,
    };
    debug!("Using configuration {:?}", config_path);

    let prober = HealthProber::new(Arc::new(ShellResolver))?;
    let env = CommandEnv {
        config: Arc::new(FileConfig::load(config_path)?),
        supervisor: StartupSupervisor::new(prober),
        working_dir: cli::resolve_working_dir(cli.cwd)?,
        cancel: CancellationToken::new(),
    };

    let cancel = env.cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => cancel.cancel(),
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let mut out = io::stdout();
    match cmd {
        Commands::Doctor { start } => command::run_doctor(&env, start, &mut out).await,
        Commands::Ensure { provider } => command::run_ensure(&env, &provider, &mut out).await,
        Commands::HealthUrl { provider } => command::run_health_url(&env, &provider, &mut out),
        Commands::Models => command::run_models(&env, &mut out),
        Commands::Status { json } => command::run_status(&env, json, &mut out).await,
        Commands::Watch => command::run_watch(&env, &mut out).await,
    }
}
