use clap::{Parser, Subcommand};

/// Provider readiness checks and startup supervisor
#[derive(Parser)]
#[command(name = "provider-ready")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file. Defaults to ~/.provider-ready/config.json
    #[arg(short = 'c', long, global = true, env = "PROVIDER_READY_CONFIG")]
    pub config: Option<String>,

    /// Project root used as the working directory for startup commands
    /// (auto-detects git root if absent)
    #[arg(short = 'w', long, global = true)]
    pub cwd: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check connectivity of every configured provider
    Doctor {
        /// Attempt to start unreachable providers using their startup_command
        #[arg(long)]
        start: bool,
    },
    /// Make sure a provider is reachable, starting it if needed
    Ensure {
        /// Provider id
        provider: String,
    },
    /// Print the readiness URL probed for a provider
    HealthUrl {
        /// Provider id
        provider: String,
    },
    /// List configured providers and models
    Models,
    /// Show readiness of the active provider
    Status {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Monitor the active provider and print every status update
    Watch,
}
