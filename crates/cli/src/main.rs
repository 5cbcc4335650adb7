//! appdrive CLI - Main Entry Point

use appdrive_cli::commands::{config, list, run, status, validate};
use appdrive_cli::config::{AppdriveConfig, DEFAULT_CONFIG_PATH};
use appdrive_cli::output::{self, print_warning};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// appdrive - scripted Android app flows over Appium
#[derive(Parser)]
#[command(name = "appdrive")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file
    #[arg(long, env = "APPDRIVE_CONFIG", default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    /// Automation server URL, overrides the config file
    #[arg(long, env = "APPDRIVE_SERVER", global = true)]
    server: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run flows
    Run(run::RunArgs),

    /// List built-in and local flows
    List,

    /// Check flow files without a device
    Validate(validate::ValidateArgs),

    /// Check the automation server
    Status,

    /// Show or create the config file
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let mut settings = AppdriveConfig::load(&cli.config)?;
    if let Some(server) = cli.server {
        settings.server.url = server;
    }
    if !cli.config.exists() && matches!(cli.command, Commands::Run(_)) {
        print_warning(&format!("{} not found, using defaults", cli.config.display()));
    }

    match cli.command {
        Commands::Run(args) => run::execute(args, &settings, cli.format).await?,
        Commands::List => list::execute(&settings, cli.format).await?,
        Commands::Validate(args) => validate::execute(args, cli.format).await?,
        Commands::Status => status::execute(&settings, cli.format).await?,
        Commands::Config(cmd) => config::execute(cmd, &settings, &cli.config, cli.format).await?,
    }

    Ok(())
}
