//! Config Commands

use anyhow::{bail, Result};
use clap::Subcommand;
use std::path::Path;

use crate::config::AppdriveConfig;
use crate::output::{print_success, render_serialized, OutputFormat};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a config file with the default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn execute(
    cmd: ConfigCommands,
    config: &AppdriveConfig,
    path: &Path,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        ConfigCommands::Show => match format {
            OutputFormat::Json | OutputFormat::Yaml => println!("{}", render_serialized(config, format)?),
            _ => print!("{}", toml::to_string_pretty(config)?),
        },
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            AppdriveConfig::default().save(path)?;
            print_success(&format!("Wrote {}", path.display()));
        }
    }
    Ok(())
}
