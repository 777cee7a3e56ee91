use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod format;
mod util;

use cli::{Cli, Commands};
use config::Config;
use format::FormatOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let opts = FormatOptions::new(cli.no_color || config.no_color, cli.json, cli.compact);

    match cli.command {
        Commands::Status { link, wait } => {
            let client = util::build_client(&config, &link)?;
            commands::cmd_status(&client, Duration::from_secs(wait), &opts, cli.quiet).await?;
        }
        Commands::Watch { link } => {
            let client = util::build_client(&config, &link)?;
            commands::cmd_watch(&client, &opts, cli.quiet).await?;
        }
        Commands::Set { link, setting } => {
            let client = util::build_client(&config, &link)?;
            commands::cmd_set(&client, setting, cli.quiet).await?;
        }
        Commands::Feed { link } => {
            let client = util::build_client(&config, &link)?;
            commands::cmd_feed(&client, cli.quiet).await?;
        }
        Commands::SyncTime { link } => {
            let client = util::build_client(&config, &link)?;
            commands::cmd_sync_time(&client, cli.quiet).await?;
        }
        Commands::Schedule { link, action } => {
            let client = util::build_client(&config, &link)?;
            commands::cmd_schedule(&client, action, cli.quiet).await?;
        }
        Commands::Shell { link } => {
            let client = util::build_client(&config, &link)?;
            commands::cmd_shell(&client, &opts).await?;
        }
        Commands::Config { action } => {
            commands::cmd_config(action, cli.quiet)?;
        }
    }

    Ok(())
}
