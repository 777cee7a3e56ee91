//! Config command implementation.

use anyhow::{Context, Result, bail};

use crate::cli::ConfigAction;
use crate::config::Config;

pub fn cmd_config(action: ConfigAction, quiet: bool) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load();
            let content =
                toml::to_string_pretty(&config).context("Failed to serialize config")?;
            print!("{}", content);
        }
        ConfigAction::Path => {
            println!("{}", Config::path().display());
        }
        ConfigAction::Init { force } => {
            let path = Config::path();
            if path.exists() && !force {
                bail!(
                    "Config already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            Config::default().save()?;
            if !quiet {
                println!("Wrote default configuration to {}", path.display());
            }
        }
    }
    Ok(())
}
