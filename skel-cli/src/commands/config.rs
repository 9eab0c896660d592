//! `skelenox config init|show`

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use skel_core::{config as settings, SkelConfig};

use super::Globals;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write default settings if the file does not exist yet.
    Init,
    /// Print the settings with the API key redacted.
    Show,
}

pub fn run(command: ConfigCommand, globals: &Globals) -> Result<()> {
    let path = globals.settings_path()?;
    match command {
        ConfigCommand::Init => {
            if path.exists() {
                println!("Settings already exist at {}", path.display());
                return Ok(());
            }
            settings::save_at(&path, &SkelConfig::default())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{} Wrote default settings to {}", "✓".green(), path.display());
            println!("  Fill in the server details and set \"edit_flag\" to true.");
        }
        ConfigCommand::Show => {
            let config = settings::read_at(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            println!("{}", config.dump()?);
            if !config.edit_flag {
                eprintln!(
                    "{}",
                    "warning: edit_flag is false, these settings will be refused".yellow()
                );
            }
        }
    }
    Ok(())
}
