//! skelenox: share names, comments and types of a disassembly workspace
//! with a collaboration server.
//!
//! # Usage
//!
//! ```text
//! skelenox config init|show
//! skelenox sample <binary>
//! skelenox pull --workspace <ws.json> [--yes|--no]
//! skelenox agent --workspace <ws.json> [--yes|--no]
//! skelenox push-existing --workspace <ws.json> [--names] [--comments]
//! skelenox edit --workspace <ws.json> rename|comment|set-type|create-struct ...
//! skelenox proposed --workspace <ws.json> [--json]
//! skelenox abstract show|push --workspace <ws.json> [<file>]
//! ```
//!
//! Every command accepts `--config <path>` (default
//! `<config dir>/skelenox/skelsettings.json`) and `--log-json`.

mod commands;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    agent::AgentArgs, config::ConfigCommand, edit::EditArgs, notes::AbstractCommand,
    proposed::ProposedArgs, pull::PullArgs, push_existing::PushExistingArgs, sample::SampleArgs,
    Globals,
};
use skel_core::Address;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "skelenox",
    version,
    about = "Synchronize analyst annotations with a collaboration server",
    long_about = None,
)]
struct Cli {
    /// Settings file.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or inspect the settings file.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Resolve a binary on the server, uploading it if unknown.
    Sample(SampleArgs),

    /// Run one sync cycle into a workspace file.
    Pull(PullArgs),

    /// Keep a workspace file in sync until interrupted.
    Agent(AgentArgs),

    /// Push names and comments that predate the session.
    PushExisting(PushExistingArgs),

    /// Edit the workspace and forward the change.
    Edit(EditArgs),

    /// List names other analysts gave to similar functions.
    Proposed(ProposedArgs),

    /// Read or replace the shared abstract.
    Abstract {
        #[command(subcommand)]
        command: AbstractCommand,
    },
}

// ---------------------------------------------------------------------------
// Shared address argument
// ---------------------------------------------------------------------------

/// `0x401000` or `4198400`.
#[derive(Debug, Clone, Copy)]
pub struct AddressArg(pub Address);

impl FromStr for AddressArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => s.parse::<u64>(),
        };
        parsed
            .map(|v| Self(Address(v)))
            .map_err(|_| format!("invalid address '{s}'; expected 0x-prefixed hex or decimal"))
    }
}

impl fmt::Display for AddressArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<AddressArg> for Address {
    fn from(a: AddressArg) -> Self {
        a.0
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    let globals = Globals {
        config: cli.config,
    };
    match cli.command {
        Commands::Config { command } => commands::config::run(command, &globals),
        Commands::Sample(args) => args.run(&globals),
        Commands::Pull(args) => args.run(&globals),
        Commands::Agent(args) => args.run(&globals),
        Commands::PushExisting(args) => args.run(&globals),
        Commands::Edit(args) => args.run(&globals),
        Commands::Proposed(args) => args.run(&globals),
        Commands::Abstract { command } => commands::notes::run(command, &globals),
    }
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_parse_hex_and_decimal() {
        assert_eq!(AddressArg::from_str("0x401000").unwrap().0, Address(0x401000));
        assert_eq!(AddressArg::from_str("4096").unwrap().0, Address(4096));
        assert!(AddressArg::from_str("sub_401000").is_err());
    }
}
