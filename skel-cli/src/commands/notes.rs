//! `skelenox abstract show|push`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use skel_core::LogContext;
use skel_sync::NotesSession;

use super::{open_session, Globals, WorkspaceArgs};

#[derive(Subcommand, Debug)]
pub enum AbstractCommand {
    /// Print the shared abstract.
    Show {
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },
    /// Replace the shared abstract with the contents of a file.
    Push {
        #[command(flatten)]
        workspace: WorkspaceArgs,
        file: PathBuf,
    },
}

pub fn run(command: AbstractCommand, globals: &Globals) -> Result<()> {
    let config = globals.load_settings()?;
    let log = LogContext::root("abstract");
    match command {
        AbstractCommand::Show { workspace } => {
            let ws = workspace.load()?;
            let mut session = open_session(&config, &ws, &log)?;
            let notes = NotesSession::new(log.child("notes"));
            let text = notes
                .load(session.remote()?)
                .context("failed to fetch the abstract")?;
            session.close();
            println!("{text}");
        }
        AbstractCommand::Push { workspace, file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read '{}'", file.display()))?;
            let ws = workspace.load()?;
            let mut session = open_session(&config, &ws, &log)?;
            let mut notes = NotesSession::new(log.child("notes"));
            let accepted = notes
                .flush(&text, session.remote()?)
                .context("failed to push the abstract")?;
            session.close();
            if accepted {
                println!("{} abstract updated", "✓".green());
            } else {
                println!("{} server rejected the abstract", "!".yellow());
            }
        }
    }
    Ok(())
}
