//! Subcommands and the plumbing they share.

pub mod agent;
pub mod config;
pub mod edit;
pub mod notes;
pub mod proposed;
pub mod pull;
pub mod push_existing;
pub mod sample;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use skel_client::RemoteClient;
use skel_core::{config as settings, LogContext, SkelConfig};
use skel_sync::{MemoryWorkspace, Session, SyncError, Workspace};

/// Options accepted by every subcommand.
#[derive(Debug, Default)]
pub struct Globals {
    pub config: Option<PathBuf>,
}

impl Globals {
    pub fn settings_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => settings::default_path().context("could not determine the settings directory"),
        }
    }

    /// Edited settings, or an error telling the analyst what to fix.
    pub fn load_settings(&self) -> Result<SkelConfig> {
        let path = self.settings_path()?;
        let config = settings::load_at(&path)
            .with_context(|| format!("cannot use settings from {}", path.display()))?;
        tracing::debug!(settings = %config.dump()?, "effective settings");
        Ok(config)
    }
}

/// `--workspace <ws.json>`
#[derive(Args, Debug)]
pub struct WorkspaceArgs {
    /// JSON workspace file.
    #[arg(long, short = 'w', value_name = "PATH")]
    pub workspace: PathBuf,
}

impl WorkspaceArgs {
    pub fn load(&self) -> Result<MemoryWorkspace> {
        MemoryWorkspace::load(&self.workspace)
            .with_context(|| format!("failed to load workspace '{}'", self.workspace.display()))
    }

    pub fn save(&self, ws: &MemoryWorkspace) -> Result<()> {
        ws.save(&self.workspace)
            .with_context(|| format!("failed to save workspace '{}'", self.workspace.display()))
    }
}

/// How confirmation prompts are answered.
#[derive(Args, Debug, Default)]
pub struct PromptArgs {
    /// Answer yes to every prompt.
    #[arg(long, conflicts_with = "no")]
    pub yes: bool,

    /// Answer no to every prompt.
    #[arg(long)]
    pub no: bool,
}

impl PromptArgs {
    pub fn install(&self, ws: &mut MemoryWorkspace) {
        if self.yes {
            ws.answer_all(true);
        } else if self.no {
            ws.answer_all(false);
        } else {
            ws.set_confirmer(Box::new(ask_stdin));
        }
    }
}

fn ask_stdin(question: &str) -> bool {
    print!("{question} [y/N] ");
    let _ = io::stdout().flush();
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Resolve the workspace's binary on the server and go online.
pub fn open_session(config: &SkelConfig, ws: &dyn Workspace, log: &LogContext) -> Result<Session<RemoteClient>> {
    let remote = RemoteClient::connect(config, log.child("remote"));
    let mut session = Session::new(remote, log.child("session"));
    let sample = match session.open_workspace(ws) {
        Err(SyncError::NoInputFile) => bail!(
            "workspace has no input file; add an \"input\" entry with \"path\" and \"md5\""
        ),
        opened => opened.with_context(|| match ws.input_file() {
            Some(input) => format!("failed to open a session for '{}'", input.path.display()),
            None => "failed to open a session".to_string(),
        })?,
    };
    tracing::debug!(sample = %sample, "session ready");
    Ok(session)
}
