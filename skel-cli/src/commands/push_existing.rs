//! `skelenox push-existing --workspace <ws.json> [--names] [--comments]`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use skel_core::LogContext;
use skel_sync::initial::{push_existing_comments, push_existing_names};
use skel_sync::{run_initial_sync, InitialSyncReport};

use super::{open_session, Globals, PromptArgs, WorkspaceArgs};

#[derive(Args, Debug)]
pub struct PushExistingArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Push defined names without asking.
    #[arg(long)]
    pub names: bool,

    /// Push defined comments without asking.
    #[arg(long)]
    pub comments: bool,

    #[command(flatten)]
    pub prompts: PromptArgs,
}

impl PushExistingArgs {
    pub fn run(self, globals: &Globals) -> Result<()> {
        let config = globals.load_settings()?;
        let log = LogContext::root("push-existing");
        let mut ws = self.workspace.load()?;
        self.prompts.install(&mut ws);

        let mut session = open_session(&config, &ws, &log)?;
        let remote = session.remote()?;
        let report = if self.names || self.comments {
            let mut report = InitialSyncReport::default();
            if self.names {
                report = report.merge(push_existing_names(&ws, remote, &log));
            }
            if self.comments {
                report = report.merge(push_existing_comments(&ws, remote, &log));
            }
            report
        } else {
            run_initial_sync(&mut ws, remote, &log)
        };
        session.close();

        println!(
            "{} pushed {}, rejected {}, skipped {}, failed {}",
            if report.failed == 0 { "✓".green() } else { "!".yellow() },
            report.pushed,
            report.rejected,
            report.skipped,
            report.failed
        );
        Ok(())
    }
}
