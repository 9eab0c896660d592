//! `skelenox pull --workspace <ws.json>`: one sync cycle.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use skel_client::{RemoteApi, RemoteClient};
use skel_core::LogContext;
use skel_sync::{LocalApplier, MutationQueue, SyncAgent, SyncOutcome};

use super::{open_session, Globals, PromptArgs, WorkspaceArgs};

#[derive(Args, Debug)]
pub struct PullArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    #[command(flatten)]
    pub prompts: PromptArgs,
}

impl PullArgs {
    pub fn run(self, globals: &Globals) -> Result<()> {
        let config = globals.load_settings()?;
        let log = LogContext::root("pull");
        let mut ws = self.workspace.load()?;
        self.prompts.install(&mut ws);

        let mut session = open_session(&config, &ws, &log)?;
        let agent_remote = session.attach_peer(RemoteClient::connect(&config, log.child("agent-remote")))?;

        let queue = MutationQueue::spawn(ws, log.child("mutation"))?;
        let applier = LocalApplier::new(queue.handle()?, log.child("applier"));
        let mut agent = SyncAgent::new(agent_remote, applier, log.child("agent"));
        let outcome = agent.sync_once();
        agent.into_remote().close();

        let ws = queue.shutdown()?;
        self.workspace.save(&ws)?;
        session.close();

        match outcome.context("sync cycle failed")? {
            SyncOutcome::Synced(report) => {
                println!(
                    "{} fetched {}, applied {}, unchanged {}, declined {}, filtered {}",
                    "✓".green(),
                    report.fetched,
                    report.applied,
                    report.unchanged,
                    report.declined,
                    report.filtered
                );
                println!("  watermark: {}", report.watermark);
                Ok(())
            }
            SyncOutcome::Offline => bail!("session is offline"),
            SyncOutcome::Unreachable => bail!("server unreachable, nothing was applied"),
        }
    }
}
