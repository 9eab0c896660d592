//! `skelenox agent --workspace <ws.json>`: sync until ctrl-c.
//!
//! Pull only. A JSON workspace has no live edit events, so no interceptors
//! are hooked here; local edits are forwarded by `skelenox edit`. Teardown
//! stops the timer, then the agent, then the mutation queue, and closes the
//! session last.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use skel_client::RemoteClient;
use skel_core::LogContext;
use skel_sync::{run_initial_sync, AgentState, IntervalTimer, LocalApplier, MutationQueue, SyncAgent, SyncAgentHandle};

use super::{open_session, Globals, PromptArgs, WorkspaceArgs};

#[derive(Args, Debug)]
pub struct AgentArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    #[command(flatten)]
    pub prompts: PromptArgs,
}

impl AgentArgs {
    pub fn run(self, globals: &Globals) -> Result<()> {
        let config = globals.load_settings()?;
        let log = LogContext::root("agent");
        let mut ws = self.workspace.load()?;
        self.prompts.install(&mut ws);

        let mut session = open_session(&config, &ws, &log)?;
        if config.initial_sync {
            let report = run_initial_sync(&mut ws, session.remote()?, &log.child("initial-sync"));
            println!(
                "Initial sync: pushed {}, skipped {}, failed {}",
                report.pushed, report.skipped, report.failed
            );
        }
        let agent_remote = session.attach_peer(RemoteClient::connect(&config, log.child("agent-remote")))?;

        let queue = MutationQueue::spawn(ws, log.child("mutation"))?;
        let applier = LocalApplier::new(queue.handle()?, log.child("applier"));
        let interval = config.sync_interval();
        let handle = SyncAgent::new(agent_remote, applier, log.child("agent")).spawn(interval)?;
        let ticker = handle.ticker();
        let timer = IntervalTimer::start(interval, move || ticker.tick())?;

        println!(
            "{} Syncing sample {} every {} ms, ctrl-c to stop",
            "✓".green(),
            session.sample_id().map(|s| s.to_string()).unwrap_or_default(),
            interval.as_millis()
        );
        let waited = wait_for_shutdown(&handle);

        timer.cancel();
        timer.join()?;
        let exit = handle.stop_and_join()?;
        let ws = queue.shutdown()?;
        self.workspace.save(&ws)?;
        session.close();
        waited?;

        println!("Stopped after {} cycles, watermark {}", exit.cycles, exit.watermark);
        match exit.error {
            Some(err) => Err(err).context("sync agent stopped on error"),
            None => Ok(()),
        }
    }
}

/// Block until ctrl-c or until the agent stops on its own.
fn wait_for_shutdown(handle: &SyncAgentHandle) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    runtime.block_on(watch(handle))
}

async fn watch(handle: &SyncAgentHandle) -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut poll = tokio::time::interval(Duration::from_millis(200));
    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.context("failed to listen for ctrl-c")?;
                tracing::info!("ctrl-c received, stopping");
                return Ok(());
            }
            _ = poll.tick() => {
                if handle.state() == AgentState::Stopped {
                    tracing::warn!("sync agent stopped on its own");
                    return Ok(());
                }
            }
        }
    }
}
