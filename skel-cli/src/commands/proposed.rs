//! `skelenox proposed --workspace <ws.json> [--json]`

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use skel_client::RemoteApi;
use skel_core::{LogContext, ProposedName};
use skel_sync::proposed::fill_current_names;

use super::{open_session, Globals, WorkspaceArgs};

#[derive(Args, Debug)]
pub struct ProposedArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ProposedRow {
    #[tabled(rename = "address")]
    address: String,
    #[tabled(rename = "current name")]
    current_name: String,
    #[tabled(rename = "proposed name")]
    proposed_name: String,
    #[tabled(rename = "machoc hash")]
    content_hash: String,
}

impl From<&ProposedName> for ProposedRow {
    fn from(p: &ProposedName) -> Self {
        Self {
            address: p.address.to_string(),
            current_name: p.current_name.clone().unwrap_or_else(|| "-".to_string()),
            proposed_name: p.proposed_name.clone(),
            content_hash: format!("{:#010x}", p.content_hash),
        }
    }
}

impl ProposedArgs {
    pub fn run(self, globals: &Globals) -> Result<()> {
        let config = globals.load_settings()?;
        let log = LogContext::root("proposed");
        let ws = self.workspace.load()?;

        let mut session = open_session(&config, &ws, &log)?;
        let mut rows = session
            .remote()?
            .fetch_proposed_names()
            .context("failed to fetch proposed names")?;
        session.close();
        fill_current_names(&mut rows, &ws);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }
        if rows.is_empty() {
            println!("No proposed names.");
            return Ok(());
        }
        let table_rows: Vec<ProposedRow> = rows.iter().map(ProposedRow::from).collect();
        let mut table = Table::new(table_rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
