//! `skelenox edit --workspace <ws.json> <change>`: apply a local edit and
//! forward it the way the host hooks would.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use skel_core::{Address, LogContext};
use skel_sync::{InterceptorSet, Workspace, WorkspaceEvent};

use super::{open_session, Globals, WorkspaceArgs};
use crate::AddressArg;

#[derive(Args, Debug)]
pub struct EditArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    #[command(subcommand)]
    pub command: EditCommand,
}

#[derive(Subcommand, Debug)]
pub enum EditCommand {
    /// Rename an address.
    Rename { address: AddressArg, name: String },
    /// Set the comment at an address.
    Comment {
        address: AddressArg,
        text: String,
        /// Set the repeatable comment instead of the plain one.
        #[arg(long)]
        repeatable: bool,
    },
    /// Set the type of an address, as the host would print it.
    SetType {
        address: AddressArg,
        #[arg(value_name = "TYPE")]
        type_string: String,
    },
    /// Create a structure.
    CreateStruct { name: String },
}

impl EditArgs {
    pub fn run(self, globals: &Globals) -> Result<()> {
        let config = globals.load_settings()?;
        let log = LogContext::root("edit");
        let mut ws = self.workspace.load()?;

        let event = apply(&mut ws, self.command)?;
        let mut session = open_session(&config, &ws, &log)?;
        let mut interceptors = InterceptorSet::standard(log.child("interceptors"));
        interceptors.hook();
        let report = interceptors.dispatch(&ws, &event, session.remote()?);
        interceptors.unhook();
        session.close();
        self.workspace.save(&ws)?;

        let mark = if report.failed == 0 && report.rejected == 0 {
            "✓".green()
        } else {
            "!".yellow()
        };
        println!(
            "{mark} saved locally; sent {}, rejected {}, failed {}",
            report.sent, report.rejected, report.failed
        );
        Ok(())
    }
}

fn apply(ws: &mut dyn Workspace, command: EditCommand) -> Result<WorkspaceEvent> {
    let event = match command {
        EditCommand::Rename { address, name } => {
            let address = Address::from(address);
            if !ws.set_name(address, &name) {
                bail!("cannot rename {address}: outside the program or nothing to change");
            }
            WorkspaceEvent::Renamed {
                address,
                new_name: name,
                local: false,
            }
        }
        EditCommand::Comment {
            address,
            text,
            repeatable,
        } => {
            let address = Address::from(address);
            ws.set_comment(address, &text, repeatable);
            WorkspaceEvent::CommentChanged { address, repeatable }
        }
        EditCommand::SetType {
            address,
            type_string,
        } => {
            let address = Address::from(address);
            ws.set_type_string(address, &type_string);
            WorkspaceEvent::TypeChanged { address }
        }
        EditCommand::CreateStruct { name } => {
            let id = ws.create_struct(&name);
            WorkspaceEvent::StructCreated { id, name }
        }
    };
    Ok(event)
}

#[cfg(test)]
mod tests {
    use skel_sync::MemoryWorkspace;

    use super::*;

    #[test]
    fn rename_outside_range_is_refused() {
        let mut ws = MemoryWorkspace::new().with_range(Address(0x400000), Address(0x4fffff));
        let command = EditCommand::Rename {
            address: AddressArg(Address(0x10)),
            name: "far".to_string(),
        };
        assert!(apply(&mut ws, command).is_err());
    }

    #[test]
    fn comment_edit_produces_comment_event() {
        let mut ws = MemoryWorkspace::new();
        let command = EditCommand::Comment {
            address: AddressArg(Address(0x401000)),
            text: "entry".to_string(),
            repeatable: true,
        };
        let event = apply(&mut ws, command).unwrap();
        assert_eq!(
            event,
            WorkspaceEvent::CommentChanged {
                address: Address(0x401000),
                repeatable: true
            }
        );
        assert_eq!(ws.repeatable_comment(Address(0x401000)).as_deref(), Some("entry"));
    }
}
