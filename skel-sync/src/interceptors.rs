//! Forwarding of local edits to the server.
//!
//! The host reports edits as [`WorkspaceEvent`]s. Each [`ChangeObserver`]
//! stands for one host event source and turns the events it understands
//! into [`Outbound`] pushes; [`InterceptorSet`] runs them in registration
//! order and sends the result. Dispatch happens on the mutation thread, so
//! observers read the workspace directly.
//!
//! A failed push is logged and dropped; it never interrupts the analyst.

use std::fmt;

use skel_client::RemoteApi;
use skel_core::{Address, LogContext};

use crate::filter::{is_boilerplate_comment, is_default_local_name};
use crate::typestr::normalize_type;
use crate::workspace::Workspace;

// ---------------------------------------------------------------------------
// 1. Events and pushes
// ---------------------------------------------------------------------------

/// Structure-level edits that are acknowledged but not forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructEvent {
    Renamed { id: u64, name: String },
    Deleted { id: u64 },
    Expanded { id: u64 },
    CommentChanged { id: u64 },
    MemberCreated { id: u64, member: String },
    MemberRenamed { id: u64, member: String },
    MemberChanged { id: u64, member: String },
    MemberDeleted { id: u64, member: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    /// A host UI command finished at `address` (`MakeComment`, `SetType`, ...).
    Command { name: String, address: Address },
    CommentChanged { address: Address, repeatable: bool },
    Renamed { address: Address, new_name: String, local: bool },
    TypeChanged { address: Address },
    StructCreated { id: u64, name: String },
    Struct(StructEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Comment { address: Address, text: String },
    Name { address: Address, name: String },
    Type { address: Address, type_string: String },
    CreateStruct { name: String },
}

impl fmt::Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outbound::Comment { address, .. } => write!(f, "comment at {address}"),
            Outbound::Name { address, name } => write!(f, "name {name} at {address}"),
            Outbound::Type { address, .. } => write!(f, "type at {address}"),
            Outbound::CreateStruct { name } => write!(f, "structure {name}"),
        }
    }
}

/// Which kinds of edits an observer reacts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub comments: bool,
    pub names: bool,
    pub types: bool,
    pub structures: bool,
}

// ---------------------------------------------------------------------------
// 2. Observer trait
// ---------------------------------------------------------------------------

/// One host event source. Every hook defaults to "nothing to push".
pub trait ChangeObserver: Send {
    fn label(&self) -> &'static str;
    fn capabilities(&self) -> Capabilities;

    fn on_command(&mut self, _ws: &dyn Workspace, _command: &str, _address: Address) -> Vec<Outbound> {
        Vec::new()
    }

    fn on_comment_changed(&mut self, _ws: &dyn Workspace, _address: Address, _repeatable: bool) -> Vec<Outbound> {
        Vec::new()
    }

    fn on_renamed(&mut self, _ws: &dyn Workspace, _address: Address, _new_name: &str, _local: bool) -> Vec<Outbound> {
        Vec::new()
    }

    fn on_type_changed(&mut self, _ws: &dyn Workspace, _address: Address) -> Vec<Outbound> {
        Vec::new()
    }

    fn on_struct_created(&mut self, _id: u64, _name: &str) -> Vec<Outbound> {
        Vec::new()
    }

    fn on_struct_event(&mut self, _event: &StructEvent) {}
}

fn comment_push(address: Address, text: Option<String>) -> Option<Outbound> {
    let text = text?;
    if is_boilerplate_comment(&text) {
        tracing::debug!(address = %address, "boilerplate comment not forwarded");
        return None;
    }
    Some(Outbound::Comment { address, text })
}

fn type_push(ws: &dyn Workspace, address: Address) -> Option<Outbound> {
    let raw = ws.type_string(address)?;
    let name = ws.name(address);
    Some(Outbound::Type {
        address,
        type_string: normalize_type(&raw, name.as_deref()),
    })
}

// ---------------------------------------------------------------------------
// 3. Observers
// ---------------------------------------------------------------------------

/// Reacts to finished UI commands.
#[derive(Debug, Default)]
pub struct CommandObserver;

impl ChangeObserver for CommandObserver {
    fn label(&self) -> &'static str {
        "command"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            comments: true,
            types: true,
            ..Capabilities::default()
        }
    }

    fn on_command(&mut self, ws: &dyn Workspace, command: &str, address: Address) -> Vec<Outbound> {
        match command {
            "MakeComment" => [
                comment_push(address, ws.comment(address)),
                comment_push(address, ws.function_comment(address, false)),
            ]
            .into_iter()
            .flatten()
            .collect(),
            "MakeRptCmt" => [
                comment_push(address, ws.repeatable_comment(address)),
                comment_push(address, ws.function_comment(address, true)),
            ]
            .into_iter()
            .flatten()
            .collect(),
            "SetType" => type_push(ws, address).into_iter().collect(),
            "MakeFunction" | "DeclareStructVar" | "OpStructOffset" => {
                tracing::debug!(command, address = %address, "command acknowledged");
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

/// Reacts to database-level change notifications.
#[derive(Debug, Default)]
pub struct DatabaseObserver;

impl ChangeObserver for DatabaseObserver {
    fn label(&self) -> &'static str {
        "database"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            comments: true,
            types: true,
            structures: true,
            ..Capabilities::default()
        }
    }

    fn on_comment_changed(&mut self, ws: &dyn Workspace, address: Address, repeatable: bool) -> Vec<Outbound> {
        let text = if repeatable {
            ws.repeatable_comment(address)
        } else {
            ws.comment(address)
        };
        comment_push(address, text).into_iter().collect()
    }

    fn on_type_changed(&mut self, ws: &dyn Workspace, address: Address) -> Vec<Outbound> {
        type_push(ws, address).into_iter().collect()
    }

    fn on_struct_created(&mut self, _id: u64, name: &str) -> Vec<Outbound> {
        vec![Outbound::CreateStruct {
            name: name.to_string(),
        }]
    }

    fn on_struct_event(&mut self, event: &StructEvent) {
        tracing::debug!(event = ?event, "structure event not forwarded");
    }
}

/// Reacts to renames reported by the processor module.
#[derive(Debug, Default)]
pub struct ProcessorObserver;

impl ChangeObserver for ProcessorObserver {
    fn label(&self) -> &'static str {
        "processor"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            names: true,
            ..Capabilities::default()
        }
    }

    fn on_renamed(&mut self, ws: &dyn Workspace, address: Address, new_name: &str, local: bool) -> Vec<Outbound> {
        if !ws.contains(address) {
            tracing::warn!(address = %address, "rename outside program range ignored");
            return Vec::new();
        }
        if local {
            tracing::debug!(address = %address, name = new_name, "local name not forwarded");
            return Vec::new();
        }
        if new_name.is_empty() || is_default_local_name(new_name) {
            return Vec::new();
        }
        vec![Outbound::Name {
            address,
            name: new_name.to_string(),
        }]
    }
}

// ---------------------------------------------------------------------------
// 4. Dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub rejected: usize,
    pub failed: usize,
}

/// The registered observers plus the hooked/unhooked switch.
pub struct InterceptorSet {
    observers: Vec<Box<dyn ChangeObserver>>,
    hooked: bool,
    log: LogContext,
}

impl InterceptorSet {
    pub fn new(log: LogContext) -> Self {
        Self {
            observers: Vec::new(),
            hooked: false,
            log,
        }
    }

    /// Command, database and processor observers, unhooked.
    pub fn standard(log: LogContext) -> Self {
        let mut set = Self::new(log);
        set.register(Box::new(CommandObserver));
        set.register(Box::new(DatabaseObserver));
        set.register(Box::new(ProcessorObserver));
        set
    }

    pub fn register(&mut self, observer: Box<dyn ChangeObserver>) {
        self.observers.push(observer);
    }

    /// Union of every observer's capabilities.
    pub fn capabilities(&self) -> Capabilities {
        self.observers
            .iter()
            .map(|o| o.capabilities())
            .fold(Capabilities::default(), |acc, c| Capabilities {
                comments: acc.comments || c.comments,
                names: acc.names || c.names,
                types: acc.types || c.types,
                structures: acc.structures || c.structures,
            })
    }

    pub fn hook(&mut self) {
        self.hooked = true;
        self.log.in_scope(|| tracing::debug!(observers = self.observers.len(), "interceptors hooked"));
    }

    pub fn unhook(&mut self) {
        self.hooked = false;
        self.log.in_scope(|| tracing::debug!("interceptors unhooked"));
    }

    pub fn is_hooked(&self) -> bool {
        self.hooked
    }

    /// Collect the pushes `event` calls for, without sending them.
    pub fn collect(&mut self, ws: &dyn Workspace, event: &WorkspaceEvent) -> Vec<Outbound> {
        let mut out = Vec::new();
        for observer in &mut self.observers {
            let pushes = match event {
                WorkspaceEvent::Command { name, address } => observer.on_command(ws, name, *address),
                WorkspaceEvent::CommentChanged { address, repeatable } => {
                    observer.on_comment_changed(ws, *address, *repeatable)
                }
                WorkspaceEvent::Renamed {
                    address,
                    new_name,
                    local,
                } => observer.on_renamed(ws, *address, new_name, *local),
                WorkspaceEvent::TypeChanged { address } => observer.on_type_changed(ws, *address),
                WorkspaceEvent::StructCreated { id, name } => observer.on_struct_created(*id, name),
                WorkspaceEvent::Struct(struct_event) => {
                    observer.on_struct_event(struct_event);
                    Vec::new()
                }
            };
            out.extend(pushes);
        }
        out
    }

    /// Forward `event` through `remote`. A no-op while unhooked.
    pub fn dispatch(
        &mut self,
        ws: &dyn Workspace,
        event: &WorkspaceEvent,
        remote: &mut dyn RemoteApi,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        if !self.hooked {
            return report;
        }
        let span = self.log.span().clone();
        let _entered = span.enter();
        for push in self.collect(ws, event) {
            match send(remote, &push) {
                Ok(true) => report.sent += 1,
                Ok(false) => {
                    tracing::warn!(push = %push, "server rejected local edit");
                    report.rejected += 1;
                }
                Err(err) => {
                    tracing::error!(push = %push, error = %err, "failed to forward local edit");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

fn send(remote: &mut dyn RemoteApi, push: &Outbound) -> Result<bool, skel_client::ClientError> {
    match push {
        Outbound::Comment { address, text } => remote.push_comment(*address, text),
        Outbound::Name { address, name } => remote.push_name(*address, name),
        Outbound::Type {
            address,
            type_string,
        } => remote.push_type(*address, type_string),
        Outbound::CreateStruct { name } => remote.create_struct(name).map(|id| id.is_some()),
    }
}
