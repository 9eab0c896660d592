//! # skel-sync
//!
//! Two-way synchronization of analyst annotations between a disassembly
//! workspace and the collaboration server.
//!
//! ## Pull path
//!
//! [`SyncAgent`] runs on its own thread with its own connection. Each cycle
//! fetches the comments and names newer than the watermark, drops
//! boilerplate ([`filter`]) and hands the rest to the [`LocalApplier`],
//! which performs every read-compare-write as one task on the
//! [`MutationQueue`] thread that owns the workspace.
//!
//! ## Push path
//!
//! The host reports local edits as [`WorkspaceEvent`]s. The observers in an
//! [`InterceptorSet`] turn them into pushes on the session connection.
//!
//! ## Session
//!
//! [`Session`] resolves the binary on the server by MD5 (uploading it when
//! unknown) before anything else can run.

pub mod agent;
pub mod applier;
pub mod error;
pub mod filter;
pub mod initial;
pub mod interceptors;
pub mod notes;
pub mod proposed;
pub mod queue;
pub mod session;
pub mod signal;
pub mod timer;
pub mod typestr;
pub mod workspace;

pub use agent::{AgentExit, AgentState, AgentTicker, SyncAgent, SyncAgentHandle, SyncOutcome, SyncReport};
pub use applier::{ApplyOutcome, LocalApplier};
pub use error::SyncError;
pub use initial::{run_initial_sync, InitialSyncReport};
pub use interceptors::{
    Capabilities, ChangeObserver, CommandObserver, DatabaseObserver, DispatchReport, InterceptorSet,
    Outbound, ProcessorObserver, StructEvent, WorkspaceEvent,
};
pub use notes::{NoteChange, NotesSession};
pub use queue::{MutationHandle, MutationQueue};
pub use session::{Session, SessionState};
pub use timer::IntervalTimer;
pub use typestr::normalize_type;
pub use workspace::{Confirmer, LocalStruct, MemoryWorkspace, StructMember, Workspace};
