//! Error types for skel-sync.

use std::path::PathBuf;

use thiserror::Error;

use skel_client::ClientError;
use skel_core::CoreError;

/// All errors that can arise from the synchronization engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the remote API client.
    #[error("remote error: {0}")]
    Client(#[from] ClientError),

    /// An error from settings or input-file handling.
    #[error("{0}")]
    Core(#[from] CoreError),

    /// The sample could be neither found nor created on the server.
    #[error("sample {md5} cannot be resolved or registered on the server")]
    IdentityUnresolved { md5: String },

    /// The workspace does not expose the binary it was built from.
    #[error("workspace has no input file")]
    NoInputFile,

    /// The mutation thread is gone; no workspace write can happen anymore.
    #[error("workspace mutation queue is closed")]
    QueueClosed,

    /// A task was submitted from the mutation thread itself.
    #[error("synchronous mutation requested from the mutation thread")]
    ReentrantMutation,

    /// The session was torn down and cannot be reused.
    #[error("session is closed")]
    SessionClosed,

    /// The session never completed its handshake.
    #[error("session is offline")]
    Offline,

    /// A worker thread panicked.
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),

    /// A workspace file that is not valid JSON.
    #[error("invalid workspace file {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
