//! Session bootstrap: resolve the binary on the server, uploading it when
//! the server has never seen it.

use skel_client::RemoteApi;
use skel_core::{InputFile, LogContext, SampleId, SampleIdentity};

use crate::error::{io_err, SyncError};
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Offline,
    Online,
    /// Terminal.
    Closed,
}

/// A remote connection bound to one sample.
pub struct Session<R> {
    remote: R,
    identity: Option<SampleIdentity>,
    state: SessionState,
    log: LogContext,
}

impl<R: RemoteApi> Session<R> {
    pub fn new(remote: R, log: LogContext) -> Self {
        Self {
            remote,
            identity: None,
            state: SessionState::Offline,
            log,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<&SampleIdentity> {
        self.identity.as_ref()
    }

    pub fn sample_id(&self) -> Option<SampleId> {
        self.identity.as_ref().and_then(|i| i.remote_sample_id)
    }

    /// Resolve `input` on the server and go online.
    ///
    /// Looks the MD5 up; if unknown, uploads the file and looks it up once
    /// more. A transport failure leaves the session offline.
    pub fn open(&mut self, input: &InputFile) -> Result<SampleId, SyncError> {
        match self.state {
            SessionState::Closed => return Err(SyncError::SessionClosed),
            SessionState::Online => {
                if let Some(id) = self.sample_id() {
                    return Ok(id);
                }
            }
            SessionState::Offline => {}
        }

        let span = self.log.span().clone();
        let _entered = span.enter();
        let mut identity = SampleIdentity::unresolved(&input.md5);

        let mut resolved = self.remote.resolve_sample_id(&identity.local_file_hash)?;
        if resolved.is_none() {
            tracing::info!(md5 = %identity.local_file_hash, file = %input.path.display(), "sample unknown to server, uploading");
            let bytes = std::fs::read(&input.path).map_err(|e| io_err(&input.path, e))?;
            self.remote.upload_sample(&input.file_name(), &bytes)?;
            resolved = self.remote.resolve_sample_id(&identity.local_file_hash)?;
        }
        let Some(sample) = resolved else {
            tracing::error!(md5 = %identity.local_file_hash, "sample could not be registered");
            return Err(SyncError::IdentityUnresolved {
                md5: identity.local_file_hash,
            });
        };

        identity.remote_sample_id = Some(sample);
        self.remote.attach_sample(sample);
        self.log.record_sample(sample);
        tracing::info!(sample = %sample, "session online");
        self.identity = Some(identity);
        self.state = SessionState::Online;
        Ok(sample)
    }

    /// [`open`](Self::open) for the binary `ws` was built from.
    pub fn open_workspace(&mut self, ws: &dyn Workspace) -> Result<SampleId, SyncError> {
        let input = ws.input_file().ok_or(SyncError::NoInputFile)?;
        self.open(&input)
    }

    /// The connection, once online.
    pub fn remote(&mut self) -> Result<&mut R, SyncError> {
        match self.state {
            SessionState::Online => Ok(&mut self.remote),
            SessionState::Offline => Err(SyncError::Offline),
            SessionState::Closed => Err(SyncError::SessionClosed),
        }
    }

    /// Bind another connection to the same sample, e.g. for the sync agent.
    pub fn attach_peer<P: RemoteApi>(&self, mut peer: P) -> Result<P, SyncError> {
        match self.state {
            SessionState::Closed => Err(SyncError::SessionClosed),
            SessionState::Offline => Err(SyncError::Offline),
            SessionState::Online => {
                let sample = self.sample_id().ok_or(SyncError::Offline)?;
                peer.attach_sample(sample);
                Ok(peer)
            }
        }
    }

    /// Close the connection and forget the identity. Idempotent.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.remote.close();
        self.identity = None;
        self.state = SessionState::Closed;
        self.log.in_scope(|| tracing::debug!("session closed"));
    }
}
