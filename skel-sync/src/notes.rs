//! Shared abstract (free-text notes) editing.
//!
//! Local edits are batched: every change re-reads the remote text to spot
//! concurrent editors, and the local text is pushed every
//! [`PUSH_EVERY`] changes.

use skel_client::{ClientError, RemoteApi};
use skel_core::LogContext;

/// Changes between two pushes.
pub const PUSH_EVERY: usize = 10;

/// What one local change led to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteChange {
    /// The remote text diverged more than local typing explains.
    pub concurrent_edits: bool,
    pub pushed: bool,
}

/// `true` when the length gap between local and remote text is outside
/// what `pending` unpushed changes (plus one) could produce.
///
/// A length heuristic only: equal-length edits go unnoticed.
pub fn length_mismatch(local: &str, remote: &str, pending: usize) -> bool {
    let delta = local.chars().count() as i64 - remote.chars().count() as i64;
    !(0..=pending as i64 + 1).contains(&delta)
}

pub struct NotesSession {
    pending: usize,
    log: LogContext,
}

impl NotesSession {
    pub fn new(log: LogContext) -> Self {
        Self { pending: 0, log }
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Current remote text.
    pub fn load(&self, remote: &mut dyn RemoteApi) -> Result<String, ClientError> {
        remote.get_abstract()
    }

    /// Record one local edit producing `local`.
    pub fn on_text_changed(&mut self, local: &str, remote: &mut dyn RemoteApi) -> Result<NoteChange, ClientError> {
        self.pending += 1;
        let remote_text = remote.get_abstract()?;
        let mut change = NoteChange::default();
        if length_mismatch(local, &remote_text, self.pending) {
            self.log.in_scope(|| tracing::warn!(pending = self.pending, "many concurrent edits on the abstract"));
            change.concurrent_edits = true;
        }
        if self.pending > PUSH_EVERY {
            change.pushed = self.flush(local, remote)?;
        }
        Ok(change)
    }

    /// Push `local` now and reset the change counter.
    pub fn flush(&mut self, local: &str, remote: &mut dyn RemoteApi) -> Result<bool, ClientError> {
        let accepted = remote.push_abstract(local)?;
        self.pending = 0;
        self.log.in_scope(|| tracing::debug!(accepted, "abstract pushed"));
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_forward_drift_is_expected() {
        assert!(!length_mismatch("abc", "abc", 1));
        assert!(!length_mismatch("abcd", "abc", 1));
        assert!(!length_mismatch("abcde", "abc", 1));
    }

    #[test]
    fn large_or_negative_drift_warns() {
        assert!(length_mismatch("abcdef", "abc", 1));
        assert!(length_mismatch("ab", "abc", 1));
        assert!(length_mismatch("", "a much longer remote abstract", 5));
    }
}
