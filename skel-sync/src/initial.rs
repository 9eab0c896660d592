//! One-time push of annotations that existed before the session started.

use skel_client::{ClientError, RemoteApi};
use skel_core::{Address, LogContext};

use crate::filter::{is_boilerplate_comment, is_boilerplate_function_name};
use crate::workspace::Workspace;

pub const NAMES_QUESTION: &str = "Do you want to synchronize defined names?";
pub const COMMENTS_QUESTION: &str = "Do you want to synchronize defined comments?";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitialSyncReport {
    pub pushed: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl InitialSyncReport {
    pub fn merge(self, other: Self) -> Self {
        Self {
            pushed: self.pushed + other.pushed,
            rejected: self.rejected + other.rejected,
            skipped: self.skipped + other.skipped,
            failed: self.failed + other.failed,
        }
    }
}

/// Plain and repeatable comment joined by a space, boilerplate parts
/// dropped. `None` when nothing is left.
pub fn combined_comment(plain: Option<&str>, repeatable: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [plain, repeatable]
        .into_iter()
        .flatten()
        .filter(|c| !is_boilerplate_comment(c))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// A name is worth pushing when it is not boilerplate and carries a
/// non-string type.
fn wants_name(name: &str, type_string: Option<&str>) -> bool {
    match type_string {
        Some(ty) => !is_boilerplate_function_name(name) && !ty.starts_with("char["),
        None => false,
    }
}

/// Push every analyst-defined name.
pub fn push_existing_names(ws: &dyn Workspace, remote: &mut dyn RemoteApi, log: &LogContext) -> InitialSyncReport {
    let mut report = InitialSyncReport::default();
    let span = log.span().clone();
    let _entered = span.enter();
    for (address, name) in ws.names() {
        if !wants_name(&name, ws.type_string(address).as_deref()) {
            report.skipped += 1;
            continue;
        }
        if !push(&mut report, address, remote.push_name(address, &name)) {
            break;
        }
    }
    tracing::info!(pushed = report.pushed, skipped = report.skipped, failed = report.failed, "existing names pushed");
    report
}

/// Push every non-boilerplate comment, plain and repeatable combined.
pub fn push_existing_comments(ws: &dyn Workspace, remote: &mut dyn RemoteApi, log: &LogContext) -> InitialSyncReport {
    let mut report = InitialSyncReport::default();
    let span = log.span().clone();
    let _entered = span.enter();
    for address in ws.heads() {
        let plain = ws.comment(address);
        let repeatable = ws.repeatable_comment(address);
        if plain.is_none() && repeatable.is_none() {
            continue;
        }
        let Some(text) = combined_comment(plain.as_deref(), repeatable.as_deref()) else {
            report.skipped += 1;
            continue;
        };
        if !push(&mut report, address, remote.push_comment(address, &text)) {
            break;
        }
    }
    tracing::info!(pushed = report.pushed, skipped = report.skipped, failed = report.failed, "existing comments pushed");
    report
}

/// Count one push. Returns `false` when the walk should stop.
fn push(report: &mut InitialSyncReport, address: Address, result: Result<bool, ClientError>) -> bool {
    match result {
        Ok(true) => report.pushed += 1,
        Ok(false) => report.rejected += 1,
        Err(ClientError::NotOnline) => {
            tracing::error!("session went offline, initial sync aborted");
            report.failed += 1;
            return false;
        }
        Err(err) => {
            tracing::error!(address = %address, error = %err, "initial push failed");
            report.failed += 1;
        }
    }
    true
}

/// Ask the analyst, then push names and/or comments.
pub fn run_initial_sync(ws: &mut dyn Workspace, remote: &mut dyn RemoteApi, log: &LogContext) -> InitialSyncReport {
    let mut report = InitialSyncReport::default();
    if ws.confirm(NAMES_QUESTION) {
        report = report.merge(push_existing_names(ws, remote, log));
    }
    if ws.confirm(COMMENTS_QUESTION) {
        report = report.merge(push_existing_comments(ws, remote, log));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_comment_drops_boilerplate_parts() {
        assert_eq!(combined_comment(Some("xor loop"), Some("key schedule")).as_deref(), Some("xor loop key schedule"));
        assert_eq!(combined_comment(Some("int a"), Some("key schedule")).as_deref(), Some("key schedule"));
        assert_eq!(combined_comment(Some("xor loop"), None).as_deref(), Some("xor loop"));
        assert_eq!(combined_comment(Some("int a"), Some("switch jump")), None);
        assert_eq!(combined_comment(None, None), None);
    }

    #[test]
    fn names_need_a_non_string_type() {
        assert!(wants_name("decrypt", Some("int __cdecl(int)")));
        assert!(!wants_name("decrypt", None));
        assert!(!wants_name("aHelloWorld", Some("char[12]")));
        assert!(!wants_name("j_free", Some("void __cdecl(void *)")));
    }
}
