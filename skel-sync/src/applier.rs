//! Writes remote annotations into the local workspace.
//!
//! Each decision (read current value, compare, maybe prompt, write) runs as
//! one task on the mutation thread, so nothing can change between the read
//! and the write.

use skel_core::{Address, Annotation, AnnotationKind, LogContext};

use crate::error::SyncError;
use crate::filter::is_default_local_name;
use crate::queue::MutationHandle;
use crate::workspace::Workspace;

/// What happened to one incoming annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The workspace was written.
    Applied,
    /// The workspace already held this value.
    Unchanged,
    /// The analyst refused the overwrite.
    Declined,
    /// Boilerplate; never reaches the workspace.
    Filtered,
}

/// How an incoming name relates to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameDecision {
    Unchanged,
    /// Current name is absent or generator-default.
    Overwrite,
    /// Current name is analyst-chosen and differs.
    Confirm,
}

pub fn decide_name(current: Option<&str>, incoming: &str) -> NameDecision {
    match current {
        Some(current) if current == incoming => NameDecision::Unchanged,
        None | Some("") => NameDecision::Overwrite,
        Some(current) if is_default_local_name(current) => NameDecision::Overwrite,
        Some(_) => NameDecision::Confirm,
    }
}

/// `true` when `incoming` matches neither the plain nor the repeatable
/// comment.
pub fn comment_differs(plain: Option<&str>, repeatable: Option<&str>, incoming: &str) -> bool {
    plain != Some(incoming) && repeatable != Some(incoming)
}

pub struct LocalApplier {
    mutations: MutationHandle,
    log: LogContext,
}

impl LocalApplier {
    pub fn new(mutations: MutationHandle, log: LogContext) -> Self {
        Self { mutations, log }
    }

    /// Apply one annotation. Errors only when the mutation thread is gone.
    pub fn apply(&self, annotation: &Annotation) -> Result<ApplyOutcome, SyncError> {
        let address = annotation.address;
        let payload = annotation.payload.clone();
        let outcome = match annotation.kind {
            AnnotationKind::Comment => self
                .mutations
                .execute_sync(move |ws| apply_comment(ws, address, &payload))?,
            AnnotationKind::Name => self
                .mutations
                .execute_sync(move |ws| apply_name(ws, address, &payload))?,
            AnnotationKind::Type => self
                .mutations
                .execute_sync(move |ws| apply_type(ws, address, &payload))?,
        };
        self.log.in_scope(|| {
            tracing::debug!(
                kind = %annotation.kind,
                address = %address,
                outcome = ?outcome,
                "remote annotation processed"
            )
        });
        Ok(outcome)
    }
}

fn apply_comment(ws: &mut dyn Workspace, address: Address, text: &str) -> ApplyOutcome {
    let plain = ws.comment(address);
    let repeatable = ws.repeatable_comment(address);
    if !comment_differs(plain.as_deref(), repeatable.as_deref(), text) {
        return ApplyOutcome::Unchanged;
    }
    ws.set_comment(address, text, true);
    ApplyOutcome::Applied
}

fn apply_name(ws: &mut dyn Workspace, address: Address, name: &str) -> ApplyOutcome {
    let current = ws.name(address);
    match decide_name(current.as_deref(), name) {
        NameDecision::Unchanged => ApplyOutcome::Unchanged,
        NameDecision::Overwrite => write_name(ws, address, name),
        NameDecision::Confirm => {
            let question = format!("Replace {} by {}", current.unwrap_or_default(), name);
            if ws.confirm(&question) {
                write_name(ws, address, name)
            } else {
                ApplyOutcome::Declined
            }
        }
    }
}

fn write_name(ws: &mut dyn Workspace, address: Address, name: &str) -> ApplyOutcome {
    if ws.set_name(address, name) {
        ApplyOutcome::Applied
    } else {
        tracing::warn!(address = %address, name, "workspace refused rename");
        ApplyOutcome::Unchanged
    }
}

fn apply_type(ws: &mut dyn Workspace, address: Address, type_string: &str) -> ApplyOutcome {
    if ws.type_string(address).as_deref() == Some(type_string) {
        return ApplyOutcome::Unchanged;
    }
    ws.set_type_string(address, type_string);
    ApplyOutcome::Applied
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, "ParseHeader", NameDecision::Overwrite)]
    #[case(Some(""), "ParseHeader", NameDecision::Overwrite)]
    #[case(Some("sub_4010A0"), "ParseHeader", NameDecision::Overwrite)]
    #[case(Some("loc_10"), "retry", NameDecision::Overwrite)]
    #[case(Some("ParseHeader"), "ParseHeader", NameDecision::Unchanged)]
    #[case(Some("parse_hdr"), "ParseHeader", NameDecision::Confirm)]
    fn name_decisions(
        #[case] current: Option<&str>,
        #[case] incoming: &str,
        #[case] expected: NameDecision,
    ) {
        assert_eq!(decide_name(current, incoming), expected);
    }

    #[test]
    fn comment_equal_to_either_slot_is_unchanged() {
        assert!(!comment_differs(Some("a"), None, "a"));
        assert!(!comment_differs(None, Some("a"), "a"));
        assert!(comment_differs(Some("a"), Some("b"), "c"));
        assert!(comment_differs(None, None, "c"));
    }
}
