//! Proposed-names table.

use skel_core::ProposedName;

use crate::workspace::Workspace;

/// Fill `current_name` on each row from the local workspace.
pub fn fill_current_names(rows: &mut [ProposedName], ws: &dyn Workspace) {
    for row in rows {
        row.current_name = ws.name(row.address);
    }
}
