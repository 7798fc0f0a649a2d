use super::tree::print_forest;
use crate::config::ConsoleConfiguration;
use crate::utils::files::{read_json, FileSnapshotSource, JsonRoleStore};
use anyhow::Result;
use authz::{
    build_tree, BuildMode, CheckState, NodeId, Principal, Role, RolePermissionEditor,
    RolePermissionView, SnapshotSequencer,
};
use colored::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::debug;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeState {
    id: NodeId,
    state: CheckState,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleOutput {
    role_id: i64,
    checked_keys: Vec<NodeId>,
    expanded_keys: BTreeSet<NodeId>,
    states: Vec<NodeState>,
    dirty: bool,
    saved: bool,
}

/// Options of one role editing session
pub struct RoleEdit {
    pub role: PathBuf,
    pub check: Vec<NodeId>,
    pub uncheck: Vec<NodeId>,
    pub granter: Option<PathBuf>,
    pub save: bool,
}

/// Run an editing session over a role's permission ids.
///
/// Checks are applied before unchecks. Nothing is written unless `save` is set.
pub async fn execute(
    config: &ConsoleConfiguration,
    snapshot: Option<PathBuf>,
    edit: RoleEdit,
    format: String,
) -> Result<()> {
    let snapshot = config.snapshot_or(snapshot)?;
    let role: Role = read_json(&edit.role)?;

    let source = FileSnapshotSource::new(snapshot).with_role(&edit.role);
    let sequencer = SnapshotSequencer::new();
    let records = sequencer.load(&source).await?.value;
    let stored = sequencer.load_role(&source, role.id).await?.value;
    let forest = build_tree(&records, BuildMode::PermissionEdit);

    // A granter only sees what they hold themselves. Stored ids outside that
    // view stay in the selection so a save does not revoke them.
    let tree = match &edit.granter {
        Some(path) => {
            let granter: Principal = read_json(path)?;
            let view = RolePermissionView::build(&forest, &granter.permissions, &role);
            debug!(
                "Granter sees {} of {} stored permissions",
                view.checked_keys.len(),
                stored.len()
            );
            view.tree
        }
        None => forest,
    };

    let mut editor = RolePermissionEditor::with_seed(&tree, role.id, stored);
    for id in edit.check {
        editor.check(id)?;
    }
    for id in edit.uncheck {
        editor.uncheck(id);
    }
    let dirty = editor.is_dirty();

    let saved = if edit.save {
        editor.save(&JsonRoleStore::new(&edit.role)).await?;
        true
    } else {
        false
    };

    let checked_keys = editor.selection().to_permission_ids();
    if format == "json" {
        let output = RoleOutput {
            role_id: role.id,
            expanded_keys: tree.with_ancestors(checked_keys.iter().copied()),
            checked_keys,
            states: tree
                .iter()
                .map(|n| NodeState {
                    id: n.id,
                    state: editor.state(n.id),
                })
                .collect(),
            dirty,
            saved,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "{}",
        format!("=== Role {} ({}) ===", role.name, role.code).bold()
    );
    println!();
    print_forest(&tree, |node| match editor.state(node.id) {
        CheckState::Checked => "[x] ".green().to_string(),
        CheckState::Indeterminate => "[-] ".yellow().to_string(),
        CheckState::Unchecked => "[ ] ".to_string(),
    });
    println!();
    let ids: Vec<String> = checked_keys.iter().map(|id| id.to_string()).collect();
    println!("{} {}", "Checked:".bold(), ids.join(", "));
    if saved {
        println!("{}", format!("Saved {} permissions", checked_keys.len()).green());
    } else if dirty {
        println!("{}", "Unsaved changes (pass --save to persist)".yellow());
    }

    Ok(())
}
