//! Checkbox-tree selection for the role permission editor.
//!
//! Only explicitly checked ids are stored. A parent is never added because
//! all of its children happen to be checked. Partial and full states are
//! derived from the stored set and the tree shape on every query.
//!
//! Disabled nodes sit outside the cascade. Checking never reaches a disabled
//! node or anything beneath it, and they do not count towards a parent's
//! derived state. Unchecking still clears them, so an operator can always
//! revoke a grant that points at a node disabled after the fact.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::{AuthzError, Result};
use crate::tree::PermissionForest;
use crate::types::NodeId;

/// Derived display state of one checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Checked,
    Indeterminate,
    Unchecked,
}

/// The checked-key set of one editor session over a forest.
#[derive(Debug, Clone)]
pub struct CheckboxSelection<'a> {
    forest: &'a PermissionForest,
    checked: BTreeSet<NodeId>,
}

impl<'a> CheckboxSelection<'a> {
    pub fn new(forest: &'a PermissionForest) -> Self {
        Self {
            forest,
            checked: BTreeSet::new(),
        }
    }

    /// Seeds the selection with a role's stored ids exactly as given, including
    /// ids of disabled nodes and ids the forest does not know.
    pub fn with_checked(
        forest: &'a PermissionForest,
        permission_ids: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        Self {
            forest,
            checked: permission_ids.into_iter().collect(),
        }
    }

    pub fn forest(&self) -> &'a PermissionForest {
        self.forest
    }

    pub fn checked_keys(&self) -> &BTreeSet<NodeId> {
        &self.checked
    }

    /// Checks `id` and every enabled descendant reachable through enabled
    /// nodes. Checking a disabled node does nothing.
    pub fn check(&mut self, id: NodeId) -> Result<()> {
        let slot = self.forest.slot(id).ok_or(AuthzError::UnknownNode(id))?;
        if !self.forest.node_at(slot).is_enabled() {
            debug!(id, "ignoring check on disabled node");
            return Ok(());
        }
        self.checked.insert(id);
        let cascade = self.enabled_descendants(slot);
        debug!(id, cascaded = cascade.len(), "node checked");
        self.checked.extend(cascade);
        Ok(())
    }

    /// Removes `id` and all of its descendants, disabled ones included.
    pub fn uncheck(&mut self, id: NodeId) {
        self.checked.remove(&id);
        for node in self.forest.descendants(id) {
            self.checked.remove(&node.id);
        }
    }

    pub fn is_checked(&self, id: NodeId) -> bool {
        self.checked.contains(&id)
    }

    /// True when `id` is unchecked and some, but not all, of its enabled
    /// descendants are checked.
    pub fn is_indeterminate(&self, id: NodeId) -> bool {
        if self.is_checked(id) {
            return false;
        }
        let (checked, total) = self.descendant_counts(id);
        checked > 0 && checked < total
    }

    /// A node shows as checked when stored as checked, or when it has enabled
    /// descendants and every one of them is checked.
    pub fn state(&self, id: NodeId) -> CheckState {
        if self.is_checked(id) {
            return CheckState::Checked;
        }
        match self.descendant_counts(id) {
            (_, 0) | (0, _) => CheckState::Unchecked,
            (checked, total) if checked == total => CheckState::Checked,
            _ => CheckState::Indeterminate,
        }
    }

    /// The ids to persist on the role. This is a full replacement set.
    pub fn to_permission_ids(&self) -> Vec<NodeId> {
        self.checked.iter().copied().collect()
    }

    fn descendant_counts(&self, id: NodeId) -> (usize, usize) {
        let Some(slot) = self.forest.slot(id) else {
            return (0, 0);
        };
        let cascade = self.enabled_descendants(slot);
        let checked = cascade.iter().filter(|d| self.checked.contains(d)).count();
        (checked, cascade.len())
    }

    fn enabled_descendants(&self, slot: usize) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.forest.child_slots(slot).to_vec();
        while let Some(idx) = stack.pop() {
            let node = self.forest.node_at(idx);
            if !node.is_enabled() {
                continue;
            }
            out.push(node.id);
            stack.extend_from_slice(self.forest.child_slots(idx));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{build_tree, BuildMode};
    use crate::types::PermissionNode;
    use crate::types::PermissionType::{Button, Catalog, Menu};

    /// 1 System
    /// ├── 2 Users
    /// │   ├── 4 Create
    /// │   └── 5 Delete (disabled)
    /// │       └── 7 Confirm
    /// └── 3 Roles
    ///     └── 6 Grant
    fn forest() -> PermissionForest {
        build_tree(
            &[
                PermissionNode::new(1, 0, "system", "System", Catalog),
                PermissionNode::new(2, 1, "menu:users", "Users", Menu).with_sort(1),
                PermissionNode::new(3, 1, "menu:roles", "Roles", Menu).with_sort(2),
                PermissionNode::new(4, 2, "user:create", "Create", Button),
                PermissionNode::new(5, 2, "user:delete", "Delete", Button).disabled(),
                PermissionNode::new(6, 3, "role:grant", "Grant", Button),
                PermissionNode::new(7, 5, "user:delete:confirm", "Confirm", Button),
            ],
            BuildMode::PermissionEdit,
        )
    }

    #[test]
    fn test_check_cascades_to_enabled_descendants() {
        let forest = forest();
        let mut selection = CheckboxSelection::new(&forest);
        selection.check(1).unwrap();
        assert_eq!(selection.to_permission_ids(), vec![1, 2, 3, 4, 6]);
        assert!(!selection.is_checked(5));
        assert!(!selection.is_checked(7));
    }

    #[test]
    fn test_check_does_not_check_parent() {
        let forest = forest();
        let mut selection = CheckboxSelection::new(&forest);
        selection.check(4).unwrap();
        assert!(!selection.is_checked(2));
        // 4 is the only enabled child of 2
        assert_eq!(selection.state(2), CheckState::Checked);
        assert!(!selection.is_indeterminate(2));
        assert!(selection.is_indeterminate(1));
    }

    #[test]
    fn test_check_disabled_node_is_noop() {
        let forest = forest();
        let mut selection = CheckboxSelection::new(&forest);
        selection.check(5).unwrap();
        assert!(selection.checked_keys().is_empty());
    }

    #[test]
    fn test_check_unknown_node_errors() {
        let forest = forest();
        let mut selection = CheckboxSelection::new(&forest);
        assert_eq!(selection.check(99), Err(AuthzError::UnknownNode(99)));
    }

    #[test]
    fn test_uncheck_removes_all_descendants() {
        let forest = forest();
        let mut selection = CheckboxSelection::with_checked(&forest, [1, 2, 4, 5, 7]);
        selection.uncheck(2);
        assert_eq!(selection.to_permission_ids(), vec![1]);
    }

    #[test]
    fn test_uncheck_unknown_seeded_id() {
        let forest = forest();
        let mut selection = CheckboxSelection::with_checked(&forest, [4, 404]);
        selection.uncheck(404);
        assert_eq!(selection.to_permission_ids(), vec![4]);
    }

    #[test]
    fn test_indeterminate() {
        let forest = forest();
        let mut selection = CheckboxSelection::new(&forest);
        selection.check(6).unwrap();
        assert!(selection.is_indeterminate(1));
        assert!(!selection.is_indeterminate(3));
        assert_eq!(selection.state(3), CheckState::Checked);
        assert!(!selection.is_indeterminate(2));
        assert_eq!(selection.state(2), CheckState::Unchecked);
        assert_eq!(selection.state(6), CheckState::Checked);
    }

    #[test]
    fn test_checked_node_is_never_indeterminate() {
        let forest = forest();
        let mut selection = CheckboxSelection::with_checked(&forest, [1]);
        selection.check(4).unwrap();
        assert!(selection.is_checked(1));
        assert!(!selection.is_indeterminate(1));
    }

    #[test]
    fn test_disabled_child_ignored_in_indeterminate() {
        let forest = forest();
        let selection = CheckboxSelection::with_checked(&forest, [5]);
        assert!(!selection.is_indeterminate(2));
        assert_eq!(selection.state(2), CheckState::Unchecked);
        assert_eq!(selection.state(5), CheckState::Checked);
    }

    #[test]
    fn test_seed_is_verbatim() {
        let forest = forest();
        let selection = CheckboxSelection::with_checked(&forest, [7, 5, 404]);
        assert_eq!(selection.to_permission_ids(), vec![5, 7, 404]);
    }

    #[test]
    fn test_leaf_state() {
        let forest = forest();
        let selection = CheckboxSelection::new(&forest);
        assert_eq!(selection.state(4), CheckState::Unchecked);
        assert_eq!(selection.state(404), CheckState::Unchecked);
        assert!(!selection.is_indeterminate(404));
    }

    #[test]
    fn test_round_trip_through_save() {
        let forest = forest();
        let mut selection = CheckboxSelection::new(&forest);
        selection.check(1).unwrap();
        selection.uncheck(3);
        selection.check(6).unwrap();
        selection.uncheck(4);

        let saved = selection.to_permission_ids();
        let reloaded = CheckboxSelection::with_checked(&forest, saved.clone());
        assert_eq!(reloaded.checked_keys(), selection.checked_keys());
        assert_eq!(reloaded.to_permission_ids(), saved);
    }
}
