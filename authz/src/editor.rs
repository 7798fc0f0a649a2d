//! One role's permission editing session.
//!
//! Edits stay in memory until [`RolePermissionEditor::save`] is called, which
//! writes the whole checked set in a single full replace. A failed save leaves
//! the session exactly as it was so the operator can retry.

use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::error::{AuthzError, Result};
use crate::selection::{CheckState, CheckboxSelection};
use crate::tree::PermissionForest;
use crate::types::{NodeId, Role};

/// Persists role permission sets.
#[async_trait]
pub trait RolePermissionStore: Send + Sync {
    /// Replaces the role's permission ids with `permission_ids`.
    async fn save_role_permissions(&self, role_id: i64, permission_ids: &[NodeId]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct RolePermissionEditor<'a> {
    role_id: i64,
    seeded: BTreeSet<NodeId>,
    selection: CheckboxSelection<'a>,
}

impl<'a> RolePermissionEditor<'a> {
    /// Opens a session over `forest`, seeded with the role's stored ids.
    pub fn new(forest: &'a PermissionForest, role: &Role) -> Self {
        Self::with_seed(forest, role.id, role.permission_ids.iter().copied())
    }

    pub fn with_seed(
        forest: &'a PermissionForest,
        role_id: i64,
        permission_ids: impl IntoIterator<Item = NodeId>,
    ) -> Self {
        let selection = CheckboxSelection::with_checked(forest, permission_ids);
        Self {
            role_id,
            seeded: selection.checked_keys().clone(),
            selection,
        }
    }

    pub fn role_id(&self) -> i64 {
        self.role_id
    }

    pub fn selection(&self) -> &CheckboxSelection<'a> {
        &self.selection
    }

    pub fn check(&mut self, id: NodeId) -> Result<()> {
        self.selection.check(id)
    }

    pub fn uncheck(&mut self, id: NodeId) {
        self.selection.uncheck(id)
    }

    pub fn state(&self, id: NodeId) -> CheckState {
        self.selection.state(id)
    }

    /// True when the checked set differs from what was last loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.selection.checked_keys() != &self.seeded
    }

    /// Throws away unsaved edits.
    pub fn revert(&mut self) {
        self.selection =
            CheckboxSelection::with_checked(self.selection.forest(), self.seeded.iter().copied());
    }

    /// Saves the checked set as the role's full permission list.
    ///
    /// Any store failure comes back as [`AuthzError::SaveConflict`].
    pub async fn save<S>(&mut self, store: &S) -> Result<Vec<NodeId>>
    where
        S: RolePermissionStore + ?Sized,
    {
        let ids = self.selection.to_permission_ids();
        match store.save_role_permissions(self.role_id, &ids).await {
            Ok(()) => {
                info!("Saved {} permissions for role {}", ids.len(), self.role_id);
                self.seeded = ids.iter().copied().collect();
                Ok(ids)
            }
            Err(e) => {
                warn!("Saving permissions for role {} failed: {}", self.role_id, e);
                Err(match e {
                    conflict @ AuthzError::SaveConflict { .. } => conflict,
                    other => AuthzError::SaveConflict {
                        role_id: self.role_id,
                        reason: other.to_string(),
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{build_tree, BuildMode};
    use crate::types::PermissionNode;
    use crate::types::PermissionType::{Button, Catalog, Menu};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Vec<(i64, Vec<NodeId>)>>,
    }

    #[async_trait]
    impl RolePermissionStore for MemoryStore {
        async fn save_role_permissions(&self, role_id: i64, permission_ids: &[NodeId]) -> Result<()> {
            self.saved
                .lock()
                .unwrap()
                .push((role_id, permission_ids.to_vec()));
            Ok(())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl RolePermissionStore for FailingStore {
        async fn save_role_permissions(&self, _role_id: i64, _ids: &[NodeId]) -> Result<()> {
            Err(AuthzError::Source("connection reset".into()))
        }
    }

    fn forest() -> PermissionForest {
        build_tree(
            &[
                PermissionNode::new(1, 0, "system", "System", Catalog),
                PermissionNode::new(2, 1, "menu:users", "Users", Menu),
                PermissionNode::new(3, 2, "user:create", "Create", Button),
                PermissionNode::new(4, 2, "user:delete", "Delete", Button),
            ],
            BuildMode::PermissionEdit,
        )
    }

    fn role() -> Role {
        Role {
            id: 7,
            code: "auditor".into(),
            name: "Auditor".into(),
            description: None,
            status: true,
            permission_ids: [2, 3].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn test_save_full_replace() {
        let forest = forest();
        let store = MemoryStore::default();
        let mut editor = RolePermissionEditor::new(&forest, &role());
        assert!(!editor.is_dirty());

        editor.check(4).unwrap();
        editor.uncheck(3);
        assert!(editor.is_dirty());

        let saved = editor.save(&store).await.unwrap();
        assert_eq!(saved, vec![2, 4]);
        assert_eq!(*store.saved.lock().unwrap(), vec![(7, vec![2, 4])]);
        assert!(!editor.is_dirty());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_state() {
        let forest = forest();
        let mut editor = RolePermissionEditor::new(&forest, &role());
        editor.check(1).unwrap();
        let before = editor.selection().checked_keys().clone();

        let err = editor.save(&FailingStore).await.unwrap_err();
        assert_eq!(
            err,
            AuthzError::SaveConflict {
                role_id: 7,
                reason: "Snapshot source failed: connection reset".into()
            }
        );
        assert_eq!(editor.selection().checked_keys(), &before);
        assert!(editor.is_dirty());

        // Retry against a working store without redoing edits.
        let store = MemoryStore::default();
        assert_eq!(editor.save(&store).await.unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_revert() {
        let forest = forest();
        let mut editor = RolePermissionEditor::new(&forest, &role());
        editor.uncheck(2);
        assert_eq!(editor.state(2), CheckState::Unchecked);
        editor.revert();
        assert!(!editor.is_dirty());
        assert_eq!(editor.state(2), CheckState::Checked);
    }
}
