//! Authorization Resolver.
//!
//! Answers two kinds of questions against a principal's flattened permission
//! set: "may this principal do X" ([`has_permission`], [`Authorizer`]) and
//! "which part of this tree may the principal see" ([`visible_menu`],
//! [`grantable_tree`]).
//!
//! An empty requirement always authorizes, and `*:*:*` satisfies any
//! requirement. Codes are compared verbatim. There is no segment-level
//! wildcard matching.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::error::{AuthzError, Result};
use crate::tree::{PermissionForest, TreeNode};
use crate::types::{NodeId, PermissionNode, PermissionSet, Principal, Role};

/// How a multi-code requirement combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// At least one code must be held.
    #[default]
    Any,
    /// Every code must be held.
    All,
}

/// A set of required codes and how they combine.
///
/// Blank codes are dropped on construction, so a requirement built from `""`
/// is empty and authorizes everyone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Requirement {
    codes: Vec<String>,
    mode: MatchMode,
}

impl Requirement {
    pub fn any<S: Into<String>>(codes: impl IntoIterator<Item = S>) -> Self {
        Self::with_mode(codes, MatchMode::Any)
    }

    pub fn all<S: Into<String>>(codes: impl IntoIterator<Item = S>) -> Self {
        Self::with_mode(codes, MatchMode::All)
    }

    pub fn with_mode<S: Into<String>>(codes: impl IntoIterator<Item = S>, mode: MatchMode) -> Self {
        Self {
            codes: codes
                .into_iter()
                .map(Into::into)
                .filter(|c: &String| !c.trim().is_empty())
                .collect(),
            mode,
        }
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    fn satisfied_by(&self, held: impl Fn(&str) -> bool) -> bool {
        if self.codes.is_empty() {
            return true;
        }
        match self.mode {
            MatchMode::Any => self.codes.iter().any(|c| held(c)),
            MatchMode::All => self.codes.iter().all(|c| held(c)),
        }
    }
}

impl From<&str> for Requirement {
    fn from(code: &str) -> Self {
        Requirement::any([code])
    }
}

impl From<String> for Requirement {
    fn from(code: String) -> Self {
        Requirement::any([code])
    }
}

impl From<&String> for Requirement {
    fn from(code: &String) -> Self {
        Requirement::any([code.as_str()])
    }
}

impl From<&[&str]> for Requirement {
    fn from(codes: &[&str]) -> Self {
        Requirement::any(codes.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Requirement {
    fn from(codes: [&str; N]) -> Self {
        Requirement::any(codes)
    }
}

impl From<Vec<String>> for Requirement {
    fn from(codes: Vec<String>) -> Self {
        Requirement::any(codes)
    }
}

impl From<Vec<&str>> for Requirement {
    fn from(codes: Vec<&str>) -> Self {
        Requirement::any(codes)
    }
}

/// Decides whether `permissions` satisfies `required`.
///
/// A bare code or list of codes means "any of".
pub fn has_permission(permissions: &PermissionSet, required: impl Into<Requirement>) -> bool {
    authorize(permissions, &required.into())
}

/// Decides a requirement, honouring its [`MatchMode`].
pub fn authorize(permissions: &PermissionSet, requirement: &Requirement) -> bool {
    if requirement.is_empty() || permissions.is_wildcard() {
        return true;
    }
    requirement.satisfied_by(|code| permissions.contains(code))
}

/// Role-code check with the same any/all semantics. Roles have no wildcard.
pub fn has_role(roles: &BTreeSet<String>, required: impl Into<Requirement>) -> bool {
    required.into().satisfied_by(|code| roles.contains(code))
}

/// Every permission code known to a snapshot.
#[derive(Debug, Clone, Default)]
pub struct PermissionCatalog {
    codes: HashSet<String>,
}

impl PermissionCatalog {
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a PermissionNode>) -> Self {
        Self {
            codes: nodes
                .into_iter()
                .filter(|n| !n.code.is_empty())
                .map(|n| n.code.clone())
                .collect(),
        }
    }

    pub fn from_forest(forest: &PermissionForest) -> Self {
        Self::from_nodes(forest.iter())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Fails with the first required code the catalog does not know.
    pub fn validate(&self, requirement: &Requirement) -> Result<()> {
        match requirement.codes().iter().find(|c| !self.contains(c)) {
            Some(code) => Err(AuthzError::UnknownPermissionCode(code.clone())),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "reason", content = "code")]
pub enum DenyReason {
    /// The principal does not hold the required codes.
    Missing,
    /// The requirement names a code the catalog has never heard of.
    UnknownCode(String),
}

/// Outcome of a catalog-aware authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "decision", content = "detail")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Authorization against a known catalog.
///
/// Unlike [`has_permission`], an unknown required code can never be satisfied,
/// not even by the wildcard. In "any" mode unknown codes are discarded and the
/// rest are decided normally. In "all" mode a single unknown code denies.
#[derive(Debug, Clone, Default)]
pub struct Authorizer {
    catalog: PermissionCatalog,
}

impl Authorizer {
    pub fn new(catalog: PermissionCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    pub fn authorize(&self, permissions: &PermissionSet, requirement: &Requirement) -> Decision {
        if requirement.is_empty() {
            return Decision::Allow;
        }

        let (known, unknown): (Vec<&String>, Vec<&String>) = requirement
            .codes()
            .iter()
            .partition(|c| self.catalog.contains(c));

        if let Some(first_unknown) = unknown.first() {
            debug!(code = %first_unknown, "requirement names an unknown permission code");
            if requirement.mode() == MatchMode::All || known.is_empty() {
                return Decision::Deny(DenyReason::UnknownCode((*first_unknown).clone()));
            }
        }

        let narrowed = Requirement::with_mode(known.into_iter().cloned(), requirement.mode());
        if authorize(permissions, &narrowed) {
            Decision::Allow
        } else {
            debug!(codes = ?requirement.codes(), "permission denied");
            Decision::Deny(DenyReason::Missing)
        }
    }

    pub fn authorize_principal(&self, principal: &Principal, requirement: &Requirement) -> Decision {
        self.authorize(&principal.permissions, requirement)
    }
}

/// The part of a menu forest the principal may see.
///
/// A catalog survives only when a descendant survives. Any other node survives
/// only when its own code is authorized, and takes its subtree with it when it
/// is not, so no unauthorized path reaches the allowed prefixes. Builder
/// ordering is preserved.
pub fn visible_menu(forest: &PermissionForest, permissions: &PermissionSet) -> PermissionForest {
    forest.prune(|node, has_children| {
        if node.is_catalog() {
            has_children
        } else {
            has_permission(permissions, node.code.as_str())
        }
    })
}

/// The part of a permission tree a granter may hand out to a role.
///
/// A node is kept when the granter holds its code, whatever its type, or when
/// any descendant is kept.
pub fn grantable_tree(forest: &PermissionForest, granter: &PermissionSet) -> PermissionForest {
    if granter.is_wildcard() {
        return forest.clone();
    }
    forest.prune(|node, has_children| has_children || granter.contains(&node.code))
}

/// What the role editor is shown: the grantable tree and the role's stored
/// ids that fall inside it.
#[derive(Debug, Clone)]
pub struct RolePermissionView {
    pub tree: PermissionForest,
    pub checked_keys: Vec<NodeId>,
}

impl RolePermissionView {
    pub fn build(forest: &PermissionForest, granter: &PermissionSet, role: &Role) -> Self {
        let tree = grantable_tree(forest, granter);
        let checked_keys = role
            .permission_ids
            .iter()
            .copied()
            .filter(|id| tree.contains(*id))
            .collect();
        Self { tree, checked_keys }
    }

    pub fn to_tree(&self) -> Vec<TreeNode> {
        self.tree.to_tree()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{build_tree, BuildMode};
    use crate::types::PermissionType::{Button, Catalog, Menu};
    use crate::types::WILDCARD_PERMISSION;

    fn perms(codes: &[&str]) -> PermissionSet {
        codes.iter().copied().collect()
    }

    fn ids(forest: &PermissionForest) -> Vec<NodeId> {
        forest.iter().map(|n| n.id).collect()
    }

    fn menu() -> PermissionForest {
        build_tree(
            &[
                PermissionNode::new(1, 0, "system", "System", Catalog),
                PermissionNode::new(2, 1, "menu:users", "Users", Menu)
                    .with_path("/users")
                    .with_sort(1),
                PermissionNode::new(3, 1, "menu:roles", "Roles", Menu)
                    .with_path("/roles")
                    .with_sort(2),
                PermissionNode::new(4, 3, "menu:roles:detail", "Role detail", Menu)
                    .with_path("/roles/detail"),
                PermissionNode::new(5, 0, "audit", "Audit", Catalog),
                PermissionNode::new(6, 5, "menu:logs", "Logs", Menu).with_path("/logs"),
            ],
            BuildMode::MenuRender,
        )
    }

    #[test]
    fn test_empty_requirement_always_authorizes() {
        assert!(has_permission(&PermissionSet::new(), Vec::<String>::new()));
        assert!(has_permission(&perms(&["a:b:c"]), Vec::<String>::new()));
        assert!(has_permission(&PermissionSet::new(), ""));
    }

    #[test]
    fn test_wildcard_authorizes_anything() {
        assert!(has_permission(&perms(&[WILDCARD_PERMISSION]), "anything:not:granted"));
        assert!(authorize(
            &perms(&[WILDCARD_PERMISSION]),
            &Requirement::all(["x", "y"])
        ));
    }

    #[test]
    fn test_any_of() {
        assert!(!has_permission(&perms(&["a:b:c"]), "x:y:z"));
        assert!(has_permission(&perms(&["a:b:c"]), ["x:y:z", "a:b:c"]));
        assert!(!has_permission(&PermissionSet::new(), "a:b:c"));
    }

    #[test]
    fn test_all_of() {
        let held = perms(&["a", "b"]);
        assert!(authorize(&held, &Requirement::all(["a", "b"])));
        assert!(!authorize(&held, &Requirement::all(["a", "c"])));
    }

    #[test]
    fn test_has_role() {
        let roles: BTreeSet<String> = ["admin".to_string(), "ops".to_string()].into();
        assert!(has_role(&roles, "ops"));
        assert!(has_role(&roles, ["auditor", "admin"]));
        assert!(!has_role(&roles, Requirement::all(["admin", "auditor"])));
        assert!(has_role(&BTreeSet::new(), Vec::<String>::new()));
        assert!(!has_role(&roles, WILDCARD_PERMISSION));
    }

    #[test]
    fn test_authorizer_denies_unknown_codes_even_for_wildcard() {
        let authorizer = Authorizer::new(PermissionCatalog::from_forest(&menu()));
        let decision = authorizer.authorize(
            &perms(&[WILDCARD_PERMISSION]),
            &Requirement::from("menu:ghost"),
        );
        assert_eq!(
            decision,
            Decision::Deny(DenyReason::UnknownCode("menu:ghost".into()))
        );
    }

    #[test]
    fn test_catalog_validate_names_unknown_code() {
        let catalog = PermissionCatalog::from_forest(&menu());
        assert!(catalog.validate(&Requirement::any(["menu:users", "menu:logs"])).is_ok());
        assert!(catalog.validate(&Requirement::default()).is_ok());
        assert_eq!(
            catalog.validate(&Requirement::all(["menu:users", "menu:ghost"])),
            Err(AuthzError::UnknownPermissionCode("menu:ghost".into()))
        );
    }

    #[test]
    fn test_authorizer_any_mode_skips_unknown() {
        let authorizer = Authorizer::new(PermissionCatalog::from_forest(&menu()));
        let req = Requirement::any(["menu:ghost", "menu:users"]);
        assert!(authorizer.authorize(&perms(&["menu:users"]), &req).is_allowed());
        assert_eq!(
            authorizer.authorize(&perms(&["menu:roles"]), &req),
            Decision::Deny(DenyReason::Missing)
        );
    }

    #[test]
    fn test_authorizer_all_mode_unknown_denies() {
        let authorizer = Authorizer::new(PermissionCatalog::from_forest(&menu()));
        let req = Requirement::all(["menu:users", "menu:ghost"]);
        assert!(!authorizer
            .authorize(&perms(&["menu:users", "menu:ghost"]), &req)
            .is_allowed());
    }

    #[test]
    fn test_authorizer_principal() {
        let authorizer = Authorizer::new(PermissionCatalog::from_forest(&menu()));
        let principal = Principal::new(1, "ops").with_permissions(["menu:logs"]);
        assert!(authorizer
            .authorize_principal(&principal, &Requirement::from("menu:logs"))
            .is_allowed());
        assert!(authorizer
            .authorize_principal(&principal, &Requirement::default())
            .is_allowed());
    }

    #[test]
    fn test_visible_menu_prunes_catalogs() {
        let visible = visible_menu(&menu(), &perms(&["menu:users"]));
        assert_eq!(ids(&visible), vec![1, 2]);
    }

    #[test]
    fn test_visible_menu_drops_unauthorized_parent_menu() {
        let visible = visible_menu(&menu(), &perms(&["menu:roles:detail"]));
        assert!(visible.is_empty());

        let allowed = crate::paths::allowed_path_prefixes(&visible);
        assert!(!allowed.covers("/roles/42"));
        assert!(!allowed.covers("/roles/detail"));
    }

    #[test]
    fn test_visible_menu_nested_menu_needs_both_codes() {
        let visible = visible_menu(&menu(), &perms(&["menu:roles", "menu:roles:detail"]));
        assert_eq!(ids(&visible), vec![1, 3, 4]);

        let visible = visible_menu(&menu(), &perms(&["menu:roles"]));
        assert_eq!(ids(&visible), vec![1, 3]);
    }

    #[test]
    fn test_visible_menu_wildcard_keeps_order() {
        let visible = visible_menu(&menu(), &perms(&[WILDCARD_PERMISSION]));
        assert_eq!(ids(&visible), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_visible_menu_catalog_code_alone_is_not_enough() {
        let visible = visible_menu(&menu(), &perms(&["audit"]));
        assert!(visible.is_empty());
    }

    #[test]
    fn test_grantable_tree() {
        let forest = build_tree(
            &[
                PermissionNode::new(1, 0, "system", "System", Catalog),
                PermissionNode::new(2, 1, "menu:users", "Users", Menu),
                PermissionNode::new(3, 2, "user:delete", "Delete", Button),
                PermissionNode::new(4, 1, "menu:roles", "Roles", Menu),
            ],
            BuildMode::PermissionEdit,
        );
        let grantable = grantable_tree(&forest, &perms(&["user:delete", "menu:users"]));
        assert_eq!(ids(&grantable), vec![1, 2, 3]);

        let all = grantable_tree(&forest, &perms(&[WILDCARD_PERMISSION]));
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_role_permission_view_filters_checked_keys() {
        let forest = build_tree(
            &[
                PermissionNode::new(1, 0, "menu:users", "Users", Menu),
                PermissionNode::new(2, 0, "menu:roles", "Roles", Menu),
            ],
            BuildMode::PermissionEdit,
        );
        let role: Role = serde_json::from_str(
            r#"{"id":1,"code":"ops","name":"Ops","permissionIds":[1,2,77]}"#,
        )
        .unwrap();
        let view = RolePermissionView::build(&forest, &perms(&["menu:users"]), &role);
        assert_eq!(view.checked_keys, vec![1]);
        assert_eq!(view.to_tree().len(), 1);
    }
}
