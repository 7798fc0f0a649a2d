//! Permission tree and authorization core for the admin console.
//!
//! This crate turns a flat snapshot of permission/menu records into ordered
//! trees, runs the checkbox selection used to edit a role's permissions, and
//! decides what a signed-in principal may see and reach.
//!
//! # Architecture Overview
//!
//! The flow follows this pattern:
//!
//! 1. **Snapshot arrives** from a [`SnapshotSource`], stamped with a
//!    generation by the [`SnapshotSequencer`] so stale fetches are dropped
//! 2. **Tree Builder** ([`build_tree`]) produces a [`PermissionForest`] for
//!    either menu rendering or permission editing
//! 3. **Authorization Resolver** ([`has_permission`], [`visible_menu`],
//!    [`allowed_path_prefixes`]) narrows the forest to the principal
//! 4. **Route Guard** ([`RouteGuard`]) allows, redirects or shows an empty
//!    state for the requested route
//! 5. **Role editing** goes through a [`CheckboxSelection`] owned by a
//!    [`RolePermissionEditor`] and is saved in one full replace
//!
//! Everything except the snapshot fetch and the save is synchronous and pure.
//!
//! # Permission codes
//!
//! Codes are opaque strings such as `menu:user:list` or `user:delete`. The
//! code `*:*:*` is a wildcard that satisfies any requirement in
//! [`has_permission`]. The catalog-aware [`Authorizer`] additionally refuses
//! codes that no node in the snapshot carries.

pub mod editor;
pub mod error;
pub mod guard;
pub mod paths;
pub mod resolver;
pub mod selection;
pub mod snapshot;
pub mod tree;
pub mod types;

pub use editor::{RolePermissionEditor, RolePermissionStore};
pub use error::{AuthzError, Result};
pub use guard::{is_route_allowed, GuardDecision, GuardState, Navigator, RouteGuard};
pub use paths::{active_entry, allowed_path_prefixes, breadcrumb, AllowedPaths, MenuView};
pub use resolver::{
    authorize, grantable_tree, has_permission, has_role, visible_menu, Authorizer, Decision,
    DenyReason, MatchMode, PermissionCatalog, Requirement, RolePermissionView,
};
pub use selection::{CheckState, CheckboxSelection};
pub use snapshot::{parse_snapshot, Generation, Loaded, SnapshotSequencer, SnapshotSource};
pub use tree::{build_tree, BuildMode, PermissionForest, TreeNode};
pub use types::{
    NodeId, PermissionNode, PermissionSet, PermissionType, Principal, Role, RoleCreate,
    RoleUpdate, WILDCARD_PERMISSION,
};
