//! Core data model shared by the tree builder, the selection engine and the
//! authorization resolver.
//!
//! Records arrive flat from a server snapshot. Each carries its own id, its
//! parent's id and an ordering key, and nothing else about the structure.
//! Hierarchy only exists once [`build_tree`](crate::tree::build_tree) has
//! indexed the records into a [`PermissionForest`](crate::tree::PermissionForest).
//!
//! The server side stores `visible`/`status` as `1`/`0`, while newer payloads
//! use booleans. Both forms are accepted on input, and output is always boolean.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{AuthzError, Result};

/// Identifier of a permission node.
pub type NodeId = i64;

/// The super-permission that satisfies every requirement.
pub const WILDCARD_PERMISSION: &str = "*:*:*";

/// Kind of a permission node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PermissionType {
    /// A navigable page. Only menus carry meaningful routing metadata.
    Menu,
    /// An action inside a page. Never rendered as a menu entry.
    Button,
    /// A backend endpoint guard.
    Api,
    /// A non-actionable grouping node that hosts other nodes.
    Catalog,
}

impl PermissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionType::Menu => "MENU",
            PermissionType::Button => "BUTTON",
            PermissionType::Api => "API",
            PermissionType::Catalog => "CATALOG",
        }
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionType {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "menu" => Ok(PermissionType::Menu),
            "button" => Ok(PermissionType::Button),
            "api" => Ok(PermissionType::Api),
            "catalog" => Ok(PermissionType::Catalog),
            other => Err(AuthzError::InvalidRecord(format!(
                "unsupported permission type: {}",
                other
            ))),
        }
    }
}

impl TryFrom<String> for PermissionType {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PermissionType> for String {
    fn from(value: PermissionType) -> Self {
        value.as_str().to_string()
    }
}

/// A single permission/menu record as delivered by the snapshot source.
///
/// The same shape is used for the arena nodes inside a built forest. The
/// `children` of the nested tree model live in the forest's adjacency lists,
/// and [`TreeNode`](crate::tree::TreeNode) re-nests them for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionNode {
    pub id: NodeId,

    /// Parent id. `None` or `0` means the node hangs off the synthetic root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,

    /// Authorization token, e.g. `menu:user:list`.
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub kind: PermissionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Opaque icon identifier, resolved by the presentation layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,

    #[serde(default)]
    pub sort: i32,

    #[serde(default = "enabled", deserialize_with = "deserialize_flag")]
    pub visible: bool,

    /// Enabled when true.
    #[serde(default = "enabled", deserialize_with = "deserialize_flag")]
    pub status: bool,
}

impl PermissionNode {
    pub fn new(
        id: NodeId,
        parent_id: NodeId,
        code: impl Into<String>,
        name: impl Into<String>,
        kind: PermissionType,
    ) -> Self {
        Self {
            id,
            parent_id: Some(parent_id),
            code: code.into(),
            name: name.into(),
            kind,
            path: None,
            method: None,
            icon: None,
            component: None,
            sort: 0,
            visible: true,
            status: true,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_sort(mut self, sort: i32) -> Self {
        self.sort = sort;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.status = false;
        self
    }

    /// The parent id if the record names a real parent.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent_id.filter(|p| *p != 0)
    }

    pub fn is_enabled(&self) -> bool {
        self.status
    }

    pub fn is_catalog(&self) -> bool {
        self.kind == PermissionType::Catalog
    }

    /// Checks the fields every record must carry regardless of type.
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(AuthzError::InvalidRecord(format!(
                "node {} has an empty code",
                self.id
            )));
        }
        if self.name.trim().is_empty() {
            return Err(AuthzError::InvalidRecord(format!(
                "node {} has an empty name",
                self.id
            )));
        }
        Ok(())
    }
}

fn enabled() -> bool {
    true
}

/// Accepts `true`/`false` as well as the numeric `1`/`0` flags.
pub(crate) fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

/// A principal's resolved set of permission codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    /// True when the set holds the `*:*:*` super-permission.
    pub fn is_wildcard(&self) -> bool {
        self.0.contains(WILDCARD_PERMISSION)
    }

    pub fn insert(&mut self, code: impl Into<String>) -> bool {
        self.0.insert(code.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// The signed-in user as seen by the console, supplied by the session layer.
///
/// The permission set is already flattened across roles. The core never
/// aggregates roles itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: i64,

    pub username: String,

    /// Carried through to collaborators untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<i64>,

    #[serde(default)]
    pub roles: BTreeSet<String>,

    #[serde(default)]
    pub permissions: PermissionSet,
}

impl Principal {
    pub fn new(user_id: i64, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            tenant_id: None,
            roles: BTreeSet::new(),
            permissions: PermissionSet::new(),
        }
    }

    pub fn with_permissions<S: Into<String>>(mut self, codes: impl IntoIterator<Item = S>) -> Self {
        self.permissions = codes.into_iter().collect();
        self
    }

    pub fn with_roles<S: Into<String>>(mut self, roles: impl IntoIterator<Item = S>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }
}

/// A role and the permission node ids granted to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: i64,
    /// Immutable after creation.
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "enabled", deserialize_with = "deserialize_flag")]
    pub status: bool,
    #[serde(default)]
    pub permission_ids: BTreeSet<NodeId>,
}

/// Create role payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCreate {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "enabled", deserialize_with = "deserialize_flag")]
    pub status: bool,
    #[serde(default)]
    pub permission_ids: Vec<NodeId>,
}

/// Update role payload. There is deliberately no `code` field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<bool>,
}

impl Role {
    /// Builds a role from a create payload and the id assigned by storage.
    pub fn create(id: i64, request: RoleCreate) -> Result<Self> {
        if request.code.trim().is_empty() {
            return Err(AuthzError::InvalidRecord("role code cannot be empty".into()));
        }
        Ok(Self {
            id,
            code: request.code,
            name: request.name,
            description: request.description,
            status: request.status,
            permission_ids: request.permission_ids.into_iter().collect(),
        })
    }

    pub fn apply_update(&mut self, update: RoleUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
    }

    /// Replaces the granted set wholesale.
    pub fn replace_permissions(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.permission_ids = ids.into_iter().collect();
    }
}
