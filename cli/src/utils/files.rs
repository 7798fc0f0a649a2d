use anyhow::{Context, Result};
use async_trait::async_trait;
use authz::{AuthzError, NodeId, PermissionNode, Role, RolePermissionStore, SnapshotSource};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

async fn read_role(path: &Path) -> authz::Result<Role> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AuthzError::Source(format!("{}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&content)?)
}

/// Snapshot and role data served from local JSON files
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    snapshot_path: PathBuf,
    role_path: Option<PathBuf>,
}

impl FileSnapshotSource {
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            role_path: None,
        }
    }

    pub fn with_role(mut self, role_path: impl Into<PathBuf>) -> Self {
        self.role_path = Some(role_path.into());
        self
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn fetch_permissions(&self) -> authz::Result<Vec<PermissionNode>> {
        debug!("Reading permission snapshot from {:?}", self.snapshot_path);
        let content = tokio::fs::read_to_string(&self.snapshot_path)
            .await
            .map_err(|e| AuthzError::Source(format!("{}: {}", self.snapshot_path.display(), e)))?;
        authz::parse_snapshot(&content)
    }

    async fn fetch_role_permission_ids(&self, role_id: i64) -> authz::Result<Vec<NodeId>> {
        let path = self
            .role_path
            .as_deref()
            .ok_or_else(|| AuthzError::Source("no role file configured".into()))?;
        let role = read_role(path).await?;
        if role.id != role_id {
            return Err(AuthzError::Source(format!(
                "role file holds role {}, not {}",
                role.id, role_id
            )));
        }
        Ok(role.permission_ids.into_iter().collect())
    }
}

/// Writes saved permission sets back into a role JSON file
#[derive(Debug, Clone)]
pub struct JsonRoleStore {
    path: PathBuf,
}

impl JsonRoleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RolePermissionStore for JsonRoleStore {
    async fn save_role_permissions(&self, role_id: i64, permission_ids: &[NodeId]) -> authz::Result<()> {
        let mut role = read_role(&self.path).await?;
        if role.id != role_id {
            return Err(AuthzError::SaveConflict {
                role_id,
                reason: format!("role file holds role {}", role.id),
            });
        }
        role.replace_permissions(permission_ids.iter().copied());

        let json = serde_json::to_string_pretty(&role)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| AuthzError::SaveConflict {
                role_id,
                reason: e.to_string(),
            })
    }
}
