//! Error types for the permission tree and authorization core.
//!
//! Most of these never escape the core as hard failures. Malformed tree input
//! is recovered locally and listed by [`PermissionForest::issues`], stale
//! snapshots are dropped, and unknown permission codes simply deny. Only a
//! failed save is meant to reach the operator.
//!
//! [`PermissionForest::issues`]: crate::tree::PermissionForest::issues

use thiserror::Error;

use crate::types::NodeId;

/// Errors that can occur in the permission core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    /// A record's `parentId` does not resolve to any node, or the parent chain
    /// loops back on itself. The node is promoted to a root.
    #[error("Malformed tree input: node {id} has unresolvable parent {parent_id}")]
    MalformedTreeInput { id: NodeId, parent_id: NodeId },

    /// The same id appeared more than once in a flat list. The first
    /// occurrence wins.
    #[error("Duplicate node id {0} ignored")]
    DuplicateNode(NodeId),

    /// A required permission code is not part of the known catalog.
    #[error("Unknown permission code: {0}")]
    UnknownPermissionCode(String),

    /// A fetch finished after a newer one had already begun.
    #[error("Snapshot generation {generation} discarded, latest is {latest}")]
    StaleSnapshotDiscarded { generation: u64, latest: u64 },

    /// Persisting a role's permission set failed. The editor state is intact.
    #[error("Failed to save permissions for role {role_id}: {reason}")]
    SaveConflict { role_id: i64, reason: String },

    /// A record failed validation.
    #[error("Invalid permission record: {0}")]
    InvalidRecord(String),

    /// An operation referenced a node id that is not in the forest.
    #[error("Unknown permission node: {0}")]
    UnknownNode(NodeId),

    /// A collaborator failed to produce a snapshot.
    #[error("Snapshot source failed: {0}")]
    Source(String),
}

impl From<serde_json::Error> for AuthzError {
    fn from(err: serde_json::Error) -> Self {
        AuthzError::InvalidRecord(err.to_string())
    }
}

/// A specialized Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;
