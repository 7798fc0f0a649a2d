//! The asynchronous boundary: fetching snapshots and discarding stale ones.
//!
//! Every fetch is stamped with a generation before it starts. A result is only
//! accepted while its generation is still the latest one issued for its kind. Results from
//! superseded fetches are dropped whole, never merged.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::error::{AuthzError, Result};
use crate::types::{NodeId, PermissionNode};

/// Sequence number of one fetch. Later fetches have larger generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A value together with the generation of the fetch that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<T> {
    pub generation: Generation,
    pub value: T,
}

/// Where snapshots come from: a network client, a file, a fixture.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// The flat list of every permission/menu record.
    async fn fetch_permissions(&self) -> Result<Vec<PermissionNode>>;

    /// The permission ids currently stored on a role.
    async fn fetch_role_permission_ids(&self, role_id: i64) -> Result<Vec<NodeId>>;
}

/// Issues generations and rejects results that arrive out of date.
///
/// Permission snapshots and role-id fetches are sequenced independently: a
/// role fetch never supersedes a permission fetch, so an editor may run both
/// at once. Within each kind only the latest fetch is accepted.
#[derive(Debug, Default)]
pub struct SnapshotSequencer {
    issued: AtomicU64,
    role_issued: AtomicU64,
}

fn next(counter: &AtomicU64) -> Generation {
    Generation(counter.fetch_add(1, Ordering::SeqCst) + 1)
}

fn check<T>(counter: &AtomicU64, generation: Generation, value: T) -> Result<Loaded<T>> {
    let latest = Generation(counter.load(Ordering::SeqCst));
    if generation < latest {
        debug!(
            generation = generation.get(),
            latest = latest.get(),
            "discarding stale snapshot"
        );
        return Err(AuthzError::StaleSnapshotDiscarded {
            generation: generation.get(),
            latest: latest.get(),
        });
    }
    Ok(Loaded { generation, value })
}

impl SnapshotSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new permission fetch, superseding every one begun before it.
    pub fn begin(&self) -> Generation {
        next(&self.issued)
    }

    /// The most recently issued permission generation.
    pub fn latest(&self) -> Generation {
        Generation(self.issued.load(Ordering::SeqCst))
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        generation >= self.latest()
    }

    /// Accepts `value` if no newer permission fetch has begun since `generation`.
    pub fn accept<T>(&self, generation: Generation, value: T) -> Result<Loaded<T>> {
        check(&self.issued, generation, value)
    }

    /// Starts a new role-id fetch, superseding earlier role-id fetches only.
    pub fn begin_role(&self) -> Generation {
        next(&self.role_issued)
    }

    /// Accepts role ids if no newer role-id fetch has begun since `generation`.
    pub fn accept_role<T>(&self, generation: Generation, value: T) -> Result<Loaded<T>> {
        check(&self.role_issued, generation, value)
    }

    /// Fetches the permission list and accepts it in one step.
    pub async fn load<S>(&self, source: &S) -> Result<Loaded<Vec<PermissionNode>>>
    where
        S: SnapshotSource + ?Sized,
    {
        let generation = self.begin();
        let records = source.fetch_permissions().await?;
        debug!(generation = generation.get(), records = records.len(), "snapshot fetched");
        self.accept(generation, records)
    }

    /// Fetches a role's stored ids and accepts them in one step.
    pub async fn load_role<S>(&self, source: &S, role_id: i64) -> Result<Loaded<Vec<NodeId>>>
    where
        S: SnapshotSource + ?Sized,
    {
        let generation = self.begin_role();
        let ids = source.fetch_role_permission_ids(role_id).await?;
        self.accept_role(generation, ids)
    }
}

/// Parses a snapshot transported as a JSON array of camelCase records.
pub fn parse_snapshot(json: &str) -> Result<Vec<PermissionNode>> {
    Ok(serde_json::from_str(json)?)
}
