//! Tree Builder: turns a flat, unordered snapshot into an ordered forest.
//!
//! The forest is an arena. Nodes live in a `Vec`, an id index maps ids to
//! slots, and parent/children adjacency is stored as slot numbers. Nothing
//! holds references to other nodes, so a malformed parent chain can at worst
//! produce a wrong shape, never a reference cycle.
//!
//! Building never fails. Duplicate ids keep their first occurrence, while
//! unresolvable or looping parents turn the node into an extra root. Each
//! recovery is logged and kept on the forest as an issue.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{AuthzError, Result};
use crate::types::{NodeId, PermissionNode, PermissionType};

/// Which consumer the forest is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
    /// Navigation menus: buttons, hidden and disabled nodes are dropped, and
    /// catalogs without surviving descendants are pruned.
    #[default]
    MenuRender,
    /// Role editing: every node is kept so the editor shows full context.
    PermissionEdit,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::MenuRender => "menu-render",
            BuildMode::PermissionEdit => "permission-edit",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "menu-render" => Ok(BuildMode::MenuRender),
            "permission-edit" => Ok(BuildMode::PermissionEdit),
            other => Err(AuthzError::InvalidRecord(format!(
                "unknown build mode: {}",
                other
            ))),
        }
    }
}

/// Builds an ordered forest from flat records.
pub fn build_tree(records: &[PermissionNode], mode: BuildMode) -> PermissionForest {
    let forest = PermissionForest::from_records(records);
    debug!(
        nodes = forest.len(),
        roots = forest.roots.len(),
        mode = %mode,
        "permission forest built"
    );
    match mode {
        BuildMode::PermissionEdit => forest,
        BuildMode::MenuRender => forest.prune(|node, has_children| {
            renders_in_menu(node) && (!node.is_catalog() || has_children)
        }),
    }
}

/// A catalog's own `visible` flag is ignored. It is kept or pruned purely on
/// whether anything below it survives.
fn renders_in_menu(node: &PermissionNode) -> bool {
    node.kind != PermissionType::Button && node.is_enabled() && (node.visible || node.is_catalog())
}

/// An ordered forest of permission nodes.
#[derive(Debug, Clone, Default)]
pub struct PermissionForest {
    nodes: Vec<PermissionNode>,
    index: HashMap<NodeId, usize>,
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
    issues: Vec<AuthzError>,
}

impl PermissionForest {
    /// Indexes records into a forest without any filtering.
    pub fn from_records(records: &[PermissionNode]) -> Self {
        let mut nodes: Vec<PermissionNode> = Vec::with_capacity(records.len());
        let mut index = HashMap::with_capacity(records.len());
        let mut issues = Vec::new();

        for record in records {
            if index.contains_key(&record.id) {
                warn!(id = record.id, "duplicate permission id ignored");
                issues.push(AuthzError::DuplicateNode(record.id));
                continue;
            }
            if let Err(e) = record.validate() {
                debug!(id = record.id, error = %e, "keeping record that failed validation");
            }
            index.insert(record.id, nodes.len());
            nodes.push(record.clone());
        }

        let mut parent = vec![None; nodes.len()];
        for (idx, node) in nodes.iter().enumerate() {
            let Some(parent_id) = node.parent() else {
                continue;
            };
            match index.get(&parent_id) {
                Some(&p) if p != idx => parent[idx] = Some(p),
                _ => {
                    warn!(id = node.id, parent_id, "unresolvable parent, promoting node to root");
                    issues.push(AuthzError::MalformedTreeInput {
                        id: node.id,
                        parent_id,
                    });
                }
            }
        }

        break_cycles(&nodes, &mut parent, &mut issues);

        let mut children = vec![Vec::new(); nodes.len()];
        let mut roots = Vec::new();
        for (idx, p) in parent.iter().enumerate() {
            match p {
                Some(p) => children[*p].push(idx),
                None => roots.push(idx),
            }
        }

        roots.sort_by_key(|&i| (nodes[i].sort, nodes[i].id));
        for siblings in children.iter_mut() {
            siblings.sort_by_key(|&i| (nodes[i].sort, nodes[i].id));
        }

        Self {
            nodes,
            index,
            parent,
            children,
            roots,
            issues,
        }
    }

    /// Returns a new forest holding the nodes for which `keep` returns true.
    ///
    /// `keep` is called bottom-up with the node and whether any of its children
    /// were kept. A node that is not kept takes its whole subtree with it.
    /// Sibling order is preserved.
    pub fn prune<F>(&self, mut keep: F) -> PermissionForest
    where
        F: FnMut(&PermissionNode, bool) -> bool,
    {
        let mut kept = vec![false; self.nodes.len()];
        for &root in &self.roots {
            self.mark(root, &mut keep, &mut kept);
        }

        let mut out = PermissionForest {
            issues: self.issues.clone(),
            ..Default::default()
        };
        for &root in &self.roots {
            if kept[root] {
                let new_root = self.copy_kept(root, None, &kept, &mut out);
                out.roots.push(new_root);
            }
        }
        out
    }

    fn mark<F>(&self, idx: usize, keep: &mut F, kept: &mut [bool]) -> bool
    where
        F: FnMut(&PermissionNode, bool) -> bool,
    {
        let mut any_child = false;
        for &child in &self.children[idx] {
            if self.mark(child, keep, kept) {
                any_child = true;
            }
        }
        kept[idx] = keep(&self.nodes[idx], any_child);
        kept[idx]
    }

    fn copy_kept(
        &self,
        idx: usize,
        parent: Option<usize>,
        kept: &[bool],
        out: &mut PermissionForest,
    ) -> usize {
        let new_idx = out.nodes.len();
        out.index.insert(self.nodes[idx].id, new_idx);
        out.nodes.push(self.nodes[idx].clone());
        out.parent.push(parent);
        out.children.push(Vec::new());

        for &child in &self.children[idx] {
            if kept[child] {
                let new_child = self.copy_kept(child, Some(new_idx), kept, out);
                out.children[new_idx].push(new_child);
            }
        }
        new_idx
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&PermissionNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Problems recovered from while building.
    pub fn issues(&self) -> &[AuthzError] {
        &self.issues
    }

    pub fn roots(&self) -> impl Iterator<Item = &PermissionNode> + '_ {
        self.roots.iter().map(move |&i| &self.nodes[i])
    }

    /// Direct children of `id` in display order. Empty for leaves and unknown ids.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &PermissionNode> + '_ {
        self.index
            .get(&id)
            .into_iter()
            .flat_map(move |&i| self.children[i].iter().map(move |&c| &self.nodes[c]))
    }

    pub fn parent_of(&self, id: NodeId) -> Option<&PermissionNode> {
        let idx = *self.index.get(&id)?;
        self.parent[idx].map(|p| &self.nodes[p])
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<&PermissionNode> {
        let mut out = Vec::new();
        let mut cursor = self.index.get(&id).and_then(|&i| self.parent[i]);
        while let Some(idx) = cursor {
            out.push(&self.nodes[idx]);
            cursor = self.parent[idx];
        }
        out
    }

    /// Every descendant of `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<&PermissionNode> {
        let mut out = Vec::new();
        if let Some(&idx) = self.index.get(&id) {
            let mut stack: Vec<usize> = self.children[idx].iter().rev().copied().collect();
            while let Some(i) = stack.pop() {
                out.push(&self.nodes[i]);
                stack.extend(self.children[i].iter().rev().copied());
            }
        }
        out
    }

    /// All nodes in pre-order, following sibling order.
    pub fn iter(&self) -> impl Iterator<Item = &PermissionNode> + '_ {
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let idx = stack.pop()?;
            stack.extend(self.children[idx].iter().rev().copied());
            Some(&self.nodes[idx])
        })
    }

    /// `ids` plus every ancestor of each. Unknown ids pass through unchanged.
    pub fn with_ancestors(&self, ids: impl IntoIterator<Item = NodeId>) -> BTreeSet<NodeId> {
        let mut out = BTreeSet::new();
        for id in ids {
            if !out.insert(id) {
                continue;
            }
            for ancestor in self.ancestors(id) {
                if !out.insert(ancestor.id) {
                    break;
                }
            }
        }
        out
    }

    /// A node may only be deleted once it has no children.
    pub fn can_delete(&self, id: NodeId) -> bool {
        self.index
            .get(&id)
            .is_some_and(|&i| self.children[i].is_empty())
    }

    /// Re-nests the forest for serialization.
    pub fn to_tree(&self) -> Vec<TreeNode> {
        self.roots.iter().map(|&i| self.nest(i)).collect()
    }

    fn nest(&self, idx: usize) -> TreeNode {
        TreeNode {
            node: self.nodes[idx].clone(),
            children: self.children[idx].iter().map(|&c| self.nest(c)).collect(),
        }
    }

    pub(crate) fn slot(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub(crate) fn node_at(&self, idx: usize) -> &PermissionNode {
        &self.nodes[idx]
    }

    pub(crate) fn child_slots(&self, idx: usize) -> &[usize] {
        &self.children[idx]
    }
}

/// Cuts parent links that loop back on themselves. Within each loop the node
/// that came first in the input becomes a root.
fn break_cycles(nodes: &[PermissionNode], parent: &mut [Option<usize>], issues: &mut Vec<AuthzError>) {
    let mut settled = vec![false; nodes.len()];
    let mut on_path = vec![false; nodes.len()];

    for start in 0..nodes.len() {
        if settled[start] {
            continue;
        }
        let mut path = Vec::new();
        let mut cursor = start;
        loop {
            if settled[cursor] {
                break;
            }
            if on_path[cursor] {
                let pos = path.iter().position(|&i| i == cursor).unwrap_or(0);
                let cut = path[pos..].iter().copied().min().unwrap_or(cursor);
                if let Some(p) = parent[cut].take() {
                    warn!(
                        id = nodes[cut].id,
                        parent_id = nodes[p].id,
                        "parent cycle detected, promoting node to root"
                    );
                    issues.push(AuthzError::MalformedTreeInput {
                        id: nodes[cut].id,
                        parent_id: nodes[p].id,
                    });
                }
                break;
            }
            on_path[cursor] = true;
            path.push(cursor);
            match parent[cursor] {
                Some(p) => cursor = p,
                None => break,
            }
        }
        for idx in path {
            on_path[idx] = false;
            settled[idx] = true;
        }
    }
}

/// A node with its children nested, for display and JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: PermissionNode,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}
