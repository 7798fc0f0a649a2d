//! Allowed path prefixes derived from a visible menu.
//!
//! A prefix `P` covers a route `R` when `R == P` or `R` starts with `P/`.
//! `/users` therefore covers `/users/42` but not `/users-archive`.

use serde::Serialize;
use std::collections::HashSet;

use crate::resolver::visible_menu;
use crate::tree::{build_tree, BuildMode, PermissionForest};
use crate::types::{PermissionNode, PermissionSet};

/// Ordered, de-duplicated path prefixes in menu pre-order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AllowedPaths {
    prefixes: Vec<String>,
}

impl AllowedPaths {
    pub fn from_prefixes<S: Into<String>>(prefixes: impl IntoIterator<Item = S>) -> Self {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for prefix in prefixes {
            let Some(prefix) = normalize_prefix(&prefix.into()) else {
                continue;
            };
            if seen.insert(prefix.clone()) {
                out.push(prefix);
            }
        }
        Self { prefixes: out }
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.prefixes.iter().any(|p| p == prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }

    /// The first prefix in menu order, used as the redirect fallback.
    pub fn first(&self) -> Option<&str> {
        self.prefixes.first().map(String::as_str)
    }

    pub fn covers(&self, route: &str) -> bool {
        let route = route_path(route);
        self.prefixes.iter().any(|p| prefix_matches(p, route))
    }

    /// The longest prefix covering `route`.
    pub fn longest_match(&self, route: &str) -> Option<&str> {
        let route = route_path(route);
        self.prefixes
            .iter()
            .filter(|p| prefix_matches(p, route))
            .max_by_key(|p| p.len())
            .map(String::as_str)
    }
}

/// Every non-empty `path` in the forest, in pre-order. Catalogs only
/// contribute when they carry a path of their own.
pub fn allowed_path_prefixes(forest: &PermissionForest) -> AllowedPaths {
    AllowedPaths::from_prefixes(forest.iter().filter_map(|n| n.path.clone()))
}

/// The allowed prefix that owns `route`, for active-state highlighting.
pub fn active_entry<'a>(route: &str, allowed: &'a AllowedPaths) -> Option<&'a str> {
    allowed.longest_match(route)
}

/// Root-to-leaf chain of nodes leading to the menu entry that owns `route`.
pub fn breadcrumb<'a>(forest: &'a PermissionForest, route: &str) -> Vec<&'a PermissionNode> {
    let allowed = allowed_path_prefixes(forest);
    let Some(active) = allowed.longest_match(route) else {
        return Vec::new();
    };
    let Some(owner) = forest
        .iter()
        .find(|n| n.path.as_deref().and_then(normalize_prefix).as_deref() == Some(active))
    else {
        return Vec::new();
    };

    let mut chain = forest.ancestors(owner.id);
    chain.reverse();
    chain.push(owner);
    chain
}

/// A principal's rendered menu and the prefixes it unlocks.
#[derive(Debug, Clone)]
pub struct MenuView {
    pub menu: PermissionForest,
    pub allowed: AllowedPaths,
}

impl MenuView {
    pub fn build(records: &[PermissionNode], permissions: &PermissionSet) -> Self {
        let rendered = build_tree(records, BuildMode::MenuRender);
        let menu = visible_menu(&rendered, permissions);
        let allowed = allowed_path_prefixes(&menu);
        Self { menu, allowed }
    }

    pub fn breadcrumb(&self, route: &str) -> Vec<&PermissionNode> {
        breadcrumb(&self.menu, route)
    }
}

/// `#` is the console's placeholder for entries that do not navigate.
fn normalize_prefix(path: &str) -> Option<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed == "#" {
        return None;
    }
    match trimmed.trim_end_matches('/') {
        "" => Some("/".to_string()),
        stripped => Some(stripped.to_string()),
    }
}

/// Strips any query string or fragment from a requested route.
fn route_path(route: &str) -> &str {
    let end = route.find(|c: char| c == '?' || c == '#').unwrap_or(route.len());
    &route[..end]
}

fn prefix_matches(prefix: &str, route: &str) -> bool {
    match route.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
