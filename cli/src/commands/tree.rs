use crate::config::ConsoleConfiguration;
use crate::utils::files::FileSnapshotSource;
use anyhow::Result;
use authz::{build_tree, BuildMode, PermissionForest, PermissionNode, SnapshotSequencer, TreeNode};
use colored::*;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TreeOutput {
    mode: BuildMode,
    tree: Vec<TreeNode>,
    issues: Vec<String>,
}

/// Build and print the permission forest of a snapshot
pub async fn execute(
    config: &ConsoleConfiguration,
    snapshot: Option<PathBuf>,
    mode: Option<BuildMode>,
    format: String,
) -> Result<()> {
    let snapshot = config.snapshot_or(snapshot)?;
    let mode = match mode {
        Some(mode) => mode,
        None => config.default_mode()?,
    };

    let loaded = SnapshotSequencer::new()
        .load(&FileSnapshotSource::new(snapshot))
        .await?;
    let forest = build_tree(&loaded.value, mode);

    match format.as_str() {
        "json" => {
            let output = TreeOutput {
                mode,
                tree: forest.to_tree(),
                issues: forest.issues().iter().map(|e| e.to_string()).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("{}", format!("=== Permission Tree ({}) ===", mode).bold());
            println!();
            print_forest(&forest, |_| String::new());
            if !forest.issues().is_empty() {
                println!();
                for issue in forest.issues() {
                    println!("{} {}", "warning:".yellow().bold(), issue);
                }
            }
            println!();
            println!("{}", format!("Total nodes: {}", forest.len()).green());
        }
    }

    Ok(())
}

/// Print a forest as an indented outline. `marker` prefixes each line.
pub fn print_forest<F>(forest: &PermissionForest, marker: F)
where
    F: Fn(&PermissionNode) -> String,
{
    if forest.is_empty() {
        println!("{}", "(empty)".yellow());
        return;
    }
    for root in forest.to_tree() {
        print_tree_node(&root, 0, &marker);
    }
}

fn print_tree_node<F>(tree: &TreeNode, depth: usize, marker: &F)
where
    F: Fn(&PermissionNode) -> String,
{
    let node = &tree.node;
    let indent = "  ".repeat(depth);
    let mut line = format!(
        "{}{}{} {} #{}",
        indent,
        marker(node),
        node.name.bold(),
        format!("[{}]", node.kind).cyan(),
        node.id
    );
    if !node.code.is_empty() {
        line.push_str(&format!(" {}", node.code.yellow()));
    }
    if let Some(path) = &node.path {
        line.push_str(&format!(" {}", path.green()));
    }
    if !node.is_enabled() {
        line.push_str(&format!(" {}", "(disabled)".red()));
    } else if !node.visible {
        line.push_str(&format!(" {}", "(hidden)".dimmed()));
    }
    println!("{}", line);

    for child in &tree.children {
        print_tree_node(child, depth + 1, marker);
    }
}
