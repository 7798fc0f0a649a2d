use super::tree::print_forest;
use crate::config::ConsoleConfiguration;
use crate::utils::files::{read_json, FileSnapshotSource};
use anyhow::Result;
use authz::{AllowedPaths, MenuView, Principal, SnapshotSequencer, TreeNode};
use colored::*;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MenuOutput<'a> {
    username: &'a str,
    menu: Vec<TreeNode>,
    allowed_paths: &'a AllowedPaths,
}

/// Print the menu a principal may see and the path prefixes it unlocks
pub async fn execute(
    config: &ConsoleConfiguration,
    snapshot: Option<PathBuf>,
    principal: Option<PathBuf>,
    format: String,
) -> Result<()> {
    let snapshot = config.snapshot_or(snapshot)?;
    let principal: Principal = read_json(&config.principal_or(principal)?)?;

    let loaded = SnapshotSequencer::new()
        .load(&FileSnapshotSource::new(snapshot))
        .await?;
    let view = MenuView::build(&loaded.value, &principal.permissions);

    match format.as_str() {
        "json" => {
            let output = MenuOutput {
                username: &principal.username,
                menu: view.menu.to_tree(),
                allowed_paths: &view.allowed,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!(
                "{}",
                format!("=== Menu for {} ===", principal.username).bold()
            );
            println!();
            print_forest(&view.menu, |_| String::new());
            println!();
            println!("{}", "Allowed paths:".bold());
            if view.allowed.is_empty() {
                println!("  {}", "(none)".yellow());
            }
            for prefix in view.allowed.iter() {
                println!("  {}", prefix.green());
            }
        }
    }

    Ok(())
}
