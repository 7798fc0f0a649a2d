use crate::config::ConsoleConfiguration;
use crate::utils::files::{read_json, FileSnapshotSource};
use anyhow::Result;
use authz::{GuardDecision, MenuView, Navigator, Principal, RouteGuard, SnapshotSequencer};
use colored::*;
use std::cell::RefCell;
use std::path::PathBuf;
use tracing::debug;

/// Remembers where the guard asked to navigate
#[derive(Default)]
struct RecordingNavigator {
    target: RefCell<Option<String>>,
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        debug!("Navigating to {}", path);
        *self.target.borrow_mut() = Some(path.to_string());
    }
}

/// Run the route guard for one requested path
pub async fn execute(
    config: &ConsoleConfiguration,
    snapshot: Option<PathBuf>,
    principal: Option<PathBuf>,
    path: String,
    format: String,
) -> Result<()> {
    let snapshot = config.snapshot_or(snapshot)?;
    let principal: Principal = read_json(&config.principal_or(principal)?)?;

    let sequencer = SnapshotSequencer::new();
    let loaded = sequencer.load(&FileSnapshotSource::new(snapshot)).await?;
    let view = MenuView::build(&loaded.value, &principal.permissions);

    let navigator = RecordingNavigator::default();
    let mut guard = RouteGuard::new();
    let decision = guard.on_snapshot(loaded.generation, view.allowed.clone(), &path, &navigator)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    match &decision {
        GuardDecision::Allow { active } => {
            let active = active.as_deref().unwrap_or_default();
            println!("{} {}", "allow".green().bold(), active);
            let crumbs: Vec<&str> = view
                .breadcrumb(&path)
                .into_iter()
                .map(|n| n.name.as_str())
                .collect();
            if !crumbs.is_empty() {
                println!("{}", crumbs.join(" > ").dimmed());
            }
        }
        GuardDecision::Redirect { .. } => {
            if let Some(target) = navigator.target.borrow().as_deref() {
                println!("{} {}", "redirect".yellow().bold(), target);
            }
        }
        GuardDecision::Empty => println!("{}", "empty".red().bold()),
        GuardDecision::Pending => println!("{}", "pending".dimmed()),
    }

    Ok(())
}
