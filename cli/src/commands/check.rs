use crate::config::ConsoleConfiguration;
use crate::utils::files::{read_json, FileSnapshotSource};
use anyhow::Result;
use authz::{
    authorize, build_tree, Authorizer, BuildMode, Decision, DenyReason, MatchMode,
    PermissionCatalog, Principal, Requirement, SnapshotSequencer,
};
use colored::*;
use std::path::PathBuf;
use tracing::warn;

/// Decide whether a principal satisfies a permission requirement.
///
/// With a snapshot, codes missing from its catalog are denied outright.
pub async fn execute(
    config: &ConsoleConfiguration,
    principal: Option<PathBuf>,
    require: Vec<String>,
    all: bool,
    snapshot: Option<PathBuf>,
    format: String,
) -> Result<()> {
    let principal: Principal = read_json(&config.principal_or(principal)?)?;
    let mode = if all { MatchMode::All } else { MatchMode::Any };
    let requirement = Requirement::with_mode(require, mode);

    let decision = match snapshot {
        Some(path) => {
            let loaded = SnapshotSequencer::new()
                .load(&FileSnapshotSource::new(path))
                .await?;
            let forest = build_tree(&loaded.value, BuildMode::PermissionEdit);
            let catalog = PermissionCatalog::from_forest(&forest);
            if let Err(e) = catalog.validate(&requirement) {
                warn!("{}", e);
            }
            Authorizer::new(catalog).authorize_principal(&principal, &requirement)
        }
        None if authorize(&principal.permissions, &requirement) => Decision::Allow,
        None => Decision::Deny(DenyReason::Missing),
    };

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&decision)?),
        _ => print_decision(&decision),
    }

    Ok(())
}

fn print_decision(decision: &Decision) {
    match decision {
        Decision::Allow => println!("{}", "allow".green().bold()),
        Decision::Deny(DenyReason::Missing) => {
            println!("{} (missing permission)", "deny".red().bold())
        }
        Decision::Deny(DenyReason::UnknownCode(code)) => {
            println!("{} (unknown code: {})", "deny".red().bold(), code)
        }
    }
}
