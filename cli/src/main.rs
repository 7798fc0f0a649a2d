use anyhow::Result;
use authz::{BuildMode, NodeId};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

mod commands;
mod config;
mod logging;
mod utils;

use commands::{check, menu, role, route, tree};
use config::ConsoleConfiguration;
use utils::env_paths::{get_environment, EnvPaths};

/// Console CLI - Inspect permission trees, menus and route access for the admin console
#[derive(Parser)]
#[command(name = "consolectl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write daily rolling log files to this directory
    #[arg(long, global = true, env = "CONSOLE_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the permission tree from a snapshot
    Tree {
        /// Permission snapshot (JSON array of records)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Build mode (menu-render, permission-edit)
        #[arg(short, long)]
        mode: Option<BuildMode>,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the menu and allowed paths of a principal
    Menu {
        /// Permission snapshot (JSON array of records)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Principal file (JSON)
        #[arg(short, long)]
        principal: Option<PathBuf>,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check a principal against required permission codes
    Check {
        /// Principal file (JSON)
        #[arg(short, long)]
        principal: Option<PathBuf>,

        /// Required permission code, repeatable
        #[arg(short, long = "require", required = true)]
        require: Vec<String>,

        /// Require every code instead of any one of them
        #[arg(long)]
        all: bool,

        /// Permission snapshot; unknown codes are denied when given
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decide whether a principal may open a route
    Route {
        /// Permission snapshot (JSON array of records)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Principal file (JSON)
        #[arg(short, long)]
        principal: Option<PathBuf>,

        /// Requested route, e.g. /users/42
        #[arg(long)]
        path: String,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Edit the permissions granted to a role
    Role {
        /// Permission snapshot (JSON array of records)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Role file (JSON)
        #[arg(long)]
        role: PathBuf,

        /// Node id to check, repeatable; applied before unchecks
        #[arg(long = "check")]
        check: Vec<NodeId>,

        /// Node id to uncheck, repeatable
        #[arg(long = "uncheck")]
        uncheck: Vec<NodeId>,

        /// Principal doing the granting; limits the tree to what they hold
        #[arg(long)]
        granter: Option<PathBuf>,

        /// Write the resulting permission ids back to the role file
        #[arg(long)]
        save: bool,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// List the loaded console configuration
    List {
        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Read a specific configuration value
    Get {
        /// Configuration path (e.g., "console.snapshot_path")
        section: String,

        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let env_paths = EnvPaths::load()?;
    let environment = get_environment();
    let config = ConsoleConfiguration::load(&env_paths.configuration_path, &environment)?;

    let log_dir = cli.log_dir.clone().or_else(|| config.log_dir());
    let _guard = logging::init_logging(cli.verbose, log_dir.as_deref())?;
    match config.source() {
        Some(path) => tracing::info!("Loaded configuration from {:?}", path),
        None => tracing::debug!(
            "No console configuration in {:?} for environment {}, using defaults",
            env_paths.configuration_path,
            environment
        ),
    }

    match cli.command {
        Commands::Tree {
            snapshot,
            mode,
            format,
        } => {
            tree::execute(&config, snapshot, mode, format).await?;
        }
        Commands::Menu {
            snapshot,
            principal,
            format,
        } => {
            menu::execute(&config, snapshot, principal, format).await?;
        }
        Commands::Check {
            principal,
            require,
            all,
            snapshot,
            format,
        } => {
            check::execute(&config, principal, require, all, snapshot, format).await?;
        }
        Commands::Route {
            snapshot,
            principal,
            path,
            format,
        } => {
            route::execute(&config, snapshot, principal, path, format).await?;
        }
        Commands::Role {
            snapshot,
            role,
            check,
            uncheck,
            granter,
            save,
            format,
        } => {
            let edit = role::RoleEdit {
                role,
                check,
                uncheck,
                granter,
                save,
            };
            role::execute(&config, snapshot, edit, format).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::List { format } => {
                commands::config::list(&config, format)?;
            }
            ConfigAction::Get { section, format } => {
                commands::config::get(&config, section, format)?;
            }
        },
    }

    Ok(())
}
