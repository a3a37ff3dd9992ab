//! CLI command definitions.
//!
//! Each subcommand is a thin wrapper around the reconciliation engine or the
//! template store; formatting lives in [`output`].

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use scaffold_engine::Reconciler;
use scaffold_templates::TemplateStore;

use crate::config::{default_store, Config};

pub mod check;
pub mod create;
pub mod extend;
pub mod fix;
pub mod output;
pub mod template;

/// scaffold - template-driven project structure
#[derive(Parser)]
#[command(name = "scaffold")]
#[command(version, about = "scaffold - create projects from templates and keep them in shape")]
#[command(long_about = r#"
scaffold creates projects from content-addressed templates, detects drift
between a project and its templates, and repairs it.

COMMANDS:
  create     → Create a project from one or more templates
  extend     → Apply more templates to an existing project
  check      → Validate a project against its templates
  fix        → Repair auto-fixable drift
  template   → Manage the template store

EXIT CODES:
  0 - Success, project clean
  1 - General error
  2 - Invalid arguments
  3 - Validation errors
  4 - Warnings only
  5 - Template error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Template store directory (defaults to ~/.scaffold)
    #[arg(long, global = true, env = "SCAFFOLD_STORE")]
    pub store: Option<PathBuf>,

    /// Name recorded as `applied_by` in project manifests
    #[arg(long, global = true, env = "SCAFFOLD_USER")]
    pub user: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn store_path(&self) -> PathBuf {
        self.store.clone().unwrap_or_else(default_store)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new project from templates
    Create(create::CreateArgs),

    /// Apply more templates to an existing project
    Extend(extend::ExtendArgs),

    /// Validate a project against its templates
    Check(check::CheckArgs),

    /// Repair auto-fixable issues
    Fix(fix::FixArgs),

    /// Manage the template store
    #[command(subcommand)]
    Template(template::TemplateCommands),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Settings shared by every command.
pub struct Context {
    pub store: TemplateStore,
    pub applied_by: String,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(cli: &Cli, store_path: PathBuf, config: &Config) -> Self {
        let applied_by = cli
            .user
            .clone()
            .or_else(|| config.applied_by.clone())
            .or_else(|| std::env::var("USER").ok())
            .or_else(|| std::env::var("USERNAME").ok())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            store: TemplateStore::new(store_path),
            applied_by,
            format: cli.format,
        }
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.store.clone())
    }
}

/// Parse a `NAME=VALUE` variable binding.
pub fn parse_var(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid variable '{}', expected NAME=VALUE", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("invalid variable '{}', name is empty", s));
    }
    Ok((name.to_string(), value.to_string()))
}
