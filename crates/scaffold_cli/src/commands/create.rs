//! Create command - Create a new project from templates.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use scaffold_engine::{ApplyOptions, ApplyOutcome};

use super::output::print_json;
use super::{parse_var, Context, OutputFormat};
use crate::ExitCodes;

#[derive(Args)]
pub struct CreateArgs {
    /// Name of the project
    name: String,

    /// Template digest, digest prefix or alias (repeatable)
    #[arg(short, long = "template", required = true)]
    templates: Vec<String>,

    /// Project directory (defaults to ./<name>)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Variable binding NAME=VALUE (repeatable)
    #[arg(long = "var", value_parser = parse_var)]
    vars: Vec<(String, String)>,
}

pub async fn execute(args: CreateArgs, ctx: &Context) -> Result<u8> {
    info!("Creating project: {}", args.name);

    let path = match args.path {
        Some(path) => path,
        None => std::env::current_dir()?.join(&args.name),
    };
    let mut options = ApplyOptions::new(&ctx.applied_by);
    options.variables.extend(args.vars);

    let outcome = ctx
        .reconciler()
        .create(&path, &args.name, &args.templates, &options)
        .with_context(|| format!("Failed to create project {}", args.name))?;

    match ctx.format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Text => {
            println!("✅ Project '{}' created successfully!", args.name);
            print_outcome(&outcome);
        }
    }
    Ok(ExitCodes::SUCCESS)
}

pub(super) fn print_outcome(outcome: &ApplyOutcome) {
    println!();
    println!("Location: {}", outcome.root.display());
    println!(
        "Applied {} template(s), {} change(s)",
        outcome.applied.len(),
        outcome.changes.len()
    );
    for digest in &outcome.skipped {
        println!("   - {} already applied, skipped", &digest[..digest.len().min(12)]);
    }
    for conflict in &outcome.conflicts {
        println!("⚠️  {}", conflict.message);
    }
}
