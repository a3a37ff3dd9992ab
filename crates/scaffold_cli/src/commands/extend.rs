//! Extend command - Apply more templates to an existing project.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use scaffold_engine::ApplyOptions;

use super::create::print_outcome;
use super::output::print_json;
use super::{parse_var, Context, OutputFormat};
use crate::ExitCodes;

#[derive(Args)]
pub struct ExtendArgs {
    /// Template digest, digest prefix or alias (repeatable)
    #[arg(short, long = "template")]
    templates: Vec<String>,

    /// Any path inside the project
    #[arg(short, long, default_value = ".")]
    path: PathBuf,

    /// Variable binding NAME=VALUE (repeatable)
    #[arg(long = "var", value_parser = parse_var)]
    vars: Vec<(String, String)>,
}

pub async fn execute(args: ExtendArgs, ctx: &Context) -> Result<u8> {
    if args.templates.is_empty() && args.vars.is_empty() {
        anyhow::bail!("Nothing to do: pass --template or --var");
    }
    info!("Extending project at {:?}", args.path);

    let mut options = ApplyOptions::new(&ctx.applied_by);
    options.variables.extend(args.vars);

    let outcome = ctx
        .reconciler()
        .extend(&args.path, &args.templates, &options)
        .context("Failed to extend project")?;

    match ctx.format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Text => {
            println!("✅ Project '{}' extended", outcome.project_name);
            print_outcome(&outcome);
        }
    }
    Ok(ExitCodes::SUCCESS)
}
