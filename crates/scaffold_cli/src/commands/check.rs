//! Check command - Validate a project against its templates.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use super::output::print_report;
use super::Context;

#[derive(Args)]
pub struct CheckArgs {
    /// Any path inside the project
    #[arg(short, long, default_value = ".")]
    path: PathBuf,

    /// Append a check entry to the project history
    #[arg(long)]
    record: bool,
}

pub async fn execute(args: CheckArgs, ctx: &Context) -> Result<u8> {
    info!("Checking project at {:?}", args.path);

    let reconciler = ctx.reconciler();
    let report = if args.record {
        reconciler.check(&args.path)
    } else {
        reconciler.validate(&args.path)
    }
    .context("Validation failed to run")?;

    print_report(&report, ctx.format)
}
