//! Fix command - Repair auto-fixable drift.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use super::output::print_report;
use super::Context;

#[derive(Args)]
pub struct FixArgs {
    /// Any path inside the project
    #[arg(short, long, default_value = ".")]
    path: PathBuf,

    /// Report what would be fixed without changing anything
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(args: FixArgs, ctx: &Context) -> Result<u8> {
    info!(
        "Fixing project at {:?}{}",
        args.path,
        if args.dry_run { " (dry run)" } else { "" }
    );

    let report = ctx
        .reconciler()
        .fix(&args.path, args.dry_run)
        .context("Fix failed to run")?;

    print_report(&report, ctx.format)
}
