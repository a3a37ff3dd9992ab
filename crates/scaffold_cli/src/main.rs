//! scaffold CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success, project clean
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation errors
//! - 4: Warnings only
//! - 5: Template error

use std::process::ExitCode;

use clap::Parser;
use scaffold_engine::{EngineError, ErrorKind};
use scaffold_templates::TemplateError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

use commands::{Cli, Commands, Context};
use config::Config;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_ERRORS: u8 = 3;
    pub const WARNINGS: u8 = 4;
    pub const TEMPLATE_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let store_path = cli.store_path();
    let config = Config::load(&store_path);

    let filter = log_filter(&cli, config.as_ref().ok());
    let log_result = if cli.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    };
    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            return ExitCode::from(ExitCodes::GENERAL_ERROR);
        }
    };
    let ctx = Context::new(&cli, store_path, &config);

    let result = match cli.command {
        Commands::Create(args) => commands::create::execute(args, &ctx).await,
        Commands::Extend(args) => commands::extend::execute(args, &ctx).await,
        Commands::Check(args) => commands::check::execute(args, &ctx).await,
        Commands::Fix(args) => commands::fix::execute(args, &ctx).await,
        Commands::Template(command) => commands::template::execute(command, &ctx).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

/// `--verbose` wins, then `RUST_LOG`, then the config file.
fn log_filter(cli: &Cli, config: Option<&Config>) -> EnvFilter {
    const DEFAULT: &str = "scaffold=info,warn";

    if cli.verbose {
        return EnvFilter::new("scaffold=debug,warn");
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let directives = config
        .and_then(|c| c.log_filter.as_deref())
        .unwrap_or(DEFAULT);
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT))
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(engine) = cause.downcast_ref::<EngineError>() {
            return match engine {
                EngineError::Template(template) => categorize_template_error(template),
                _ => match engine.kind() {
                    ErrorKind::MissingRequiredVariable => ExitCodes::INVALID_ARGS,
                    ErrorKind::AmbiguousIdentifier => ExitCodes::TEMPLATE_ERROR,
                    _ => ExitCodes::GENERAL_ERROR,
                },
            };
        }
        if let Some(template) = cause.downcast_ref::<TemplateError>() {
            return categorize_template_error(template);
        }
    }
    ExitCodes::GENERAL_ERROR
}

fn categorize_template_error(e: &TemplateError) -> u8 {
    match e {
        TemplateError::MissingRequiredVariable(_)
        | TemplateError::InvalidVariable { .. }
        | TemplateError::InvalidAlias { .. } => ExitCodes::INVALID_ARGS,
        TemplateError::Io(_) => ExitCodes::GENERAL_ERROR,
        _ => ExitCodes::TEMPLATE_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_categorize_error() {
        let ambiguous = anyhow::Error::from(EngineError::from(TemplateError::AmbiguousIdentifier {
            identifier: "ab".into(),
            candidates: vec!["ab1".into(), "ab2".into()],
        }));
        assert_eq!(categorize_error(&ambiguous), ExitCodes::TEMPLATE_ERROR);

        let missing_var = anyhow::Error::from(TemplateError::MissingRequiredVariable("PORT".into()))
            .context("Failed to create project");
        assert_eq!(categorize_error(&missing_var), ExitCodes::INVALID_ARGS);

        let unmanaged = anyhow::Error::from(EngineError::NotManaged(PathBuf::from("/tmp")));
        assert_eq!(categorize_error(&unmanaged), ExitCodes::GENERAL_ERROR);

        let other = anyhow::anyhow!("boom");
        assert_eq!(categorize_error(&other), ExitCodes::GENERAL_ERROR);
    }
}
