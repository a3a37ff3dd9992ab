//! Template commands - Manage the template store.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Subcommand;
use serde::Serialize;
use tracing::info;

use scaffold_templates::{Template, TemplateLoader};

use super::output::print_json;
use super::{Context, OutputFormat};
use crate::ExitCodes;

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// Import an authored template directory (template.yaml + files/)
    Add {
        /// Directory holding template.yaml
        path: PathBuf,

        /// Register an alias for the imported template
        #[arg(short, long)]
        alias: Option<String>,
    },

    /// List stored templates
    List,

    /// Show a stored template
    Show {
        /// Digest, digest prefix or alias
        identifier: String,
    },

    /// Point an alias at a template, or remove it
    Alias {
        /// Alias name
        name: String,

        /// Digest, digest prefix or alias of the target template
        #[arg(required_unless_present = "remove")]
        identifier: Option<String>,

        /// Remove the alias instead
        #[arg(long, conflicts_with = "identifier")]
        remove: bool,
    },

    /// Print the full digest an identifier resolves to
    Resolve {
        /// Digest, digest prefix or alias
        identifier: String,
    },
}

#[derive(Serialize)]
struct TemplateSummary<'a> {
    digest: &'a str,
    name: &'a str,
    version: &'a str,
    root_folder: &'a str,
    aliases: &'a [String],
}

impl<'a> From<&'a Template> for TemplateSummary<'a> {
    fn from(t: &'a Template) -> Self {
        Self {
            digest: &t.id,
            name: &t.name,
            version: &t.version,
            root_folder: &t.root_folder,
            aliases: &t.aliases,
        }
    }
}

pub async fn execute(command: TemplateCommands, ctx: &Context) -> Result<u8> {
    let store = &ctx.store;

    match command {
        TemplateCommands::Add { path, alias } => {
            info!("Importing template from {:?}", path);
            let template = TemplateLoader::import(store, &path)
                .with_context(|| format!("Failed to import template from {}", path.display()))?;
            if let Some(alias) = &alias {
                store.register_alias(&template.id, alias)?;
            }

            match ctx.format {
                OutputFormat::Json => print_json(&TemplateSummary::from(&template))?,
                OutputFormat::Text => {
                    println!("✅ Stored template '{}' as {}", template.name, template.id);
                    if let Some(alias) = alias {
                        println!("   alias: {}", alias);
                    }
                }
            }
        }
        TemplateCommands::List => {
            let templates = store.list().context("Failed to list templates")?;
            match ctx.format {
                OutputFormat::Json => {
                    let summaries: Vec<_> = templates.iter().map(TemplateSummary::from).collect();
                    print_json(&summaries)?;
                }
                OutputFormat::Text => {
                    if templates.is_empty() {
                        println!("No templates in {}", store.root().display());
                    }
                    for t in &templates {
                        let aliases = if t.aliases.is_empty() {
                            String::new()
                        } else {
                            format!(" ({})", t.aliases.join(", "))
                        };
                        println!(
                            "{}  {} {}  root: {}{}",
                            t.short_id(),
                            t.name,
                            t.version,
                            t.root_folder,
                            aliases
                        );
                    }
                }
            }
        }
        TemplateCommands::Show { identifier } => {
            let template = store.find(&identifier)?;
            match ctx.format {
                OutputFormat::Json => print_json(&template)?,
                OutputFormat::Text => print!("{}", serde_yaml::to_string(&template)?),
            }
        }
        TemplateCommands::Alias {
            name,
            identifier,
            remove,
        } => {
            if remove {
                if store.remove_alias(&name)? {
                    println!("✅ Removed alias {}", name);
                } else {
                    println!("Alias {} was not registered", name);
                }
            } else {
                let identifier = identifier
                    .ok_or_else(|| anyhow::anyhow!("An identifier is required to set an alias"))?;
                let digest = store.resolve(&identifier)?;
                store.register_alias(&digest, &name)?;
                println!("✅ {} -> {}", name, digest);
            }
        }
        TemplateCommands::Resolve { identifier } => {
            let digest = store.resolve(&identifier)?;
            println!("{}", digest);
        }
    }

    Ok(ExitCodes::SUCCESS)
}
