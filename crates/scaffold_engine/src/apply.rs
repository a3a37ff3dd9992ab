//! Create projects from templates and extend existing ones.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use scaffold_project::{
    AppliedTemplate, Change, Conflict, HistoryAction, ManifestStore, ProjectError, ProjectManifest,
};
use scaffold_templates::{ConflictResolution, Template};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::EngineResult;
use crate::reconciler::{write_new_file, Reconciler};

/// Inputs for applying templates to a project.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Variable bindings to store in the manifest
    pub variables: HashMap<String, String>,
    /// Recorded as `applied_by` on every applied template
    pub applied_by: String,
}

impl ApplyOptions {
    pub fn new(applied_by: impl Into<String>) -> Self {
        Self {
            variables: HashMap::new(),
            applied_by: applied_by.into(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

/// What applying templates did to a project.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub root: PathBuf,
    pub project_name: String,
    /// Digests applied by this run
    pub applied: Vec<String>,
    /// Digests that were already active and left alone
    pub skipped: Vec<String>,
    pub changes: Vec<Change>,
    pub conflicts: Vec<Conflict>,
}

/// A template resolved and rendered before anything is written.
struct Plan {
    template: Template,
    alias: Option<String>,
    folders: Vec<String>,
    files: Vec<(String, String)>,
}

impl Reconciler {
    /// Create a new project at `path` from the given template identifiers.
    pub fn create(
        &self,
        path: &Path,
        name: &str,
        identifiers: &[String],
        options: &ApplyOptions,
    ) -> EngineResult<ApplyOutcome> {
        if ManifestStore::exists(path) {
            return Err(ProjectError::AlreadyExists(path.to_path_buf()).into());
        }

        info!("Creating project {} at {:?}", name, path);
        let manifest = ProjectManifest::new(name);
        self.apply_templates(path, manifest, identifiers, options, HistoryAction::Create)
    }

    /// Apply more templates to the project owning `path`.
    pub fn extend(
        &self,
        path: &Path,
        identifiers: &[String],
        options: &ApplyOptions,
    ) -> EngineResult<ApplyOutcome> {
        let (root, manifest) = self.locate(path)?;
        info!("Extending project {} at {:?}", manifest.name, root);
        self.apply_templates(&root, manifest, identifiers, options, HistoryAction::Extend)
    }

    fn apply_templates(
        &self,
        root: &Path,
        mut manifest: ProjectManifest,
        identifiers: &[String],
        options: &ApplyOptions,
        action: HistoryAction,
    ) -> EngineResult<ApplyOutcome> {
        manifest.merge_variables(&options.variables);

        let mut outcome = ApplyOutcome {
            root: root.to_path_buf(),
            project_name: manifest.name.clone(),
            applied: Vec::new(),
            skipped: Vec::new(),
            changes: Vec::new(),
            conflicts: Vec::new(),
        };

        // Resolve, bind and render everything before the first write
        let mut plans: Vec<Plan> = Vec::new();
        for identifier in identifiers {
            let digest = self.store.resolve(identifier)?;
            if manifest.active_template(&digest).is_some()
                || plans.iter().any(|p| p.template.id == digest)
            {
                debug!("Template {} already applied", digest);
                outcome.skipped.push(digest);
                continue;
            }

            let template = self.store.get(&digest)?;
            plans.push(self.plan(&manifest, template, identifier)?);
        }

        if plans.is_empty() && options.variables.is_empty() && action == HistoryAction::Extend {
            info!("Nothing to apply");
            return Ok(outcome);
        }

        fs::create_dir_all(root)?;
        let mut roots: HashMap<String, String> = manifest
            .active_templates()
            .map(|t| (t.root_folder.clone(), t.digest.clone()))
            .collect();

        for plan in plans {
            let template = &plan.template;
            let label = plan.alias.as_deref().unwrap_or(&template.name);
            let mut applied = AppliedTemplate::new(
                &template.id,
                &template.root_folder,
                &options.applied_by,
            )
            .with_alias(plan.alias.clone());

            if let Some(other) = roots.get(&template.root_folder) {
                warn!("Root folder {} is shared with {}", template.root_folder, other);
                applied.conflicts.push(Conflict {
                    path: template.root_folder.clone(),
                    message: format!(
                        "Root folder {} is shared with template {}",
                        template.root_folder, other
                    ),
                });
            }

            for folder in &plan.folders {
                let full = root.join(folder);
                if full.is_dir() {
                    continue;
                }
                fs::create_dir_all(&full)?;
                outcome
                    .changes
                    .push(Change::added(folder, format!("Created from {}", label)));
            }

            for (rel, content) in &plan.files {
                let full = root.join(rel);
                if !full.exists() {
                    write_new_file(&full, content)?;
                    outcome
                        .changes
                        .push(Change::added(rel, format!("Created from {}", label)));
                    continue;
                }

                match template.rules.conflict_resolution {
                    ConflictResolution::Overwrite if full.is_file() => {
                        fs::write(&full, content)?;
                        outcome
                            .changes
                            .push(Change::modified(rel, format!("Overwritten by {}", label)));
                    }
                    _ => {
                        warn!("Keeping existing {}", rel);
                        applied.conflicts.push(Conflict {
                            path: rel.clone(),
                            message: format!("{} already exists and was kept", rel),
                        });
                    }
                }
            }

            info!("Applied template {} ({})", label, template.short_id());
            roots.insert(template.root_folder.clone(), template.id.clone());
            outcome.applied.push(template.id.clone());
            outcome.conflicts.extend(applied.conflicts.iter().cloned());
            manifest.templates.push(applied);
        }

        manifest.record(action, outcome.changes.clone());
        self.manifests.save(root, &mut manifest)?;
        Ok(outcome)
    }

    fn plan(
        &self,
        manifest: &ProjectManifest,
        template: Template,
        identifier: &str,
    ) -> EngineResult<Plan> {
        let vars = self.bindings(manifest, &template)?;

        let resolve = |path: &str| {
            self.substitutor
                .resolve_path(path, &template.root_folder, &vars)
        };

        let mut folders = Vec::with_capacity(template.folders.len() + 1);
        folders.push(resolve(&template.root_folder)?);
        for folder in &template.folders {
            folders.push(resolve(&folder.path)?);
        }

        let mut files = Vec::with_capacity(template.files.len());
        for file in &template.files {
            let rel = resolve(&file.path)?;
            files.push((rel, self.file_content(&template, file, &vars)?));
        }

        let alias = (!template.id.starts_with(identifier)).then(|| identifier.to_string());
        Ok(Plan {
            template,
            alias,
            folders,
            files,
        })
    }
}
