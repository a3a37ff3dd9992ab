//! Repair drift found by validation.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use scaffold_project::{Change, HistoryAction, ProjectManifest};
use scaffold_templates::{Template, TemplateError};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::reconciler::{write_new_file, Reconciler};
use crate::report::{
    FixAction, FixDescriptor, FixRecord, FixTarget, IssueKind, ValidationIssue, ValidationReport,
};
use crate::validator::add_suggestions;

/// Suggestion attached to every dry-run report.
pub const DRY_RUN_SUGGESTION: &str = "Dry run - no changes were made";

/// Templates and bindings loaded while fixing, keyed by digest.
type TemplateCache = HashMap<String, (Template, HashMap<String, String>)>;

impl Reconciler {
    /// Validate the project owning `path` and repair every auto-fixable error.
    ///
    /// A failed repair becomes a `fix_failed` warning and the run continues.
    /// The manifest is written once, after all filesystem changes.
    pub fn fix(&self, path: &Path, dry_run: bool) -> EngineResult<ValidationReport> {
        let started = Instant::now();
        let (root, mut manifest) = self.locate(path)?;
        let mut report = self.validate_manifest(&root, &manifest)?;

        if report.valid {
            info!("Project {} is valid, nothing to fix", manifest.name);
            return Ok(report);
        }

        let (mut fixable, remaining): (Vec<_>, Vec<_>) = std::mem::take(&mut report.errors)
            .into_iter()
            .partition(ValidationIssue::is_auto_fixable);
        report.errors = remaining;

        // Folders first so files land in existing directories
        fixable.sort_by_key(|issue| match issue.fix.as_ref().map(|f| f.target) {
            Some(FixTarget::Folder) => 0,
            _ => 1,
        });

        info!(
            "Fixing {} issue(s) in {}{}",
            fixable.len(),
            manifest.name,
            if dry_run { " (dry run)" } else { "" }
        );

        let manual: Vec<ValidationIssue> = report
            .errors
            .iter()
            .map(|issue| {
                let mut warning = ValidationIssue::warning(
                    IssueKind::ManualFix,
                    &issue.path,
                    format!("Manual intervention required: {}", issue.message),
                );
                warning.template = issue.template.clone();
                warning.rule_id = issue.rule_id.clone();
                warning
            })
            .collect();
        for warning in manual {
            report.add_warning(warning);
        }

        let mut cache = TemplateCache::new();
        let mut changes = Vec::new();
        for issue in fixable {
            match self.apply_fix(&root, &manifest, &issue, dry_run, &mut cache) {
                Ok(record) => {
                    debug!("Fixed {}", issue.path);
                    changes.push(Change::added(&issue.path, format!("Fixed: {}", issue.message)));
                    report.fixed.push(record);
                }
                Err(e) => {
                    warn!("Could not fix {}: {}", issue.path, e);
                    let mut warning = ValidationIssue::warning(
                        IssueKind::FixFailed,
                        &issue.path,
                        format!("Failed to fix {}: {}", issue.path, e),
                    )
                    .expected(issue.message.clone())
                    .actual(e.to_string());
                    warning.template = issue.template.clone();
                    report.add_warning(warning);
                }
            }
        }

        if !dry_run && !changes.is_empty() {
            manifest.record(HistoryAction::Fix, changes);
            self.manifests.save(&root, &mut manifest)?;
        }

        report.suggestions.clear();
        add_suggestions(&mut report);
        if dry_run {
            report.suggest(DRY_RUN_SUGGESTION);
        }
        report.finish(started);

        info!(
            "Fixed {} issue(s), {} error(s) remain",
            report.fixed.len(),
            report.error_count()
        );
        Ok(report)
    }

    fn apply_fix(
        &self,
        root: &Path,
        manifest: &ProjectManifest,
        issue: &ValidationIssue,
        dry_run: bool,
        cache: &mut TemplateCache,
    ) -> EngineResult<FixRecord> {
        let unsupported = || EngineError::UnsupportedFix {
            action: issue.fix.as_ref().map_or(FixAction::Modify, |f| f.action),
            path: issue.path.clone(),
        };
        let fix = issue.fix.as_ref().ok_or_else(unsupported)?;
        let full = root.join(&issue.path);

        let message = match (fix.action, fix.target) {
            (FixAction::Create, FixTarget::Folder) => {
                if !dry_run {
                    fs::create_dir_all(&full)?;
                }
                format!("Created folder {}", issue.path)
            }
            (FixAction::Create, FixTarget::File) => {
                let content = match &fix.content {
                    Some(content) => content.clone(),
                    None => self.source_backed_content(manifest, issue, fix, cache)?,
                };
                if !dry_run {
                    write_new_file(&full, &content)?;
                }
                format!("Created file {}", issue.path)
            }
            _ => return Err(unsupported()),
        };

        Ok(FixRecord {
            action: fix.action,
            target: fix.target,
            path: issue.path.clone(),
            message,
        })
    }

    /// Load and render the content of a file whose descriptor carries no inline content.
    fn source_backed_content(
        &self,
        manifest: &ProjectManifest,
        issue: &ValidationIssue,
        fix: &FixDescriptor,
        cache: &mut TemplateCache,
    ) -> EngineResult<String> {
        let digest = issue
            .template
            .as_deref()
            .ok_or_else(|| TemplateError::NotFound(issue.path.clone()))?;

        let cached = match cache.entry(digest.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let template = self.store.get(digest)?;
                let vars = self.bindings(manifest, &template)?;
                entry.insert((template, vars))
            }
        };
        let (template, vars) = (&cached.0, &cached.1);

        let file = template
            .files
            .iter()
            .find(|f| {
                f.source == fix.source
                    && self
                        .substitutor
                        .resolve_path(&f.path, &template.root_folder, vars)
                        .is_ok_and(|rel| rel == issue.path)
            })
            .ok_or_else(|| TemplateError::SourceNotFound(PathBuf::from(&issue.path)))?;

        self.file_content(template, file, vars)
    }
}
