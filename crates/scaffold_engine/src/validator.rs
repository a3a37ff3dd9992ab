//! Compare a project tree with the templates applied to it.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;

use glob::Pattern;
use regex::Regex;
use scaffold_project::{HistoryAction, ManifestStore, ProjectManifest};
use scaffold_templates::{
    PathKind, RuleCheck, Severity, StructuralRule, Template, TemplateError, TemplateResult,
};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::EngineResult;
use crate::reconciler::{relative_path, Reconciler};
use crate::report::{FixDescriptor, FixTarget, IssueKind, ValidationIssue, ValidationReport};

/// An applied template loaded for checking, with its resolved bindings.
struct LoadedTemplate {
    template: Template,
    vars: HashMap<String, String>,
    /// False when a required variable could not be bound
    bindings_complete: bool,
}

/// Every folder and file path the active templates expect.
#[derive(Debug, Default)]
struct ExpectedTree {
    folders: BTreeSet<String>,
    files: BTreeSet<String>,
}

impl ExpectedTree {
    fn contains(&self, path: &str) -> bool {
        self.folders.contains(path) || self.files.contains(path)
    }

    /// Whether a directory is expected, either itself or as a parent of an expected path.
    fn expects_dir(&self, path: &str) -> bool {
        let prefix = format!("{}/", path);
        self.folders.contains(path)
            || self
                .folders
                .iter()
                .chain(self.files.iter())
                .any(|p| p.starts_with(&prefix))
    }
}

/// Outcome of evaluating one structural rule.
#[derive(Debug, PartialEq, Eq)]
enum RuleOutcome {
    Passed,
    Violated { expected: String, actual: String },
    /// Nothing to check, e.g. the target is absent
    Skipped(String),
    /// The check cannot run on this platform
    Unsupported(String),
}

impl Reconciler {
    /// Validate the project owning `path`.
    pub fn validate(&self, path: &Path) -> EngineResult<ValidationReport> {
        let (root, manifest) = self.locate(path)?;
        self.validate_manifest(&root, &manifest)
    }

    /// Validate and append a `check` entry to the project history.
    pub fn check(&self, path: &Path) -> EngineResult<ValidationReport> {
        let (root, mut manifest) = self.locate(path)?;
        let report = self.validate_manifest(&root, &manifest)?;
        manifest.record(HistoryAction::Check, Vec::new());
        self.manifests.save(&root, &mut manifest)?;
        Ok(report)
    }

    /// Validate a project whose manifest is already loaded.
    pub fn validate_manifest(
        &self,
        root: &Path,
        manifest: &ProjectManifest,
    ) -> EngineResult<ValidationReport> {
        let started = Instant::now();
        info!("Validating project {} at {:?}", manifest.name, root);

        let mut report = ValidationReport::new(root, &manifest.name);
        let loaded = self.load_templates(manifest, &mut report)?;

        let mut expected = ExpectedTree::default();
        for item in &loaded {
            // Paths escaping their root are reported by the folder and file checks
            for folder in &item.template.folders {
                if let Ok(rel) = self.resolve(item, &folder.path) {
                    expected.folders.insert(rel);
                }
            }
            for file in &item.template.files {
                if let Ok(rel) = self.resolve(item, &file.path) {
                    expected.files.insert(rel);
                }
            }
        }

        for item in &loaded {
            report.stats.templates_checked += 1;
            self.check_folders(root, item, &mut report);
            self.check_files(root, item, &mut report);
            self.check_extras(root, item, &expected, &mut report);
            self.check_rules(root, item, &mut report);
        }

        add_suggestions(&mut report);
        report.finish(started);

        info!(
            "Validation finished: {} error(s), {} warning(s)",
            report.error_count(),
            report.warning_count()
        );
        Ok(report)
    }

    /// Load every active template. Missing ones are reported, corrupt ones abort.
    fn load_templates(
        &self,
        manifest: &ProjectManifest,
        report: &mut ValidationReport,
    ) -> EngineResult<Vec<LoadedTemplate>> {
        let mut loaded = Vec::new();

        for applied in manifest.active_templates() {
            report.templates.push(applied.digest.clone());

            let template = match self.store.get(&applied.digest) {
                Ok(template) => template,
                Err(TemplateError::NotFound(_)) => {
                    warn!("Template {} is not in the store", applied.digest);
                    let name = applied.alias.as_deref().unwrap_or(&applied.digest);
                    report.push(
                        ValidationIssue::error(
                            IssueKind::MissingTemplate,
                            &applied.root_folder,
                            format!("Template {} is not available in the template store", name),
                        )
                        .template(&applied.digest)
                        .expected("stored template")
                        .actual("missing"),
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let (vars, bindings_complete) = match self.bindings(manifest, &template) {
                Ok(vars) => (vars, true),
                Err(TemplateError::MissingRequiredVariable(name)) => {
                    report.push(
                        ValidationIssue::error(
                            IssueKind::MissingVariable,
                            &template.root_folder,
                            format!("Required variable {} has no binding", name),
                        )
                        .template(&template.id)
                        .expected(format!("binding for {}", name))
                        .actual("unbound"),
                    );
                    (self.base_variables(manifest), false)
                }
                Err(TemplateError::InvalidVariable { variable, message }) => {
                    let base = self.base_variables(manifest);
                    let mut issue = ValidationIssue::error(
                        IssueKind::InvalidVariable,
                        &template.root_folder,
                        format!("Variable {} is invalid: {}", variable, message),
                    )
                    .template(&template.id);
                    if let Some(pattern) = template
                        .variables
                        .iter()
                        .find(|v| v.name == variable)
                        .and_then(|v| v.pattern.as_deref())
                    {
                        issue = issue.expected(format!("value matching {}", pattern));
                    }
                    if let Some(value) = base.get(&variable) {
                        issue = issue.actual(value.as_str());
                    }
                    report.push(issue);
                    (base, false)
                }
                Err(e) => return Err(e.into()),
            };

            debug!("Loaded template {} ({})", template.name, template.short_id());
            loaded.push(LoadedTemplate {
                template,
                vars,
                bindings_complete,
            });
        }

        Ok(loaded)
    }

    fn check_folders(&self, root: &Path, item: &LoadedTemplate, report: &mut ValidationReport) {
        for folder in &item.template.folders {
            report.stats.folders_checked += 1;
            let rel = match self.resolve(item, &folder.path) {
                Ok(rel) => rel,
                Err(e) => {
                    self.push_invalid_path(item, &folder.path, e, report);
                    continue;
                }
            };
            let full = root.join(&rel);

            if full.is_dir() {
                continue;
            }

            if full.exists() {
                report.push(
                    ValidationIssue::error(
                        IssueKind::TypeMismatch,
                        &rel,
                        format!("Expected folder {} but found a file", rel),
                    )
                    .template(&item.template.id)
                    .expected("folder")
                    .actual("file"),
                );
                continue;
            }

            let mut fix = FixDescriptor::create_folder();
            if !self.can_auto_fix(item, &rel) {
                fix = fix.manual();
            }
            debug!("Missing folder {}", rel);
            report.push(
                ValidationIssue::error(
                    IssueKind::MissingFolder,
                    &rel,
                    format!("Required folder {} is missing", rel),
                )
                .template(&item.template.id)
                .expected("folder")
                .actual("missing")
                .fix(fix),
            );
        }
    }

    fn check_files(&self, root: &Path, item: &LoadedTemplate, report: &mut ValidationReport) {
        for file in &item.template.files {
            report.stats.files_checked += 1;
            let rel = match self.resolve(item, &file.path) {
                Ok(rel) => rel,
                Err(e) => {
                    self.push_invalid_path(item, &file.path, e, report);
                    continue;
                }
            };
            let full = root.join(&rel);

            // Present files are not compared; substituted content is allowed to drift
            if full.is_file() {
                continue;
            }

            if full.exists() {
                report.push(
                    ValidationIssue::error(
                        IssueKind::TypeMismatch,
                        &rel,
                        format!("Expected file {} but found a folder", rel),
                    )
                    .template(&item.template.id)
                    .expected("file")
                    .actual("folder"),
                );
                continue;
            }

            let content = file
                .content
                .as_ref()
                .map(|raw| self.render(file, raw, &item.vars));
            let mut fix = FixDescriptor::create_file(content, file.source.clone());
            if !self.can_auto_fix(item, &rel) {
                fix = fix.manual();
            }
            debug!("Missing file {}", rel);
            report.push(
                ValidationIssue::error(
                    IssueKind::MissingFile,
                    &rel,
                    format!("Required file {} is missing", rel),
                )
                .template(&item.template.id)
                .expected("file")
                .actual("missing")
                .fix(fix),
            );
        }
    }

    fn can_auto_fix(&self, item: &LoadedTemplate, rel: &str) -> bool {
        item.bindings_complete && self.substitutor.unbound(rel, &item.vars).is_empty()
    }

    /// Substitute a template path, keeping it under the template's root folder.
    fn resolve(&self, item: &LoadedTemplate, path: &str) -> TemplateResult<String> {
        self.substitutor
            .resolve_path(path, &item.template.root_folder, &item.vars)
    }

    /// Report a path whose bindings move it out of its root folder. It is never fixed.
    fn push_invalid_path(
        &self,
        item: &LoadedTemplate,
        path: &str,
        error: TemplateError,
        report: &mut ValidationReport,
    ) {
        warn!("Not checking {}: {}", path, error);
        report.push(
            ValidationIssue::error(IssueKind::InvalidVariable, path, error.to_string())
                .template(&item.template.id)
                .expected(format!("path under {}", item.template.root_folder))
                .actual(self.substitutor.substitute_path(path, &item.vars)),
        );
    }

    fn check_extras(
        &self,
        root: &Path,
        item: &LoadedTemplate,
        expected: &ExpectedTree,
        report: &mut ValidationReport,
    ) {
        let rules = &item.template.rules;
        if rules.allow_extra_files && rules.allow_extra_folders {
            return;
        }

        let Ok(base) = self.resolve(item, &item.template.root_folder) else {
            return;
        };
        let base = root.join(base);
        if !base.is_dir() {
            return;
        }

        let excludes: Vec<Pattern> = rules
            .exclude
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring exclude pattern {}: {}", p, e);
                    None
                }
            })
            .collect();
        let severity = if rules.strict {
            Severity::Error
        } else {
            Severity::Warning
        };

        let mut walker = WalkDir::new(&base)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let rel = relative_path(root, e.path().unwrap_or(base.as_path()));
                    warn!("Cannot read {}: {}", rel, e);
                    report.push(
                        ValidationIssue::warning(
                            IssueKind::Unreadable,
                            &rel,
                            format!("Could not read {}: {}", rel, e),
                        )
                        .template(&item.template.id),
                    );
                    continue;
                }
            };
            let rel = relative_path(root, entry.path());
            let name = entry.file_name().to_string_lossy();
            let is_dir = entry.file_type().is_dir();

            let excluded = name == ManifestStore::METADATA_DIR
                || excludes
                    .iter()
                    .any(|p| p.matches(&rel) || p.matches(&name));
            if excluded {
                if is_dir {
                    walker.skip_current_dir();
                }
                continue;
            }

            if is_dir {
                if expected.expects_dir(&rel) || rules.allow_extra_folders {
                    continue;
                }
                report.push(
                    ValidationIssue::new(
                        IssueKind::UnexpectedFolder,
                        severity,
                        &rel,
                        format!("Folder {} is not part of template {}", rel, item.template.name),
                    )
                    .template(&item.template.id)
                    .expected("absent")
                    .actual("folder")
                    .fix(FixDescriptor::delete(FixTarget::Folder)),
                );
                // Contents of an unexpected folder are covered by this one issue
                walker.skip_current_dir();
            } else if !expected.contains(&rel) && !rules.allow_extra_files {
                report.push(
                    ValidationIssue::new(
                        IssueKind::UnexpectedFile,
                        severity,
                        &rel,
                        format!("File {} is not part of template {}", rel, item.template.name),
                    )
                    .template(&item.template.id)
                    .expected("absent")
                    .actual("file")
                    .fix(FixDescriptor::delete(FixTarget::File)),
                );
            }
        }
    }

    fn check_rules(&self, root: &Path, item: &LoadedTemplate, report: &mut ValidationReport) {
        for rule in &item.template.rules.rules {
            report.stats.rules_checked += 1;
            let rel = match self.resolve(item, &rule.target) {
                Ok(rel) => rel,
                Err(e) => {
                    self.push_invalid_path(item, &rule.target, e, report);
                    continue;
                }
            };

            let outcome = match evaluate_rule(rule, &root.join(&rel)) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Rule {} could not read {}: {}", rule.id, rel, e);
                    report.push(
                        ValidationIssue::warning(
                            IssueKind::Unreadable,
                            &rel,
                            format!("Rule {} could not read {}: {}", rule.id, rel, e),
                        )
                        .template(&item.template.id)
                        .rule(&rule.id),
                    );
                    continue;
                }
            };

            match outcome {
                RuleOutcome::Passed => debug!("Rule {} passed", rule.id),
                RuleOutcome::Skipped(reason) => debug!("Rule {} skipped: {}", rule.id, reason),
                RuleOutcome::Unsupported(reason) => {
                    report.push(
                        ValidationIssue::new(IssueKind::RuleViolation, Severity::Info, &rel, reason)
                            .template(&item.template.id)
                            .rule(&rule.id),
                    );
                }
                RuleOutcome::Violated { expected, actual } => {
                    let message = if rule.description.is_empty() {
                        format!("Rule {} failed for {}", rule.id, rel)
                    } else {
                        format!("{} ({})", rule.description, rel)
                    };
                    report.push(
                        ValidationIssue::new(IssueKind::RuleViolation, rule.severity, &rel, message)
                            .template(&item.template.id)
                            .rule(&rule.id)
                            .expected(expected)
                            .actual(actual),
                    );
                }
            }
        }
    }
}

fn describe(path: &Path) -> &'static str {
    if path.is_dir() {
        "folder"
    } else if path.exists() {
        "file"
    } else {
        "missing"
    }
}

fn evaluate_rule(rule: &StructuralRule, target: &Path) -> io::Result<RuleOutcome> {
    let outcome = match &rule.check {
        RuleCheck::Existence { kind, present } => {
            let found = match kind {
                PathKind::File => target.is_file(),
                PathKind::Folder => target.is_dir(),
                PathKind::Any => target.exists(),
            };
            if found == *present {
                RuleOutcome::Passed
            } else {
                let wanted = match kind {
                    PathKind::File => "file",
                    PathKind::Folder => "folder",
                    PathKind::Any => "entry",
                };
                RuleOutcome::Violated {
                    expected: if *present {
                        wanted.to_string()
                    } else {
                        format!("no {}", wanted)
                    },
                    actual: describe(target).to_string(),
                }
            }
        }
        RuleCheck::Pattern { regex, must_match } => {
            if !target.is_file() {
                return Ok(RuleOutcome::Skipped("target is not a file".to_string()));
            }
            let re = match Regex::new(regex) {
                Ok(re) => re,
                Err(e) => return Ok(RuleOutcome::Skipped(format!("invalid regex: {}", e))),
            };
            let bytes = fs::read(target)?;
            let content = String::from_utf8_lossy(&bytes);
            if re.is_match(&content) == *must_match {
                RuleOutcome::Passed
            } else if *must_match {
                RuleOutcome::Violated {
                    expected: format!("content matching {}", regex),
                    actual: "no match".to_string(),
                }
            } else {
                RuleOutcome::Violated {
                    expected: format!("content not matching {}", regex),
                    actual: "match".to_string(),
                }
            }
        }
        RuleCheck::Permission { mode } => check_permission(mode, target)?,
    };
    Ok(outcome)
}

#[cfg(unix)]
fn check_permission(mode: &str, target: &Path) -> io::Result<RuleOutcome> {
    use std::os::unix::fs::PermissionsExt;

    let Some(expected) = scaffold_templates::template::parse_mode(mode) else {
        return Ok(RuleOutcome::Skipped(format!("invalid mode {}", mode)));
    };
    if !target.exists() {
        return Ok(RuleOutcome::Skipped("target does not exist".to_string()));
    }

    let actual = fs::metadata(target)?.permissions().mode() & 0o7777;
    if actual == expected {
        Ok(RuleOutcome::Passed)
    } else {
        Ok(RuleOutcome::Violated {
            expected: format!("{:o}", expected),
            actual: format!("{:o}", actual),
        })
    }
}

#[cfg(not(unix))]
fn check_permission(mode: &str, _target: &Path) -> io::Result<RuleOutcome> {
    Ok(RuleOutcome::Unsupported(format!(
        "Permission check for mode {} is not supported on this platform",
        mode
    )))
}

/// Hints derived from the issues in a report.
pub(crate) fn add_suggestions(report: &mut ValidationReport) {
    let fixable = report.auto_fixable_count();
    if fixable > 0 {
        report.suggest(format!(
            "Run `scaffold fix` to repair {} auto-fixable issue(s)",
            fixable
        ));
    }
    if report.errors.iter().any(|e| e.kind == IssueKind::MissingTemplate) {
        report.suggest("Add the missing templates back to the store or mark them removed");
    }
    if report
        .errors
        .iter()
        .any(|e| matches!(e.kind, IssueKind::MissingVariable | IssueKind::InvalidVariable))
    {
        report.suggest("Bind the missing variables with `scaffold extend --var NAME=VALUE`");
    }
    if report
        .warnings
        .iter()
        .chain(report.errors.iter())
        .any(|e| matches!(e.kind, IssueKind::UnexpectedFile | IssueKind::UnexpectedFolder))
    {
        report.suggest("Remove unexpected entries or add them to the template's exclude patterns");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn rule(check: RuleCheck) -> StructuralRule {
        StructuralRule {
            id: "r1".to_string(),
            target: "app/README.md".to_string(),
            severity: Severity::Warning,
            description: String::new(),
            check,
        }
    }

    #[test]
    fn test_expected_tree_parents() {
        let mut tree = ExpectedTree::default();
        tree.files.insert("app/src/main.rs".to_string());
        assert!(tree.expects_dir("app"));
        assert!(tree.expects_dir("app/src"));
        assert!(!tree.expects_dir("app/sr"));
        assert!(!tree.expects_dir("app/tests"));
    }

    #[test]
    fn test_existence_rule() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("README.md");
        let present = rule(RuleCheck::Existence {
            kind: PathKind::File,
            present: true,
        });

        let outcome = evaluate_rule(&present, &target).unwrap();
        assert_eq!(
            outcome,
            RuleOutcome::Violated {
                expected: "file".to_string(),
                actual: "missing".to_string()
            }
        );

        fs::write(&target, "# demo").unwrap();
        assert_eq!(evaluate_rule(&present, &target).unwrap(), RuleOutcome::Passed);

        let absent = rule(RuleCheck::Existence {
            kind: PathKind::Any,
            present: false,
        });
        assert!(matches!(
            evaluate_rule(&absent, &target).unwrap(),
            RuleOutcome::Violated { .. }
        ));
    }

    #[test]
    fn test_pattern_rule() {
        let temp = tempdir().unwrap();
        let target = temp.path().join("README.md");
        let must = rule(RuleCheck::Pattern {
            regex: "^# ".to_string(),
            must_match: true,
        });

        assert!(matches!(
            evaluate_rule(&must, &target).unwrap(),
            RuleOutcome::Skipped(_)
        ));

        fs::write(&target, "no heading").unwrap();
        assert!(matches!(
            evaluate_rule(&must, &target).unwrap(),
            RuleOutcome::Violated { .. }
        ));

        let must_not = rule(RuleCheck::Pattern {
            regex: "TODO".to_string(),
            must_match: false,
        });
        assert_eq!(evaluate_rule(&must_not, &target).unwrap(), RuleOutcome::Passed);
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_rule() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let target = temp.path().join("run.sh");
        fs::write(&target, "#!/bin/sh").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o644)).unwrap();

        let check = rule(RuleCheck::Permission {
            mode: "755".to_string(),
        });
        assert_eq!(
            evaluate_rule(&check, &target).unwrap(),
            RuleOutcome::Violated {
                expected: "755".to_string(),
                actual: "644".to_string()
            }
        );

        fs::set_permissions(&target, fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(evaluate_rule(&check, &target).unwrap(), RuleOutcome::Passed);
    }
}
