//! Validation report model.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
pub use scaffold_templates::Severity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of drift an issue describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingFolder,
    MissingFile,
    UnexpectedFolder,
    UnexpectedFile,
    TypeMismatch,
    RuleViolation,
    MissingTemplate,
    MissingVariable,
    /// A bound value breaks its pattern or moves a path out of its root folder
    InvalidVariable,
    /// An entry could not be read while scanning
    Unreadable,
    FixFailed,
    ManualFix,
}

/// Repair action proposed for an issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FixAction {
    Create,
    Delete,
    Modify,
}

/// Kind of entry a fix touches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FixTarget {
    File,
    Folder,
}

/// How an issue can be repaired.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixDescriptor {
    pub action: FixAction,
    pub target: FixTarget,
    /// Resolved content, when known at validation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Template source the content is loaded from otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub auto_fix: bool,
}

impl FixDescriptor {
    pub fn create_folder() -> Self {
        Self {
            action: FixAction::Create,
            target: FixTarget::Folder,
            content: None,
            source: None,
            auto_fix: true,
        }
    }

    pub fn create_file(content: Option<String>, source: Option<String>) -> Self {
        Self {
            action: FixAction::Create,
            target: FixTarget::File,
            content,
            source,
            auto_fix: true,
        }
    }

    pub fn delete(target: FixTarget) -> Self {
        Self {
            action: FixAction::Delete,
            target,
            content: None,
            source: None,
            auto_fix: false,
        }
    }

    pub fn manual(mut self) -> Self {
        self.auto_fix = false;
        self
    }
}

/// A single finding of a validation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    /// Digest of the owning template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixDescriptor>,
}

impl ValidationIssue {
    pub fn new(
        kind: IssueKind,
        severity: Severity,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            template: None,
            rule_id: None,
            path: path.into(),
            expected: None,
            actual: None,
            message: message.into(),
            fix: None,
        }
    }

    pub fn error(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, path, message)
    }

    pub fn warning(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, path, message)
    }

    pub fn template(mut self, digest: impl Into<String>) -> Self {
        self.template = Some(digest.into());
        self
    }

    pub fn rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    pub fn fix(mut self, fix: FixDescriptor) -> Self {
        self.fix = Some(fix);
        self
    }

    /// Whether the engine may repair this issue without human judgment.
    pub fn is_auto_fixable(&self) -> bool {
        self.fix.as_ref().is_some_and(|f| f.auto_fix)
    }
}

/// A repair performed (or planned, in a dry run) by the fix engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixRecord {
    pub action: FixAction,
    pub target: FixTarget,
    pub path: String,
    pub message: String,
}

/// Counters collected during a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationStats {
    pub files_checked: usize,
    pub folders_checked: usize,
    pub templates_checked: usize,
    pub rules_checked: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub duration_ms: u64,
}

/// Result of validating (and possibly fixing) a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub project_path: PathBuf,
    pub project_name: String,
    /// Digests of the templates that were checked
    pub templates: Vec<String>,
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixed: Vec<FixRecord>,
    pub stats: ValidationStats,
}

impl ValidationReport {
    pub fn new(project_path: &Path, project_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            project_path: project_path.to_path_buf(),
            project_name: project_name.into(),
            templates: Vec::new(),
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
            fixed: Vec::new(),
            stats: ValidationStats::default(),
        }
    }

    /// Record an issue, routed by severity.
    pub fn push(&mut self, issue: ValidationIssue) {
        if issue.severity == Severity::Error {
            self.errors.push(issue);
            self.valid = false;
        } else {
            self.warnings.push(issue);
        }
    }

    pub fn add_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    pub fn suggest(&mut self, suggestion: impl Into<String>) {
        self.suggestions.push(suggestion.into());
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Number of errors the fix engine can repair on its own.
    pub fn auto_fixable_count(&self) -> usize {
        self.errors.iter().filter(|e| e.is_auto_fixable()).count()
    }

    /// Recompute counters and validity from the current issue lists.
    pub fn finish(&mut self, started: Instant) {
        self.stats.error_count = self.errors.len();
        self.stats.warning_count = self.warnings.len();
        self.stats.duration_ms = started.elapsed().as_millis() as u64;
        self.valid = self.errors.is_empty();
    }
}
