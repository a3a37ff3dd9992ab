//! Template definitions.
//!
//! A template describes the folders, files, variables and structural rules a
//! project must carry under a single `root_folder`. Every path a template
//! references lives under that root, which keeps templates with distinct
//! roots from ever touching the same part of a project.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TemplateError, TemplateResult};

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_true() -> bool {
    true
}

/// A content-addressed template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Template {
    /// Content digest. Empty until the template has been added to a store.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Display name
    pub name: String,
    /// Template version
    #[serde(default = "default_version")]
    pub version: String,
    /// Template description
    #[serde(default)]
    pub description: String,
    /// Namespace prefix every folder, file and rule path must fall under
    pub root_folder: String,
    /// Folders the template requires
    #[serde(default)]
    pub folders: Vec<FolderSpec>,
    /// Files the template requires
    #[serde(default)]
    pub files: Vec<FileSpec>,
    /// Variables used for placeholder substitution
    #[serde(default)]
    pub variables: Vec<VariableSpec>,
    /// Structural rules
    #[serde(default)]
    pub rules: RuleSet,
    /// Aliases currently pointing at this template. Filled in by the store.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// A folder required by a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderSpec {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A file required by a template.
///
/// Content is either inline or a reference to source content stored next to
/// the template in the store. A spec with neither produces an empty file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSpec {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Path of the source file relative to the template's `files/` directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// SHA-256 of the source content, so the digest covers external content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Whether the content carries `{{VARIABLE}}` placeholders
    #[serde(default)]
    pub variables: bool,
}

/// Template variable definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariableSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Rule severity levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Info,
}

/// How existing files are treated when a template is applied on top of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    #[default]
    Skip,
    Overwrite,
    Merge,
    Prompt,
}

/// Kind of filesystem entry an existence rule expects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    File,
    Folder,
    #[default]
    Any,
}

/// Check performed by a structural rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCheck {
    /// Target must (or must not) exist.
    Existence {
        #[serde(default)]
        kind: PathKind,
        #[serde(default = "default_true")]
        present: bool,
    },
    /// Target file content must (or must not) match a regex.
    Pattern {
        regex: String,
        #[serde(default = "default_true")]
        must_match: bool,
    },
    /// Target must carry the given octal permission bits.
    Permission { mode: String },
}

/// A named structural rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuralRule {
    pub id: String,
    pub target: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    pub check: RuleCheck,
}

/// Rule set governing how strictly a template is enforced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleSet {
    /// Unexpected entries are errors instead of warnings
    #[serde(default)]
    pub strict: bool,
    #[serde(default = "default_true")]
    pub allow_extra_files: bool,
    #[serde(default = "default_true")]
    pub allow_extra_folders: bool,
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
    /// Glob patterns excluded from validation
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub rules: Vec<StructuralRule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            strict: false,
            allow_extra_files: true,
            allow_extra_folders: true,
            conflict_resolution: ConflictResolution::default(),
            exclude: Vec::new(),
            rules: Vec::new(),
        }
    }
}

impl Template {
    /// Create an empty template rooted at `root_folder`.
    pub fn new(name: impl Into<String>, root_folder: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            name: name.into(),
            version: default_version(),
            description: String::new(),
            root_folder: root_folder.into(),
            folders: Vec::new(),
            files: Vec::new(),
            variables: Vec::new(),
            rules: RuleSet::default(),
            aliases: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_folder(mut self, path: impl Into<String>) -> Self {
        self.folders.push(FolderSpec {
            path: path.into(),
            description: None,
        });
        self
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let variables = content.contains("{{");
        self.files.push(FileSpec {
            path: path.into(),
            content: Some(content),
            source: None,
            checksum: None,
            variables,
        });
        self
    }

    pub fn with_variable(mut self, variable: VariableSpec) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_rule(mut self, rule: StructuralRule) -> Self {
        self.rules.rules.push(rule);
        self
    }

    /// Short form of the digest, as printed to users.
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(12)]
    }

    /// Get required variables.
    pub fn required_variables(&self) -> Vec<&VariableSpec> {
        self.variables.iter().filter(|v| v.required).collect()
    }

    /// Whether `path` equals the root folder or lies beneath it.
    pub fn is_under_root(&self, path: &str) -> bool {
        is_under(path, &self.root_folder)
    }

    /// Collect every structural problem with the template definition.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push("Template name cannot be empty".to_string());
        }

        if let Some(problem) = relative_path_problem(&self.root_folder) {
            issues.push(format!("root_folder '{}' {}", self.root_folder, problem));
            return issues;
        }

        let mut seen = HashSet::new();
        for folder in &self.folders {
            self.check_path("folder", &folder.path, &mut issues);
            if !seen.insert(folder.path.as_str()) {
                issues.push(format!("Duplicate folder path: {}", folder.path));
            }
        }

        let mut seen = HashSet::new();
        for file in &self.files {
            self.check_path("file", &file.path, &mut issues);
            if file.path == self.root_folder {
                issues.push(format!("File path cannot be the root folder: {}", file.path));
            }
            if !seen.insert(file.path.as_str()) {
                issues.push(format!("Duplicate file path: {}", file.path));
            }
            if file.content.is_some() && file.source.is_some() {
                issues.push(format!(
                    "File '{}' declares both inline content and a source",
                    file.path
                ));
            }
            if let Some(source) = &file.source {
                if let Some(problem) = relative_path_problem(source) {
                    issues.push(format!("source '{}' of file '{}' {}", source, file.path, problem));
                }
            }
        }

        let mut seen = HashSet::new();
        for var in &self.variables {
            if !seen.insert(var.name.as_str()) {
                issues.push(format!("Duplicate variable: {}", var.name));
            }
            if let Some(pattern) = &var.pattern {
                if let Err(e) = regex::Regex::new(pattern) {
                    issues.push(format!("Variable '{}' has invalid pattern: {}", var.name, e));
                }
            }
        }

        for pattern in &self.rules.exclude {
            if let Err(e) = glob::Pattern::new(pattern) {
                issues.push(format!("Invalid exclude pattern '{}': {}", pattern, e));
            }
        }

        let mut seen = HashSet::new();
        for rule in &self.rules.rules {
            self.check_path("rule target", &rule.target, &mut issues);
            if !seen.insert(rule.id.as_str()) {
                issues.push(format!("Duplicate rule id: {}", rule.id));
            }
            match &rule.check {
                RuleCheck::Pattern { regex, .. } => {
                    if let Err(e) = regex::Regex::new(regex) {
                        issues.push(format!("Rule '{}' has invalid regex: {}", rule.id, e));
                    }
                }
                RuleCheck::Permission { mode } => {
                    if parse_mode(mode).is_none() {
                        issues.push(format!(
                            "Rule '{}' has invalid permission mode: {}",
                            rule.id, mode
                        ));
                    }
                }
                RuleCheck::Existence { .. } => {}
            }
        }

        issues
    }

    /// Validate the template definition.
    pub fn validate(&self) -> TemplateResult<()> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(TemplateError::InvalidTemplate {
                template: self.name.clone(),
                message: issues.join("; "),
            })
        }
    }

    fn check_path(&self, what: &str, path: &str, issues: &mut Vec<String>) {
        if let Some(problem) = relative_path_problem(path) {
            issues.push(format!("{} path '{}' {}", what, path, problem));
        } else if !self.is_under_root(path) {
            issues.push(format!(
                "{} path '{}' is outside root folder '{}'",
                what, path, self.root_folder
            ));
        }
    }
}

/// Parse an octal permission string such as `755` or `0644`.
pub fn parse_mode(mode: &str) -> Option<u32> {
    u32::from_str_radix(mode.trim_start_matches("0o"), 8)
        .ok()
        .filter(|m| *m <= 0o7777)
}

pub(crate) fn is_under(path: &str, root: &str) -> bool {
    path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub(crate) fn relative_path_problem(path: &str) -> Option<&'static str> {
    if path.is_empty() {
        Some("is empty")
    } else if path.starts_with('/') || path.starts_with('\\') || path.contains(':') {
        Some("must be relative")
    } else if path.contains('\\') {
        Some("must use '/' as separator")
    } else if path.ends_with('/') {
        Some("must not end with '/'")
    } else if path.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
        Some("must not contain empty, '.' or '..' components")
    } else {
        None
    }
}
