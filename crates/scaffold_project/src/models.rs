//! Data models for project manifests.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether an applied template is still enforced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStatus {
    #[default]
    Active,
    Removed,
}

/// A conflict detected while applying a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conflict {
    pub path: String,
    pub message: String,
}

/// Record of a template applied to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedTemplate {
    pub digest: String,
    /// Alias the template was requested by, if any
    #[serde(default)]
    pub alias: Option<String>,
    pub root_folder: String,
    pub applied_by: String,
    pub applied_at: DateTime<Utc>,
    #[serde(default)]
    pub status: TemplateStatus,
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
}

impl AppliedTemplate {
    pub fn new(
        digest: impl Into<String>,
        root_folder: impl Into<String>,
        applied_by: impl Into<String>,
    ) -> Self {
        Self {
            digest: digest.into(),
            alias: None,
            root_folder: root_folder.into(),
            applied_by: applied_by.into(),
            applied_at: Utc::now(),
            status: TemplateStatus::Active,
            conflicts: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == TemplateStatus::Active
    }
}

/// Action recorded in the project history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    Extend,
    Check,
    Fix,
}

/// How a path changed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
}

/// A single change to the project tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Change {
    pub change_type: ChangeType,
    pub path: String,
    pub reason: String,
}

impl Change {
    pub fn added(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            change_type: ChangeType::Added,
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn modified(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            change_type: ChangeType::Modified,
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// One entry of the append-only history log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub action: HistoryAction,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

/// Per-project record of applied templates, bindings and history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub templates: Vec<AppliedTemplate>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl ProjectManifest {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            templates: Vec::new(),
            variables: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    /// Templates still enforced on the project, in application order.
    pub fn active_templates(&self) -> impl Iterator<Item = &AppliedTemplate> {
        self.templates.iter().filter(|t| t.is_active())
    }

    /// Find the active record for a digest.
    pub fn active_template(&self, digest: &str) -> Option<&AppliedTemplate> {
        self.active_templates().find(|t| t.digest == digest)
    }

    /// Variable bindings as a lookup map.
    pub fn variable_map(&self) -> HashMap<String, String> {
        self.variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Merge bindings, letting `variables` win over existing values.
    pub fn merge_variables(&mut self, variables: &HashMap<String, String>) {
        for (k, v) in variables {
            self.variables.insert(k.clone(), v.clone());
        }
    }

    /// Append a history entry.
    pub fn record(&mut self, action: HistoryAction, changes: Vec<Change>) -> &HistoryEntry {
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            action,
            timestamp: Utc::now(),
            changes,
        };
        self.history.push(entry);
        &self.history[self.history.len() - 1]
    }

    /// History entries for a given action.
    pub fn history_for(&self, action: HistoryAction) -> Vec<&HistoryEntry> {
        self.history.iter().filter(|h| h.action == action).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_templates() {
        let mut manifest = ProjectManifest::new("demo");
        manifest.templates.push(AppliedTemplate::new("aaa", "app", "dev"));
        let mut removed = AppliedTemplate::new("bbb", "web", "dev");
        removed.status = TemplateStatus::Removed;
        manifest.templates.push(removed);

        let active: Vec<_> = manifest.active_templates().map(|t| t.digest.as_str()).collect();
        assert_eq!(active, vec!["aaa"]);
        assert!(manifest.active_template("bbb").is_none());
    }

    #[test]
    fn test_record_appends() {
        let mut manifest = ProjectManifest::new("demo");
        manifest.record(HistoryAction::Create, vec![Change::added("app", "Created")]);
        manifest.record(HistoryAction::Fix, vec![Change::added("app/src", "Fixed: missing")]);

        assert_eq!(manifest.history.len(), 2);
        assert_eq!(manifest.history_for(HistoryAction::Fix).len(), 1);
        assert_eq!(manifest.history[1].changes[0].change_type, ChangeType::Added);
    }

    #[test]
    fn test_status_serialization() {
        let yaml = serde_yaml::to_string(&TemplateStatus::Removed).unwrap();
        assert_eq!(yaml.trim(), "removed");
    }
}
