//! Error types for templates.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur during template operations.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Ambiguous template identifier '{identifier}' matches {} templates: {}", .candidates.len(), .candidates.join(", "))]
    AmbiguousIdentifier {
        identifier: String,
        candidates: Vec<String>,
    },

    #[error("Invalid template {template}: {message}")]
    InvalidTemplate { template: String, message: String },

    #[error("Invalid alias '{alias}': {message}")]
    InvalidAlias { alias: String, message: String },

    #[error("Missing required variable: {0}")]
    MissingRequiredVariable(String),

    #[error("Invalid variable value for {variable}: {message}")]
    InvalidVariable { variable: String, message: String },

    #[error("Template source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
