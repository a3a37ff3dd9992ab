//! Error types for project manifests.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for manifest operations.
pub type ProjectResult<T> = Result<T, ProjectError>;

/// Errors that can occur during manifest operations.
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Project manifest not found at path: {0}")]
    NotFound(PathBuf),

    #[error("Project manifest already exists at path: {0}")]
    AlreadyExists(PathBuf),

    #[error("Invalid project manifest {path}: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
