//! Error types for the reconciliation engine.

use std::path::PathBuf;

use scaffold_project::ProjectError;
use scaffold_templates::TemplateError;
use serde::Serialize;
use thiserror::Error;

use crate::report::FixAction;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that abort a reconciliation run.
///
/// Structural drift is never an error; it is reported as data in a
/// [`ValidationReport`](crate::ValidationReport).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error("Not a scaffold project (no manifest found from {0})")]
    NotManaged(PathBuf),

    #[error("Fix action {action:?} cannot be applied automatically to {path}")]
    UnsupportedFix { action: FixAction, path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of engine errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AmbiguousIdentifier,
    MissingRequiredVariable,
    AlreadyExists,
    ValidationFailure,
    FixFailure,
    Io,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Template(e) => match e {
                TemplateError::NotFound(_) | TemplateError::SourceNotFound(_) => ErrorKind::NotFound,
                TemplateError::AmbiguousIdentifier { .. } => ErrorKind::AmbiguousIdentifier,
                TemplateError::MissingRequiredVariable(_) => ErrorKind::MissingRequiredVariable,
                TemplateError::Io(_) => ErrorKind::Io,
                TemplateError::InvalidTemplate { .. }
                | TemplateError::InvalidAlias { .. }
                | TemplateError::InvalidVariable { .. }
                | TemplateError::Yaml(_)
                | TemplateError::Json(_) => ErrorKind::ValidationFailure,
            },
            EngineError::Project(e) => match e {
                ProjectError::NotFound(_) => ErrorKind::NotFound,
                ProjectError::AlreadyExists(_) => ErrorKind::AlreadyExists,
                ProjectError::Io(_) => ErrorKind::Io,
                ProjectError::InvalidManifest { .. } | ProjectError::Yaml(_) => {
                    ErrorKind::ValidationFailure
                }
            },
            EngineError::NotManaged(_) => ErrorKind::NotFound,
            EngineError::UnsupportedFix { .. } => ErrorKind::FixFailure,
            EngineError::Io(_) => ErrorKind::Io,
        }
    }
}
