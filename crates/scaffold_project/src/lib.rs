//! # scaffold_project
//!
//! Project manifests for scaffold.
//!
//! Every managed project carries `.scaffold/project.yaml` at its root. The
//! manifest records which templates are applied, the variable bindings used
//! to render them, and an append-only history of create, extend, check and
//! fix actions. Only [`ManifestStore`] reads or writes it.

pub mod error;
pub mod models;
pub mod store;

pub use error::{ProjectError, ProjectResult};
pub use models::{
    AppliedTemplate, Change, ChangeType, Conflict, HistoryAction, HistoryEntry, ProjectManifest,
    TemplateStatus,
};
pub use store::ManifestStore;
