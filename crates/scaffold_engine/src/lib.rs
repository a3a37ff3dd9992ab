//! # scaffold_engine
//!
//! Reconciliation of project trees with their templates.
//!
//! The [`Reconciler`] ties the template store and the project manifest
//! together:
//!
//! - [`Reconciler::validate`] compares the tree on disk with every active
//!   template and returns a [`ValidationReport`]. Drift is reported as data;
//!   only environment failures are errors.
//! - [`Reconciler::fix`] repairs auto-fixable errors, folders before files,
//!   and turns individual failures into warnings instead of aborting.
//! - [`Reconciler::create`] and [`Reconciler::extend`] apply templates to a
//!   project and record what they did in its history.

pub mod apply;
pub mod error;
pub mod fixer;
pub mod reconciler;
pub mod report;
pub mod validator;

pub use apply::{ApplyOptions, ApplyOutcome};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use fixer::DRY_RUN_SUGGESTION;
pub use reconciler::{Reconciler, PROJECT_NAME_VARIABLE};
pub use report::{
    FixAction, FixDescriptor, FixRecord, FixTarget, IssueKind, Severity, ValidationIssue,
    ValidationReport, ValidationStats,
};
