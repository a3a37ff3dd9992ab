//! # scaffold_templates
//!
//! Content-addressed templates for scaffold.
//!
//! A template is an immutable bundle of folders, files, variables and
//! structural rules under a single root folder. Its identity is a SHA-256
//! digest of its canonical form, so equal content always yields the same
//! identity. Templates are looked up by full digest, by a unique digest
//! prefix, or by a human alias.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use scaffold_templates::{Template, TemplateStore, VariableSubstitutor};
//!
//! let store = TemplateStore::new("/tmp/scaffold-store");
//! let template = Template::new("node-app", "app")
//!     .with_folder("app/src")
//!     .with_file("app/package.json", r#"{"name":"{{PROJECT_NAME}}"}"#);
//!
//! let stored = store.add(template, None).unwrap();
//! store.register_alias(&stored.id, "node").unwrap();
//!
//! let digest = store.resolve("node").unwrap();
//! assert_eq!(digest, stored.id);
//!
//! let substitutor = VariableSubstitutor::new();
//! let mut vars = HashMap::new();
//! vars.insert("PROJECT_NAME".to_string(), "demo".to_string());
//! let content = stored.files[0].content.as_deref().unwrap_or_default();
//! assert_eq!(substitutor.substitute(content, &vars), r#"{"name":"demo"}"#);
//! ```

pub mod digest;
pub mod error;
pub mod loader;
pub mod store;
pub mod substitutor;
pub mod template;

pub use digest::{compute_digest, sha256_hex};
pub use error::{TemplateError, TemplateResult};
pub use loader::TemplateLoader;
pub use store::{resolve_prefix, TemplateStore};
pub use substitutor::VariableSubstitutor;
pub use template::{
    ConflictResolution, FileSpec, FolderSpec, PathKind, RuleCheck, RuleSet, Severity,
    StructuralRule, Template, VariableSpec,
};
