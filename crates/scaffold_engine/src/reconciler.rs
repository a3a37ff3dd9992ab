//! Shared state for validating, fixing and applying templates.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use scaffold_project::{ManifestStore, ProjectManifest};
use scaffold_templates::{FileSpec, Template, TemplateResult, TemplateStore, VariableSubstitutor};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Binding every project gets unless it is set explicitly.
pub const PROJECT_NAME_VARIABLE: &str = "PROJECT_NAME";

/// Reconciles project trees with the templates applied to them.
///
/// Validation lives in [`validator`](crate::validator), repairs in
/// [`fixer`](crate::fixer) and project creation in [`apply`](crate::apply).
#[derive(Debug, Clone)]
pub struct Reconciler {
    pub(crate) store: TemplateStore,
    pub(crate) manifests: ManifestStore,
    pub(crate) substitutor: VariableSubstitutor,
}

impl Reconciler {
    pub fn new(store: TemplateStore) -> Self {
        Self {
            store,
            manifests: ManifestStore::new(),
            substitutor: VariableSubstitutor::new(),
        }
    }

    pub fn with_manifest_store(mut self, manifests: ManifestStore) -> Self {
        self.manifests = manifests;
        self
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Find the project owning `path`.
    pub fn locate(&self, path: &Path) -> EngineResult<(PathBuf, ProjectManifest)> {
        // Surface an unreadable or missing start path as an I/O failure
        fs::metadata(path)?;
        self.manifests
            .find(path)?
            .ok_or_else(|| EngineError::NotManaged(path.to_path_buf()))
    }

    /// Manifest bindings plus built-ins, before template defaults.
    pub(crate) fn base_variables(&self, manifest: &ProjectManifest) -> HashMap<String, String> {
        let mut vars = manifest.variable_map();
        vars.entry(PROJECT_NAME_VARIABLE.to_string())
            .or_insert_with(|| manifest.name.clone());
        vars
    }

    /// Complete bindings for one template of a project.
    pub(crate) fn bindings(
        &self,
        manifest: &ProjectManifest,
        template: &Template,
    ) -> TemplateResult<HashMap<String, String>> {
        self.substitutor
            .bindings(&template.variables, &self.base_variables(manifest))
    }

    /// Content a file spec renders to, loading external sources from the store.
    pub(crate) fn file_content(
        &self,
        template: &Template,
        file: &FileSpec,
        vars: &HashMap<String, String>,
    ) -> EngineResult<String> {
        let raw = match (&file.content, &file.source) {
            (Some(content), _) => content.clone(),
            (None, Some(source)) => self.store.source_content(&template.id, source)?,
            (None, None) => String::new(),
        };
        Ok(self.render(file, &raw, vars))
    }

    pub(crate) fn render(&self, file: &FileSpec, raw: &str, vars: &HashMap<String, String>) -> String {
        if file.variables {
            self.substitutor.substitute(raw, vars)
        } else {
            raw.to_string()
        }
    }
}

/// Create a file that must not exist yet, with its parent directories.
pub(crate) fn write_new_file(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(content.as_bytes())?;
    debug!("Wrote {:?}", path);
    Ok(())
}

/// Render a project-relative path with `/` separators.
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_relative_path() {
        let root = Path::new("/work/demo");
        assert_eq!(relative_path(root, &root.join("app").join("src")), "app/src");
    }

    #[test]
    fn test_write_new_file_never_clobbers() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("app").join("README.md");

        write_new_file(&path, "first").unwrap();
        let err = write_new_file(&path, "second").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");
    }

    #[test]
    fn test_project_name_is_builtin() {
        let reconciler = Reconciler::new(TemplateStore::new("/unused"));
        let mut manifest = ProjectManifest::new("demo");
        assert_eq!(reconciler.base_variables(&manifest)[PROJECT_NAME_VARIABLE], "demo");

        manifest
            .variables
            .insert(PROJECT_NAME_VARIABLE.into(), "explicit".into());
        assert_eq!(reconciler.base_variables(&manifest)[PROJECT_NAME_VARIABLE], "explicit");
    }

    #[test]
    fn test_locate_unmanaged() {
        let temp = tempdir().unwrap();
        let reconciler = Reconciler::new(TemplateStore::new(temp.path().join("store")));
        assert!(matches!(
            reconciler.locate(temp.path()),
            Err(EngineError::NotManaged(_))
        ));
        assert!(matches!(
            reconciler.locate(&temp.path().join("missing")),
            Err(EngineError::Io(_))
        ));
    }
}
