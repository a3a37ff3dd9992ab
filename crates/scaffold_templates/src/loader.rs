//! Loading authored templates from disk.
//!
//! An authored template is a directory holding `template.yaml` and an optional
//! `files/` directory with the source content referenced by file specs.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::digest::sha256_hex;
use crate::error::{TemplateError, TemplateResult};
use crate::store::TemplateStore;
use crate::template::Template;

/// Template loader.
pub struct TemplateLoader {
    templates_path: PathBuf,
}

impl TemplateLoader {
    /// Name of the directory holding source content.
    pub const FILES_DIR: &'static str = "files";

    /// Create a new template loader over a directory of authored templates.
    pub fn new(templates_path: impl Into<PathBuf>) -> Self {
        Self {
            templates_path: templates_path.into(),
        }
    }

    /// Load every authored template below the templates directory.
    pub fn load_all(&self) -> TemplateResult<Vec<(PathBuf, Template)>> {
        let mut templates = Vec::new();

        if !self.templates_path.exists() {
            warn!("Templates directory does not exist: {:?}", self.templates_path);
            return Ok(templates);
        }

        for entry in WalkDir::new(&self.templates_path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_dir() {
                match Self::load_template(path) {
                    Ok(template) => {
                        info!("Loaded template: {} from {:?}", template.name, path);
                        templates.push((path.to_path_buf(), template));
                    }
                    Err(e) => {
                        warn!("Failed to load template from {:?}: {}", path, e);
                    }
                }
            }
        }

        Ok(templates)
    }

    /// Load all authored templates into a store.
    pub fn import_all(&self, store: &TemplateStore) -> TemplateResult<Vec<Template>> {
        self.load_all()?
            .into_iter()
            .map(|(path, template)| store.add(template, Some(&path.join(Self::FILES_DIR))))
            .collect()
    }

    /// Load a single template directory and record source checksums.
    pub fn load_template(path: &Path) -> TemplateResult<Template> {
        let manifest_path = Self::manifest_path(path).ok_or_else(|| {
            TemplateError::NotFound(format!("No template.yaml found in {:?}", path))
        })?;

        debug!("Loading template manifest from {:?}", manifest_path);
        let content = fs::read_to_string(&manifest_path)?;
        let mut template: Template = serde_yaml::from_str(&content)?;

        let files_dir = path.join(Self::FILES_DIR);
        for file in &mut template.files {
            if let Some(source) = &file.source {
                let source_path = files_dir.join(source);
                if !source_path.is_file() {
                    return Err(TemplateError::SourceNotFound(source_path));
                }
                file.checksum = Some(sha256_hex(&fs::read(&source_path)?));
            }
        }

        Ok(template)
    }

    /// Load a template directory and add it to a store.
    pub fn import(store: &TemplateStore, path: &Path) -> TemplateResult<Template> {
        let template = Self::load_template(path)?;
        store.add(template, Some(&path.join(Self::FILES_DIR)))
    }

    /// Validate a template directory without storing it.
    pub fn validate_template(path: &Path) -> Vec<String> {
        match Self::load_template(path) {
            Ok(template) => template.issues(),
            Err(e) => vec![format!("Invalid template: {}", e)],
        }
    }

    fn manifest_path(path: &Path) -> Option<PathBuf> {
        ["template.yaml", "template.yml"]
            .iter()
            .map(|name| path.join(name))
            .find(|p| p.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_loader_empty_dir() {
        let temp = tempdir().unwrap();
        let loader = TemplateLoader::new(temp.path());
        assert!(loader.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_load_template_records_checksums() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("fastapi");
        fs::create_dir_all(dir.join("files/app")).unwrap();
        fs::write(dir.join("files/app/main.py"), "app = FastAPI(title=\"{{API_TITLE}}\")\n").unwrap();
        fs::write(
            dir.join("template.yml"),
            r#"
name: python-fastapi
root_folder: app
files:
  - path: app/main.py
    source: app/main.py
    variables: true
"#,
        )
        .unwrap();

        let template = TemplateLoader::load_template(&dir).unwrap();
        let checksum = template.files[0].checksum.as_deref().unwrap();
        assert_eq!(checksum.len(), 64);
    }

    #[test]
    fn test_missing_source_is_reported() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("template.yaml"),
            "name: t\nroot_folder: app\nfiles:\n  - path: app/a.txt\n    source: a.txt\n",
        )
        .unwrap();

        let issues = TemplateLoader::validate_template(temp.path());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("source not found"), "{:?}", issues);
    }
}
