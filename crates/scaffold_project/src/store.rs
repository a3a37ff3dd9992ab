//! Project manifest discovery and persistence.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{ProjectError, ProjectResult};
use crate::models::ProjectManifest;

/// Reads and writes `<project>/.scaffold/project.yaml`.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    max_depth: usize,
}

impl Default for ManifestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestStore {
    /// Directory name for project metadata.
    pub const METADATA_DIR: &'static str = ".scaffold";
    /// Manifest file name inside the metadata directory.
    pub const MANIFEST_FILE: &'static str = "project.yaml";
    /// How many ancestors the upward search visits.
    pub const DEFAULT_MAX_DEPTH: usize = 64;

    pub fn new() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Get the manifest file path for a project root.
    pub fn manifest_path(root: impl AsRef<Path>) -> PathBuf {
        root.as_ref()
            .join(Self::METADATA_DIR)
            .join(Self::MANIFEST_FILE)
    }

    /// Check if a manifest exists at the given project root.
    pub fn exists(root: impl AsRef<Path>) -> bool {
        Self::manifest_path(root).is_file()
    }

    /// Find the nearest project root by walking up the directory tree.
    pub fn find_root(&self, start_path: impl AsRef<Path>) -> Option<PathBuf> {
        let start = start_path.as_ref();
        let mut current = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());

        for _ in 0..=self.max_depth {
            if Self::exists(&current) {
                debug!("Found project root at {:?}", current);
                return Some(current);
            }
            if !current.pop() {
                return None;
            }
        }

        debug!("Stopped manifest search after {} levels", self.max_depth);
        None
    }

    /// Find and load the nearest manifest.
    ///
    /// Absence is not an error here; callers decide what an unmanaged path means.
    pub fn find(
        &self,
        start_path: impl AsRef<Path>,
    ) -> ProjectResult<Option<(PathBuf, ProjectManifest)>> {
        match self.find_root(start_path) {
            Some(root) => {
                let manifest = self.load(&root)?;
                Ok(Some((root, manifest)))
            }
            None => Ok(None),
        }
    }

    /// Load the manifest at a project root.
    pub fn load(&self, root: impl AsRef<Path>) -> ProjectResult<ProjectManifest> {
        let path = Self::manifest_path(root);
        if !path.is_file() {
            return Err(ProjectError::NotFound(path));
        }

        debug!("Reading manifest from {:?}", path);
        let content = fs::read_to_string(&path)?;
        serde_yaml::from_str(&content).map_err(|e| ProjectError::InvalidManifest {
            path,
            message: e.to_string(),
        })
    }

    /// Write the manifest, replacing the previous file as a whole.
    pub fn save(&self, root: impl AsRef<Path>, manifest: &mut ProjectManifest) -> ProjectResult<()> {
        let path = Self::manifest_path(&root);
        let dir = root.as_ref().join(Self::METADATA_DIR);
        fs::create_dir_all(&dir)?;

        manifest.updated_at = Utc::now();
        let content = serde_yaml::to_string(manifest)?;

        let tmp = dir.join(format!("{}.tmp", Self::MANIFEST_FILE));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;

        info!("Saved project manifest {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_path() {
        let path = ManifestStore::manifest_path("/work/demo");
        assert_eq!(path, PathBuf::from("/work/demo/.scaffold/project.yaml"));
    }

    #[test]
    fn test_find_none() {
        let temp = tempdir().unwrap();
        let store = ManifestStore::new();
        assert!(store.find(temp.path()).unwrap().is_none());
    }

    #[test]
    fn test_metadata_dir_without_manifest_is_not_a_project() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join(ManifestStore::METADATA_DIR)).unwrap();
        assert!(!ManifestStore::exists(temp.path()));
    }
}
