//! Content-addressed template store.
//!
//! Directory layout:
//! ```text
//! <store>/
//! ├── templates/<digest>.yaml    # One definition per digest
//! ├── sources/<digest>/...       # External file content referenced by `source`
//! └── aliases.yaml               # alias -> digest
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::digest::{compute_digest, is_full_digest, is_hex, sha256_hex};
use crate::error::{TemplateError, TemplateResult};
use crate::template::Template;

/// Resolve a digest prefix against a set of known digests.
///
/// A prefix must match exactly one digest. Several matches are reported with
/// every candidate so the caller can ask for a longer prefix.
pub fn resolve_prefix<'a>(
    prefix: &str,
    digests: impl IntoIterator<Item = &'a str>,
) -> TemplateResult<String> {
    let mut matches: Vec<String> = digests
        .into_iter()
        .filter(|d| !prefix.is_empty() && d.starts_with(prefix))
        .map(String::from)
        .collect();
    matches.sort();
    matches.dedup();

    match matches.len() {
        0 => Err(TemplateError::NotFound(prefix.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(TemplateError::AmbiguousIdentifier {
            identifier: prefix.to_string(),
            candidates: matches,
        }),
    }
}

/// Template store rooted at a directory.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub const TEMPLATES_DIR: &'static str = "templates";
    pub const SOURCES_DIR: &'static str = "sources";
    pub const ALIASES_FILE: &'static str = "aliases.yaml";

    /// Create a store handle. Directories are created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root path of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn templates_dir(&self) -> PathBuf {
        self.root.join(Self::TEMPLATES_DIR)
    }

    fn template_path(&self, digest: &str) -> PathBuf {
        self.templates_dir().join(format!("{}.yaml", digest))
    }

    fn aliases_path(&self) -> PathBuf {
        self.root.join(Self::ALIASES_FILE)
    }

    /// Directory holding the external source content of a template.
    pub fn sources_dir(&self, digest: &str) -> PathBuf {
        self.root.join(Self::SOURCES_DIR).join(digest)
    }

    /// Check if a template with this exact digest is stored.
    pub fn contains(&self, digest: &str) -> bool {
        is_full_digest(digest) && self.template_path(digest).is_file()
    }

    /// Validate, hash and store a template.
    ///
    /// `sources` is the directory that `source` references of file specs are
    /// relative to. Adding identical content twice returns the stored template.
    pub fn add(&self, mut template: Template, sources: Option<&Path>) -> TemplateResult<Template> {
        template.validate()?;

        let digest = compute_digest(&template)?;
        if self.contains(&digest) {
            info!("Template {} already stored as {}", template.name, digest);
            return self.get(&digest);
        }

        template.id = digest.clone();
        template.aliases.clear();

        let source_files: Vec<_> = template
            .files
            .iter()
            .filter_map(|f| f.source.as_ref().map(|s| (s, f.checksum.as_ref())))
            .collect();
        if !source_files.is_empty() {
            let sources = sources.ok_or_else(|| TemplateError::InvalidTemplate {
                template: template.name.clone(),
                message: "file sources referenced but no source directory given".to_string(),
            })?;
            let target_dir = self.sources_dir(&digest);
            for (source, checksum) in source_files {
                let from = sources.join(source);
                if !from.is_file() {
                    return Err(TemplateError::SourceNotFound(from));
                }
                let bytes = fs::read(&from)?;
                if let Some(expected) = checksum {
                    if sha256_hex(&bytes) != *expected {
                        return Err(TemplateError::InvalidTemplate {
                            template: template.name.clone(),
                            message: format!("checksum mismatch for source {}", source),
                        });
                    }
                }
                let to = target_dir.join(source);
                if let Some(parent) = to.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&to, bytes)?;
                debug!("Stored source {:?}", to);
            }
        }

        fs::create_dir_all(self.templates_dir())?;
        fs::write(self.template_path(&digest), serde_yaml::to_string(&template)?)?;

        info!("Stored template {} ({})", template.name, template.short_id());
        Ok(template)
    }

    /// Load a template by its full digest.
    pub fn get(&self, digest: &str) -> TemplateResult<Template> {
        let path = self.template_path(digest);
        if !is_full_digest(digest) || !path.is_file() {
            return Err(TemplateError::NotFound(digest.to_string()));
        }

        debug!("Loading template from {:?}", path);
        let content = fs::read_to_string(&path)?;
        let mut template: Template =
            serde_yaml::from_str(&content).map_err(|e| TemplateError::InvalidTemplate {
                template: digest.to_string(),
                message: e.to_string(),
            })?;

        let actual = compute_digest(&template)?;
        if actual != digest {
            return Err(TemplateError::InvalidTemplate {
                template: digest.to_string(),
                message: format!("stored content hashes to {}", actual),
            });
        }

        template.id = digest.to_string();
        template.aliases = self.aliases_for(digest)?;
        Ok(template)
    }

    /// List all stored digests, sorted.
    pub fn digests(&self) -> TemplateResult<Vec<String>> {
        let dir = self.templates_dir();
        let mut digests = Vec::new();

        if !dir.exists() {
            return Ok(digests);
        }

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(digest) = name.strip_suffix(".yaml") {
                if is_full_digest(digest) {
                    digests.push(digest.to_string());
                }
            }
        }

        digests.sort();
        Ok(digests)
    }

    /// Load every stored template.
    pub fn list(&self) -> TemplateResult<Vec<Template>> {
        self.digests()?.iter().map(|d| self.get(d)).collect()
    }

    /// Resolve a full digest, a unique digest prefix, or an alias, in that order.
    pub fn resolve(&self, identifier: &str) -> TemplateResult<String> {
        if identifier.is_empty() {
            return Err(TemplateError::NotFound(identifier.to_string()));
        }

        if self.contains(identifier) {
            return Ok(identifier.to_string());
        }

        if is_hex(identifier) {
            let digests = self.digests()?;
            match resolve_prefix(identifier, digests.iter().map(String::as_str)) {
                Ok(digest) => {
                    debug!("Resolved prefix {} to {}", identifier, digest);
                    return Ok(digest);
                }
                Err(TemplateError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if let Some(digest) = self.aliases()?.remove(identifier) {
            debug!("Resolved alias {} to {}", identifier, digest);
            return Ok(digest);
        }

        Err(TemplateError::NotFound(identifier.to_string()))
    }

    /// Resolve an identifier and load the template.
    pub fn find(&self, identifier: &str) -> TemplateResult<Template> {
        let digest = self.resolve(identifier)?;
        self.get(&digest)
    }

    /// Read the alias table.
    pub fn aliases(&self) -> TemplateResult<BTreeMap<String, String>> {
        let path = self.aliases_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    fn write_aliases(&self, aliases: &BTreeMap<String, String>) -> TemplateResult<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.aliases_path(), serde_yaml::to_string(aliases)?)?;
        Ok(())
    }

    /// Aliases pointing at `digest`.
    pub fn aliases_for(&self, digest: &str) -> TemplateResult<Vec<String>> {
        Ok(self
            .aliases()?
            .into_iter()
            .filter(|(_, d)| d == digest)
            .map(|(alias, _)| alias)
            .collect())
    }

    /// Point `alias` at `digest`, replacing any previous mapping.
    pub fn register_alias(&self, digest: &str, alias: &str) -> TemplateResult<()> {
        validate_alias(alias)?;
        if !self.contains(digest) {
            return Err(TemplateError::NotFound(digest.to_string()));
        }

        let mut aliases = self.aliases()?;
        if let Some(previous) = aliases.insert(alias.to_string(), digest.to_string()) {
            if previous != digest {
                info!("Alias {} moved from {} to {}", alias, previous, digest);
            }
        }
        self.write_aliases(&aliases)?;

        info!("Registered alias {} -> {}", alias, digest);
        Ok(())
    }

    /// Remove an alias. Returns whether it existed.
    pub fn remove_alias(&self, alias: &str) -> TemplateResult<bool> {
        let mut aliases = self.aliases()?;
        let removed = aliases.remove(alias).is_some();
        if removed {
            self.write_aliases(&aliases)?;
            info!("Removed alias {}", alias);
        }
        Ok(removed)
    }

    /// Read the external source content a file spec refers to.
    pub fn source_content(&self, digest: &str, source: &str) -> TemplateResult<String> {
        let path = self.sources_dir(digest).join(source);
        if !path.is_file() {
            return Err(TemplateError::SourceNotFound(path));
        }
        Ok(fs::read_to_string(&path)?)
    }
}

fn validate_alias(alias: &str) -> TemplateResult<()> {
    let problem = if alias.is_empty() {
        Some("alias cannot be empty")
    } else if alias.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\') {
        Some("alias cannot contain whitespace or path separators")
    } else if is_hex(alias) {
        Some("alias cannot look like a digest prefix")
    } else {
        None
    };

    match problem {
        Some(message) => Err(TemplateError::InvalidAlias {
            alias: alias.to_string(),
            message: message.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const A: &str = "aaaa1111";
    const B: &str = "aaaa2222";
    const C: &str = "bbbb3333";

    #[test]
    fn test_resolve_prefix_unique() {
        assert_eq!(resolve_prefix("aaaa1", [A, B, C]).unwrap(), A);
        assert_eq!(resolve_prefix("b", [A, B, C]).unwrap(), C);
    }

    #[test]
    fn test_resolve_prefix_ambiguous() {
        match resolve_prefix("aaaa", [A, B, C]) {
            Err(TemplateError::AmbiguousIdentifier { candidates, .. }) => {
                assert_eq!(candidates, vec![A.to_string(), B.to_string()]);
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_prefix_none() {
        assert!(matches!(resolve_prefix("c", [A, B, C]), Err(TemplateError::NotFound(_))));
        assert!(matches!(resolve_prefix("", [A]), Err(TemplateError::NotFound(_))));
    }

    #[test]
    fn test_validate_alias() {
        assert!(validate_alias("node-app").is_ok());
        assert!(validate_alias("").is_err());
        assert!(validate_alias("my app").is_err());
        assert!(validate_alias("beef").is_err());
    }

    #[test]
    fn test_empty_store() {
        let temp = tempdir().unwrap();
        let store = TemplateStore::new(temp.path());
        assert!(store.digests().unwrap().is_empty());
        assert!(store.aliases().unwrap().is_empty());
        assert!(matches!(store.resolve("web"), Err(TemplateError::NotFound(_))));
    }
}
