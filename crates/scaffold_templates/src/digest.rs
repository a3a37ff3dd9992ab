//! Content digests for templates.
//!
//! A template's identity is the SHA-256 of its canonical form: every field
//! except the identity itself, aliases and timestamps, with each collection
//! sorted by its natural key and serialized as JSON with sorted object keys.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::TemplateResult;
use crate::template::{FileSpec, FolderSpec, RuleSet, Template, VariableSpec};

/// Length of a full hex digest.
pub const DIGEST_LEN: usize = 64;

/// The hashed view of a template.
#[derive(Serialize)]
struct CanonicalTemplate<'a> {
    name: &'a str,
    version: &'a str,
    description: &'a str,
    root_folder: &'a str,
    folders: Vec<&'a FolderSpec>,
    files: Vec<&'a FileSpec>,
    variables: Vec<&'a VariableSpec>,
    rules: RuleSet,
}

impl<'a> CanonicalTemplate<'a> {
    fn new(template: &'a Template) -> Self {
        let mut folders: Vec<_> = template.folders.iter().collect();
        folders.sort_by(|a, b| a.path.cmp(&b.path));

        let mut files: Vec<_> = template.files.iter().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut variables: Vec<_> = template.variables.iter().collect();
        variables.sort_by(|a, b| a.name.cmp(&b.name));

        let mut rules = template.rules.clone();
        rules.exclude.sort();
        rules.rules.sort_by(|a, b| a.id.cmp(&b.id));

        Self {
            name: &template.name,
            version: &template.version,
            description: &template.description,
            root_folder: &template.root_folder,
            folders,
            files,
            variables,
            rules,
        }
    }
}

/// Compute SHA-256 of bytes as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Convert to canonical JSON (sorted keys, no whitespace).
pub fn canonical_json<T: Serialize>(value: &T) -> TemplateResult<String> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&sort_value(value))?)
}

fn sort_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_value(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}

/// Canonical serialization of a template.
pub fn canonical_form(template: &Template) -> TemplateResult<String> {
    canonical_json(&CanonicalTemplate::new(template))
}

/// Compute the content digest of a template.
pub fn compute_digest(template: &Template) -> TemplateResult<String> {
    Ok(sha256_hex(canonical_form(template)?.as_bytes()))
}

/// Whether `s` has the shape of a full digest.
pub fn is_full_digest(s: &str) -> bool {
    s.len() == DIGEST_LEN && is_hex(s)
}

/// Whether `s` could be a digest prefix (non-empty lowercase hex).
pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
