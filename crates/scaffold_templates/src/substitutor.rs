//! Variable substitution for template content and paths.

use std::collections::{BTreeSet, HashMap};

use regex::Regex;
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};
use crate::template::{is_under, relative_path_problem, VariableSpec};

/// Replaces `{{NAME}}` placeholders with bound values.
///
/// Substitution is pure. Placeholders without a binding are left untouched so
/// the output never silently loses text.
#[derive(Debug, Clone)]
pub struct VariableSubstitutor {
    variable_pattern: Regex,
}

impl Default for VariableSubstitutor {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableSubstitutor {
    pub fn new() -> Self {
        Self {
            // Match {{VARIABLE_NAME}}, tolerating inner whitespace
            variable_pattern: Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")
                .expect("placeholder pattern is a valid regex"),
        }
    }

    /// Build the complete binding map for a set of declared variables.
    ///
    /// Provided values win over defaults; undeclared provided values are kept.
    pub fn bindings(
        &self,
        declared: &[VariableSpec],
        provided: &HashMap<String, String>,
    ) -> TemplateResult<HashMap<String, String>> {
        let mut vars = provided.clone();

        for var in declared {
            match provided.get(&var.name) {
                Some(value) => {
                    if let Some(pattern) = &var.pattern {
                        let re = Regex::new(pattern).map_err(|e| TemplateError::InvalidVariable {
                            variable: var.name.clone(),
                            message: e.to_string(),
                        })?;
                        if !re.is_match(value) {
                            return Err(TemplateError::InvalidVariable {
                                variable: var.name.clone(),
                                message: format!("'{}' does not match pattern {}", value, pattern),
                            });
                        }
                    }
                }
                None => match &var.default {
                    Some(default) => {
                        vars.insert(var.name.clone(), default.clone());
                    }
                    None if var.required => {
                        return Err(TemplateError::MissingRequiredVariable(var.name.clone()));
                    }
                    None => {}
                },
            }
        }

        debug!("Resolved {} variable binding(s)", vars.len());
        Ok(vars)
    }

    /// Replace every placeholder in `content`.
    pub fn substitute(&self, content: &str, variables: &HashMap<String, String>) -> String {
        self.variable_pattern
            .replace_all(content, |caps: &regex::Captures| {
                variables
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Replace every placeholder in a template path.
    pub fn substitute_path(&self, path: &str, variables: &HashMap<String, String>) -> String {
        self.substitute(path, variables)
    }

    /// Substitute a template path and check it still lies under the substituted root folder.
    ///
    /// Bound values may not move a path out of its root, e.g. `{{DIR}}` bound to `../x`.
    pub fn resolve_path(
        &self,
        path: &str,
        root_folder: &str,
        variables: &HashMap<String, String>,
    ) -> TemplateResult<String> {
        let root = self.substitute_path(root_folder, variables);
        let resolved = self.substitute_path(path, variables);

        let problem = if let Some(problem) = relative_path_problem(&root) {
            Some(format!("root folder '{}' {}", root, problem))
        } else if let Some(problem) = relative_path_problem(&resolved) {
            Some(format!("path '{}' {}", resolved, problem))
        } else if !is_under(&resolved, &root) {
            Some(format!("path '{}' is outside root folder '{}'", resolved, root))
        } else {
            None
        };

        match problem {
            None => Ok(resolved),
            Some(message) => {
                let mut names = self.placeholders(root_folder);
                names.extend(self.placeholders(path));
                Err(TemplateError::InvalidVariable {
                    variable: names.into_iter().collect::<Vec<_>>().join(", "),
                    message,
                })
            }
        }
    }

    /// Names of all placeholders in `content`.
    pub fn placeholders(&self, content: &str) -> BTreeSet<String> {
        self.variable_pattern
            .captures_iter(content)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// Placeholders in `content` that have no binding.
    pub fn unbound(&self, content: &str, variables: &HashMap<String, String>) -> Vec<String> {
        self.placeholders(content)
            .into_iter()
            .filter(|name| !variables.contains_key(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, required: bool, default: Option<&str>) -> VariableSpec {
        VariableSpec {
            name: name.to_string(),
            description: String::new(),
            required,
            default: default.map(String::from),
            pattern: None,
        }
    }

    #[test]
    fn test_substitute() {
        let substitutor = VariableSubstitutor::new();
        let mut vars = HashMap::new();
        vars.insert("PROJECT_NAME".to_string(), "demo".to_string());

        assert_eq!(
            substitutor.substitute(r#"{"name":"{{PROJECT_NAME}}"}"#, &vars),
            r#"{"name":"demo"}"#
        );
        assert_eq!(substitutor.substitute("{{ PROJECT_NAME }}", &vars), "demo");
        assert_eq!(substitutor.substitute("{{UNKNOWN}}", &vars), "{{UNKNOWN}}");
    }

    #[test]
    fn test_bindings_defaults_and_required() {
        let substitutor = VariableSubstitutor::new();
        let declared = vec![var("PORT", true, Some("8000")), var("API_TITLE", true, None)];

        let err = substitutor.bindings(&declared, &HashMap::new()).unwrap_err();
        assert!(matches!(err, TemplateError::MissingRequiredVariable(ref name) if name == "API_TITLE"));

        let mut provided = HashMap::new();
        provided.insert("API_TITLE".to_string(), "Demo".to_string());
        let vars = substitutor.bindings(&declared, &provided).unwrap();
        assert_eq!(vars["PORT"], "8000");
        assert_eq!(vars["API_TITLE"], "Demo");
    }

    #[test]
    fn test_bindings_pattern() {
        let substitutor = VariableSubstitutor::new();
        let mut port = var("PORT", false, None);
        port.pattern = Some(r"^\d+$".to_string());

        let mut provided = HashMap::new();
        provided.insert("PORT".to_string(), "http".to_string());
        let err = substitutor.bindings(&[port], &provided).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidVariable { .. }));
    }

    #[test]
    fn test_resolve_path_stays_under_root() {
        let substitutor = VariableSubstitutor::new();
        let mut vars = HashMap::new();
        vars.insert("MOD".to_string(), "core".to_string());
        assert_eq!(
            substitutor.resolve_path("app/{{MOD}}/lib.rs", "app", &vars).unwrap(),
            "app/core/lib.rs"
        );

        for value in ["../../outside", "/etc", "a/./b", "..\\x", ""] {
            vars.insert("MOD".to_string(), value.to_string());
            let err = substitutor.resolve_path("app/{{MOD}}", "app", &vars).unwrap_err();
            assert!(
                matches!(err, TemplateError::InvalidVariable { ref variable, .. } if variable == "MOD"),
                "{} was accepted",
                value
            );
        }

        vars.insert("ROOT".to_string(), "other".to_string());
        assert!(substitutor.resolve_path("app/src", "{{ROOT}}", &vars).is_err());
        assert!(substitutor.resolve_path("{{ROOT}}/src", "{{ROOT}}", &vars).is_ok());
    }

    #[test]
    fn test_placeholders() {
        let substitutor = VariableSubstitutor::new();
        let found = substitutor.placeholders("{{A}}/{{B}}/{{A}}");
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["A", "B"]);
    }
}
