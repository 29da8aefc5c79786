//! Configuration loading and merging.
//!
//! Configuration lives in a `[tool.stubcast]` table (e.g. inside a
//! `pyproject.toml`) or at the top level of a standalone TOML file. Merging
//! is last-wins per key, so later configuration sources override earlier
//! ones.

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::resolve::PyImport;

/// How to import one known type, as declared in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportSpec {
    /// Dotted path after `from`.
    pub from: Option<String>,
    /// Dotted names after `import`; defaults to the declared name.
    pub import: Option<String>,
    /// Alias after `as`.
    #[serde(rename = "as")]
    pub alias: Option<String>,
    /// Builtins need no import statement.
    pub builtin: bool,
}

impl ImportSpec {
    /// Converts the spec into a [`PyImport`], using `name` as the import
    /// name when none is declared.
    pub fn to_py_import(&self, name: &str) -> Result<PyImport> {
        let import = self.import.clone().unwrap_or_else(|| name.to_string());
        if self.builtin {
            return Ok(PyImport::builtin(import));
        }
        let py_import = match &self.from {
            Some(from) => PyImport::from_import(from, import),
            None => PyImport::import(import),
        };
        match &self.alias {
            Some(alias) => py_import.with_alias(alias),
            None => Ok(py_import),
        }
    }
}

/// Merged configuration options.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Known types: dotted name to import spec.
    pub known_imports: BTreeMap<String, ImportSpec>,
    /// Import prefixes, e.g. `np` for `import numpy as np`.
    pub type_prefixes: BTreeMap<String, ImportSpec>,
    /// Nicknames mapping one doctype name to another.
    pub type_nicknames: BTreeMap<String, String>,
    /// Glob patterns for files to skip.
    pub ignore: Vec<String>,
    /// Substrings replaced in every doctype before parsing.
    pub replace_doctypes: BTreeMap<String, String>,
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parses configuration from TOML text, honoring a `[tool.stubcast]`
    /// table when present.
    pub fn from_toml_str(raw: &str) -> Result<Config> {
        let value: toml::Value =
            toml::from_str(raw).map_err(|err| Error::config_error(err.to_string()))?;
        let table = value
            .get("tool")
            .and_then(|tool| tool.get("stubcast"))
            .cloned()
            .unwrap_or(value);
        table
            .try_into()
            .map_err(|err: toml::de::Error| Error::config_error(err.to_string()))
    }

    /// Merges `other` into this configuration; `other` wins identical
    /// keys.
    pub fn merge(mut self, other: Config) -> Config {
        self.known_imports.extend(other.known_imports);
        self.type_prefixes.extend(other.type_prefixes);
        self.type_nicknames.extend(other.type_nicknames);
        self.ignore.extend(other.ignore);
        self.replace_doctypes.extend(other.replace_doctypes);
        self
    }

    /// All declared types and prefixes as matcher database entries.
    pub fn type_entries(&self) -> Result<Vec<(String, PyImport)>> {
        let mut entries = Vec::new();
        for (name, spec) in self.known_imports.iter().chain(&self.type_prefixes) {
            entries.push((name.clone(), spec.to_py_import(name)?));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn standalone_table() {
        let config = Config::from_toml_str(
            r#"
            ignore = ["**/generated/*"]

            [known_imports."foo.bar.Baz"]
            from = "foo.bar"
            import = "Baz"

            [type_prefixes.np]
            import = "numpy"
            as = "np"

            [type_nicknames]
            path-like = "str"
            "#,
        )
        .unwrap();

        assert_eq!(config.ignore, vec!["**/generated/*"]);
        let entries = config.type_entries().unwrap();
        assert_eq!(
            entries,
            vec![
                (
                    "foo.bar.Baz".to_string(),
                    PyImport::from_import("foo.bar", "Baz"),
                ),
                (
                    "np".to_string(),
                    PyImport::import("numpy").with_alias("np").unwrap(),
                ),
            ]
        );
        assert_eq!(config.type_nicknames["path-like"], "str");
    }

    #[test]
    fn tool_table_in_pyproject() {
        let config = Config::from_toml_str(
            r#"
            [tool.other]
            unrelated = true

            [tool.stubcast.known_imports.Baz]
            from = "foo.bar"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.type_entries().unwrap(),
            vec![("Baz".to_string(), PyImport::from_import("foo.bar", "Baz"))]
        );
    }

    #[test]
    fn merge_is_last_wins() {
        let base = Config::from_toml_str(
            r#"
            [known_imports.Baz]
            from = "old"
            [replace_doctypes]
            a = "b"
            "#,
        )
        .unwrap();
        let update = Config::from_toml_str(
            r#"
            [known_imports.Baz]
            from = "new"
            "#,
        )
        .unwrap();
        let merged = base.merge(update);
        assert_eq!(
            merged.known_imports["Baz"].from.as_deref(),
            Some("new")
        );
        assert_eq!(merged.replace_doctypes["a"], "b");
    }

    #[test]
    fn builtin_spec() {
        let spec = ImportSpec {
            builtin: true,
            ..ImportSpec::default()
        };
        let py_import = spec.to_py_import("dict").unwrap();
        assert!(!py_import.has_import());
    }

    #[test]
    fn invalid_alias_is_rejected() {
        let spec = ImportSpec {
            import: Some("foo.bar".to_string()),
            alias: Some("foo.bar".to_string()),
            ..ImportSpec::default()
        };
        assert!(spec.to_py_import("foo.bar").is_err());
    }
}
