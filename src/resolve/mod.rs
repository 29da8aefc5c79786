//! Name resolution: mapping doctype names to annotations and imports.
//!
//! A [`TypeMatcher`] holds a database of dotted paths mapped to
//! [`PyImport`]s. Queries match fully qualified names by their longest
//! declared prefix, and `~.`-abbreviated names by suffix against explicitly
//! declared entries only. The database is built once per run and treated as
//! immutable afterwards, so it can be shared by reference.

use std::collections::BTreeMap;
use std::fmt;

use log::warn;

use crate::error::{Error, Result};
use crate::utils::accumulate_qualname;

/// Maximum number of nickname hops before giving up on a chain.
const NICKNAME_LIMIT: usize = 10;

/// Describes how to make a name available in a stub: a builtin that needs
/// no import, or an import with an optional source module and alias.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PyImport {
    /// Dotted names after `import`.
    import_: String,
    /// Dotted names after `from`, if any.
    from_: Option<String>,
    /// Name after `as`, if any. Must not contain a `.`.
    as_: Option<String>,
    builtin: bool,
}

impl PyImport {
    /// A builtin name that needs no import statement.
    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            import_: name.into(),
            from_: None,
            as_: None,
            builtin: true,
        }
    }

    /// A plain `import name`.
    pub fn import(name: impl Into<String>) -> Self {
        Self {
            import_: name.into(),
            from_: None,
            as_: None,
            builtin: false,
        }
    }

    /// A `from module import name`.
    pub fn from_import(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            import_: name.into(),
            from_: Some(module.into()),
            as_: None,
            builtin: false,
        }
    }

    /// Attaches an `as` alias. The alias must not contain a `.`.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Result<Self> {
        let alias = alias.into();
        if alias.contains('.') {
            return Err(Error::import_error(format!(
                "alias {alias:?} can't contain a '.'"
            )));
        }
        self.as_ = Some(alias);
        Ok(self)
    }

    /// The generic incomplete-type placeholder import.
    pub fn typeshed_incomplete() -> Self {
        Self::from_import("_typeshed", "Incomplete")
    }

    /// The incomplete-type placeholder aliased to an escaped unknown name.
    pub fn typeshed_incomplete_as(alias: impl Into<String>) -> Self {
        Self {
            import_: "Incomplete".to_string(),
            from_: Some("_typeshed".to_string()),
            as_: Some(alias.into()),
            builtin: false,
        }
    }

    /// The name this import makes available: the alias if present,
    /// otherwise the import name.
    pub fn target(&self) -> &str {
        self.as_.as_deref().unwrap_or(&self.import_)
    }

    /// The full dotted path this import covers.
    pub fn import_path(&self) -> String {
        match &self.from_ {
            Some(from) => format!("{from}.{}", self.import_),
            None => self.import_.clone(),
        }
    }

    /// The module after `from`, if any.
    pub fn source_module(&self) -> Option<&str> {
        self.from_.as_deref()
    }

    /// Builtins need no import statement.
    pub fn has_import(&self) -> bool {
        !self.builtin
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin
    }
}

impl fmt::Display for PyImport {
    /// Formats the import statement; builtins format as their bare name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.builtin {
            return write!(f, "{}", self.import_);
        }
        if let Some(from) = &self.from_ {
            write!(f, "from {from} ")?;
        }
        write!(f, "import {}", self.import_)?;
        if let Some(alias) = &self.as_ {
            write!(f, " as {alias}")?;
        }
        Ok(())
    }
}

/// The name-resolution database.
///
/// Construction merges sources in increasing priority (builtins < typing <
/// `collections.abc` < statically collected < user configuration); later
/// sources win identical keys.
#[derive(Debug, Clone, Default)]
pub struct TypeMatcher {
    types: BTreeMap<String, PyImport>,
    nicknames: BTreeMap<String, String>,
}

impl TypeMatcher {
    /// A matcher preloaded with builtins and the standard typing
    /// vocabulary.
    pub fn new() -> Self {
        Self {
            types: common_known_types(),
            nicknames: BTreeMap::new(),
        }
    }

    /// A matcher with no entries at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merges entries into the database; existing keys are overwritten.
    pub fn add_types(&mut self, types: impl IntoIterator<Item = (String, PyImport)>) {
        self.types.extend(types);
    }

    /// Merges nickname declarations; existing keys are overwritten.
    pub fn add_nicknames(&mut self, nicknames: impl IntoIterator<Item = (String, String)>) {
        self.nicknames.extend(nicknames);
    }

    /// Resolves a (possibly dotted, possibly `~.`-abbreviated) name to its
    /// annotation text and import.
    pub fn query(&self, qualname: &str) -> Option<(String, PyImport)> {
        let resolved = self.resolve_nickname(qualname);
        let qualname = resolved.as_str();

        if let Some(suffix) = qualname.strip_prefix("~.") {
            return self.query_suffix(qualname, suffix);
        }

        let mut hit: Option<&str> = None;
        for prefix in accumulate_qualname(qualname) {
            if let Some((key, _)) = self.types.get_key_value(prefix.as_str()) {
                hit = Some(key.as_str());
            }
        }
        let key = hit?;
        let remainder = &qualname[key.len()..];
        self.resolve_key(key, remainder)
    }

    /// Abbreviated queries only ever match explicitly declared entries.
    fn query_suffix(&self, qualname: &str, suffix: &str) -> Option<(String, PyImport)> {
        let dotted = format!(".{suffix}");
        let mut matches: Vec<&str> = self
            .types
            .keys()
            .filter(|key| *key == suffix || key.ends_with(&dotted))
            .map(String::as_str)
            .collect();
        if matches.is_empty() {
            return None;
        }
        // The most specific declared path wins; ties break
        // lexicographically (keys iterate sorted already).
        matches.sort_by_key(|key| std::cmp::Reverse(key.len()));
        if matches.len() > 1 && matches[0].len() == matches[1].len() {
            warn!(
                "{qualname} matches multiple types {matches:?}, using {}",
                matches[0]
            );
        }
        self.resolve_key(matches[0], "")
    }

    fn resolve_key(&self, key: &str, remainder: &str) -> Option<(String, PyImport)> {
        let py_import = self.types.get(key)?.clone();
        let import_path = py_import.import_path();
        let tail = match key.strip_prefix(&import_path) {
            Some(tail) if tail.is_empty() || tail.starts_with('.') => tail,
            _ => "",
        };
        let annotation = format!("{}{tail}{remainder}", py_import.target());
        Some((annotation, py_import))
    }

    fn resolve_nickname(&self, name: &str) -> String {
        let mut current = name.to_string();
        for _ in 0..NICKNAME_LIMIT {
            match self.nicknames.get(&current) {
                Some(next) => current = next.clone(),
                None => return current,
            }
        }
        warn!("reached limit while resolving nicknames for {name:?}");
        name.to_string()
    }
}

/// Builtin type names available without any import.
const BUILTIN_TYPES: &[&str] = &[
    "BaseException",
    "Exception",
    "False",
    "IndexError",
    "KeyError",
    "None",
    "NotImplementedError",
    "OSError",
    "RuntimeError",
    "StopIteration",
    "True",
    "TypeError",
    "ValueError",
    "bool",
    "bytearray",
    "bytes",
    "complex",
    "dict",
    "float",
    "frozenset",
    "int",
    "list",
    "memoryview",
    "object",
    "range",
    "set",
    "slice",
    "str",
    "tuple",
    "type",
];

/// Names imported from `typing`.
const TYPING_TYPES: &[&str] = &[
    "Any",
    "ClassVar",
    "Concatenate",
    "Final",
    "Generic",
    "Literal",
    "LiteralString",
    "NamedTuple",
    "Never",
    "NoReturn",
    "Optional",
    "ParamSpec",
    "Protocol",
    "Self",
    "TypeAlias",
    "TypeGuard",
    "TypeVar",
    "TypedDict",
    "Union",
];

/// Names imported from `collections.abc`; these override duplicates from
/// `typing` such as `Callable`.
const COLLECTIONS_ABC_TYPES: &[&str] = &[
    "AsyncGenerator",
    "AsyncIterable",
    "AsyncIterator",
    "Awaitable",
    "Callable",
    "Collection",
    "Container",
    "Coroutine",
    "Generator",
    "Hashable",
    "Iterable",
    "Iterator",
    "Mapping",
    "MutableMapping",
    "MutableSequence",
    "MutableSet",
    "Reversible",
    "Sequence",
    "Sized",
];

/// Returns known imports for commonly supported types: builtins plus the
/// `typing` and `collections.abc` vocabulary.
pub fn common_known_types() -> BTreeMap<String, PyImport> {
    let mut types = BTreeMap::new();
    for name in BUILTIN_TYPES {
        types.insert(name.to_string(), PyImport::builtin(*name));
    }
    // Bare names and fully qualified paths both resolve.
    for name in TYPING_TYPES {
        let py_import = PyImport::from_import("typing", *name);
        types.insert(name.to_string(), py_import.clone());
        types.insert(format!("typing.{name}"), py_import);
    }
    for name in COLLECTIONS_ABC_TYPES {
        let py_import = PyImport::from_import("collections.abc", *name);
        types.insert(name.to_string(), py_import.clone());
        types.insert(format!("collections.abc.{name}"), py_import);
    }
    types
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn dot_in_alias() {
        let result = PyImport::import("foo.bar.baz").with_alias("bar.baz");
        assert!(matches!(result, Err(Error::Import(_))));
    }

    #[test]
    fn format_import() {
        assert_eq!(
            PyImport::from_import("foo.bar", "Baz").to_string(),
            "from foo.bar import Baz"
        );
        assert_eq!(
            PyImport::import("numpy").with_alias("np").unwrap().to_string(),
            "import numpy as np"
        );
        assert_eq!(
            PyImport::typeshed_incomplete().to_string(),
            "from _typeshed import Incomplete"
        );
    }

    fn test_matcher() -> TypeMatcher {
        let mut matcher = TypeMatcher::empty();
        matcher.add_types([
            ("dict".to_string(), PyImport::builtin("dict")),
            ("foo.bar".to_string(), PyImport::from_import("foo", "bar")),
            (
                "foo.bar.Baz".to_string(),
                PyImport::from_import("foo.bar", "Baz"),
            ),
            (
                "foo.bar.Baz.Bix".to_string(),
                PyImport::from_import("foo.bar", "Baz"),
            ),
            (
                "foo.bar.Baz.Qux".to_string(),
                PyImport::from_import("foo", "bar"),
            ),
        ]);
        matcher
    }

    #[rstest]
    #[case("foo.bar.Baz", "Baz", "from foo.bar import Baz")]
    #[case("~.bar.Baz", "Baz", "from foo.bar import Baz")]
    #[case("~.Baz", "Baz", "from foo.bar import Baz")]
    #[case("foo.bar.Baz.Bix", "Baz.Bix", "from foo.bar import Baz")]
    #[case("~.bar.Baz.Bix", "Baz.Bix", "from foo.bar import Baz")]
    #[case("~.Baz.Bix", "Baz.Bix", "from foo.bar import Baz")]
    #[case("~.Bix", "Baz.Bix", "from foo.bar import Baz")]
    #[case("foo.bar.Baz.Qux", "bar.Baz.Qux", "from foo import bar")]
    #[case("~.bar.Baz.Qux", "bar.Baz.Qux", "from foo import bar")]
    #[case("~.Baz.Qux", "bar.Baz.Qux", "from foo import bar")]
    #[case("~.Qux", "bar.Baz.Qux", "from foo import bar")]
    fn query_types(#[case] search: &str, #[case] name: &str, #[case] origin: &str) {
        let matcher = test_matcher();
        let (type_name, py_import) = matcher.query(search).unwrap();
        assert_eq!(type_name, name);
        assert_eq!(py_import.to_string(), origin);
        assert!(type_name.starts_with(py_import.target()));
    }

    #[rstest]
    #[case("~.bar.Baz.Gul")]
    #[case("~.Baz.Gul")]
    #[case("~.Gul")]
    fn undeclared_nested_member_never_matches_abbreviated(#[case] search: &str) {
        let matcher = test_matcher();
        assert_eq!(matcher.query(search), None);
    }

    #[rstest]
    #[case("np", "np", "import numpy as np")]
    #[case("np.doesnt_exist", "np.doesnt_exist", "import numpy as np")]
    #[case("foo.bar.Baz.Gul", "Baz.Gul", "from foo.bar import Baz")]
    fn query_prefix(#[case] search: &str, #[case] name: &str, #[case] origin: &str) {
        let mut matcher = test_matcher();
        matcher.add_types([(
            "np".to_string(),
            PyImport::import("numpy").with_alias("np").unwrap(),
        )]);
        let (type_name, py_import) = matcher.query(search).unwrap();
        assert_eq!(type_name, name);
        assert_eq!(py_import.to_string(), origin);
    }

    #[test]
    fn longest_declared_path_wins_for_suffix() {
        let mut matcher = TypeMatcher::empty();
        matcher.add_types([
            ("a.Baz".to_string(), PyImport::from_import("a", "Baz")),
            (
                "long.er.path.Baz".to_string(),
                PyImport::from_import("long.er.path", "Baz"),
            ),
        ]);
        let (_, py_import) = matcher.query("~.Baz").unwrap();
        assert_eq!(py_import.to_string(), "from long.er.path import Baz");
    }

    #[rstest]
    #[case("Iterable", "collections.abc")]
    #[case("collections.abc.Iterable", "collections.abc")]
    #[case("Literal", "typing")]
    #[case("typing.Literal", "typing")]
    fn common_known_types_query(#[case] search: &str, #[case] module: &str) {
        let matcher = TypeMatcher::new();
        let (type_name, py_import) = matcher.query(search).unwrap();
        assert_eq!(type_name, search.split('.').next_back().unwrap());
        assert_eq!(py_import.source_module(), Some(module));
    }

    #[test]
    fn builtins_resolve_without_import() {
        let matcher = TypeMatcher::new();
        let (name, py_import) = matcher.query("int").unwrap();
        assert_eq!(name, "int");
        assert!(!py_import.has_import());
    }

    #[test]
    fn nested_nicknames() {
        let mut matcher = TypeMatcher::empty();
        matcher.add_types([
            ("Foo".to_string(), PyImport::builtin("Foo")),
            ("Bar".to_string(), PyImport::builtin("Bar")),
        ]);
        matcher.add_nicknames([
            ("Foo".to_string(), "~.Baz".to_string()),
            ("~.Baz".to_string(), "B.i.k".to_string()),
            ("B.i.k".to_string(), "Bar".to_string()),
        ]);
        let (name, py_import) = matcher.query("Foo").unwrap();
        assert_eq!(name, "Bar");
        assert_eq!(py_import, PyImport::builtin("Bar"));
    }

    #[test]
    fn nickname_infinite_loop() {
        let mut matcher = TypeMatcher::empty();
        matcher.add_types([
            ("Foo".to_string(), PyImport::builtin("Foo")),
            ("Bar".to_string(), PyImport::builtin("Bar")),
        ]);
        matcher.add_nicknames([
            ("Foo".to_string(), "Bar".to_string()),
            ("Bar".to_string(), "Foo".to_string()),
        ]);
        let (name, py_import) = matcher.query("Foo").unwrap();
        assert_eq!(name, "Foo");
        assert_eq!(py_import, PyImport::builtin("Foo"));
    }

    #[test]
    fn no_match() {
        let matcher = TypeMatcher::empty();
        assert_eq!(matcher.query("doesnt.exist"), None);
    }
}
