//! Utility functions and helpers for stubcast.

use std::path::Path;

/// Returns the left-to-right accumulated prefixes of a dotted name.
///
/// `"a.b.c"` yields `["a", "a.b", "a.b.c"]`.
pub fn accumulate_qualname(qualname: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for fragment in qualname.split('.') {
        if !current.is_empty() {
            current.push('.');
        }
        current.push_str(fragment);
        out.push(current.clone());
    }
    out
}

/// Formats a string such that it can be used as a valid Python identifier.
///
/// Runs of non-identifier characters collapse into a single underscore, and
/// a leading digit gets an underscore prefix.
pub fn escape_qualname(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut previous_escaped = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            previous_escaped = false;
        } else if !previous_escaped {
            out.push('_');
            previous_escaped = true;
        }
    }
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Finds the full dotted name of a module within its package from its path.
///
/// Walks up from the file as long as the parent directory contains an
/// `__init__.py`, so `pkg/sub/module.py` becomes `pkg.sub.module` and
/// `pkg/__init__.py` becomes `pkg`.
pub fn module_name_from_path(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some("py")
        && path.extension().and_then(|e| e.to_str()) != Some("pyi")
    {
        return None;
    }

    let mut parts = Vec::new();
    if path.file_stem().and_then(|s| s.to_str()) != Some("__init__") {
        parts.push(path.file_stem()?.to_str()?.to_string());
    }

    let mut directory = path.parent()?;
    while directory.join("__init__.py").is_file() || directory.join("__init__.pyi").is_file() {
        parts.insert(0, directory.file_name()?.to_str()?.to_string());
        directory = directory.parent()?;
    }

    if parts.is_empty() {
        return None;
    }
    Some(parts.join("."))
}

/// Removes the common leading indentation from every line of a docstring.
pub fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut lines = text.lines();
    let mut out = String::with_capacity(text.len());
    if let Some(first) = lines.next() {
        out.push_str(first.trim_start());
    }
    for line in lines {
        out.push('\n');
        if line.len() >= margin {
            out.push_str(&line[margin..]);
        } else {
            out.push_str(line.trim_start());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_accumulate_qualname() {
        assert_eq!(accumulate_qualname("a.b.c"), vec!["a", "a.b", "a.b.c"]);
        assert_eq!(accumulate_qualname("solo"), vec!["solo"]);
    }

    #[test]
    fn test_escape_qualname() {
        assert_eq!(escape_qualname("np.int8"), "np_int8");
        assert_eq!(escape_qualname("array-like"), "array_like");
        assert_eq!(escape_qualname("~.Foo"), "_Foo");
        assert_eq!(escape_qualname("# comment (with braces)"), "_comment_with_braces_");
        assert_eq!(escape_qualname("3d"), "_3d");
    }

    #[test]
    fn test_module_name_from_path() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("pkg");
        let sub = pkg.join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::write(pkg.join("__init__.py"), "").unwrap();
        fs::write(sub.join("__init__.py"), "").unwrap();
        let module = sub.join("module.py");
        fs::write(&module, "").unwrap();

        assert_eq!(
            module_name_from_path(&module),
            Some("pkg.sub.module".to_string())
        );
        assert_eq!(
            module_name_from_path(&sub.join("__init__.py")),
            Some("pkg.sub".to_string())
        );
    }

    #[test]
    fn test_dedent() {
        let text = "First line.\n\n    Parameters\n    ----------\n    a : int\n";
        let dedented = dedent(text);
        assert!(dedented.contains("\nParameters\n"));
        assert!(dedented.contains("\na : int"));
    }
}
