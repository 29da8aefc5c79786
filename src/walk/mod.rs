//! Walking a Python package and mapping sources to stub targets.

use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Returns all stub-relevant source files under `root`, sorted.
///
/// `.pyi` files take precedence: a `.py` file is skipped when a stub
/// sibling exists. Files matching one of the `ignore` glob patterns
/// (relative to `root`) are skipped.
pub fn walk_package(root: &Path, ignore: &[String]) -> Result<Vec<PathBuf>> {
    let patterns = ignore
        .iter()
        .map(|raw| {
            glob::Pattern::new(raw.trim_start_matches('/'))
                .map_err(|err| Error::config_error(format!("invalid ignore pattern {raw:?}: {err}")))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut out = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| Error::Other(err.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let extension = path.extension().and_then(|e| e.to_str());
        if !matches!(extension, Some("py") | Some("pyi")) {
            continue;
        }
        if extension == Some("py") && path.with_extension("pyi").is_file() {
            debug!("skipping {}, stub file takes precedence", path.display());
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        if patterns.iter().any(|p| p.matches_path(relative)) {
            debug!("ignoring {}", path.display());
            continue;
        }
        out.push(path.to_path_buf());
    }
    Ok(out)
}

/// Maps a source file to the stub file it should produce.
///
/// With an `out_dir` the directory structure below `root` is mirrored
/// there; otherwise the stub lands next to its source.
pub fn stub_path(source: &Path, root: &Path, out_dir: Option<&Path>) -> PathBuf {
    let with_suffix = source.with_extension("pyi");
    match out_dir {
        Some(out_dir) => {
            let relative = with_suffix.strip_prefix(root).unwrap_or(&with_suffix);
            out_dir.join(relative)
        }
        None => with_suffix,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn pyi_takes_precedence() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("__init__.py"), "").unwrap();
        fs::write(root.join("a.py"), "").unwrap();
        fs::write(root.join("b.py"), "").unwrap();
        fs::write(root.join("b.pyi"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();

        let files = walk_package(root, &[]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["__init__.py", "a.py", "b.pyi"]);
    }

    #[test]
    fn ignore_patterns() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("generated")).unwrap();
        fs::write(root.join("a.py"), "").unwrap();
        fs::write(root.join("generated/b.py"), "").unwrap();

        let files = walk_package(root, &["generated/*".to_string()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.py"]);
    }

    #[test]
    fn stub_path_mapping() {
        let root = Path::new("/pkg");
        let source = Path::new("/pkg/sub/module.py");
        assert_eq!(
            stub_path(source, root, None),
            PathBuf::from("/pkg/sub/module.pyi")
        );
        assert_eq!(
            stub_path(source, root, Some(Path::new("/out"))),
            PathBuf::from("/out/sub/module.pyi")
        );
    }
}
