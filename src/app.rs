//! Orchestration of the stub-generation pipeline.
//!
//! Configuration is loaded and merged, the package is scanned for known
//! types, and every module is transformed sequentially. A stub is only
//! written after its full text exists in memory, and no error crosses the
//! single-module boundary: failed modules are skipped and reported while
//! the run continues.

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::Serialize;

use crate::collect::TypeCollector;
use crate::config::Config;
use crate::error::Result;
use crate::report::{Context, Stats};
use crate::resolve::TypeMatcher;
use crate::stubs::{StubTransformer, STUB_HEADER_COMMENT};
use crate::utils::module_name_from_path;
use crate::walk;

/// Options for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Root directory of the Python package.
    pub root_path: PathBuf,
    /// Write stubs here instead of next to their sources.
    pub out_dir: Option<PathBuf>,
    /// Explicit configuration files; otherwise `pyproject.toml` and
    /// `stubcast.toml` in the working directory are consulted.
    pub config_paths: Vec<PathBuf>,
    /// Additional ignore globs on top of the configured ones.
    pub ignore: Vec<String>,
    /// Allow this many errors before a non-zero exit status.
    pub allow_errors: usize,
    /// Report statistics without writing any stub.
    pub check_only: bool,
}

/// Aggregated outcome of one run.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    /// Modules that produced a stub (or passed through as one).
    pub processed: usize,
    /// Modules that could not be transformed at all.
    pub failed: usize,
    /// Annotation statistics across all modules.
    pub stats: Stats,
}

impl RunReport {
    /// Errors counted against `--allow-errors`.
    pub fn error_count(&self) -> usize {
        self.stats.syntax_errors + self.failed
    }
}

/// Transforms every module under `options.root_path` into a stub.
pub fn run(options: &RunOptions) -> Result<RunReport> {
    let config = load_config(&options.config_paths)?;
    let mut ignore = config.ignore.clone();
    ignore.extend(options.ignore.iter().cloned());

    let files = walk::walk_package(&options.root_path, &ignore)?;

    // The whole package is scanned before any module is transformed, so
    // the matcher database is complete and immutable during rewriting.
    let mut matcher = TypeMatcher::new();
    for path in &files {
        let Some(module) = module_name_from_path(path) else {
            continue;
        };
        match TypeCollector::collect_file(path, &module) {
            Ok(types) => {
                info!("collected {} types in {}", types.len(), path.display());
                matcher.add_types(types);
            }
            Err(err) => warn!("couldn't collect types in {}: {err}", path.display()),
        }
    }
    matcher.add_types(config.type_entries()?);
    matcher.add_nicknames(config.type_nicknames.clone());

    let mut transformer =
        StubTransformer::new(&matcher).with_replacements(config.replace_doctypes.clone());

    let mut report = RunReport::default();
    for path in &files {
        let source = fs::read_to_string(path)?;
        let stub_content = transform_module(&mut transformer, path, source, &mut report);
        report.stats.merge(transformer.collect_stats());
        let Some(stub_content) = stub_content else {
            continue;
        };
        report.processed += 1;

        if options.check_only {
            continue;
        }
        let target = walk::stub_path(path, &options.root_path, options.out_dir.as_deref());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, stub_content)?;
        info!("wrote {}", target.display());
    }

    info!(
        "{} matched annotations, {} doctype syntax errors",
        report.stats.matched, report.stats.syntax_errors
    );
    if !report.stats.unknown_names.is_empty() {
        warn!(
            "unknown type names:\n{}",
            report.stats.format_unknown_names()
        );
    }
    Ok(report)
}

/// Produces the stub text for one module, or `None` when it failed.
fn transform_module(
    transformer: &mut StubTransformer<'_>,
    path: &Path,
    source: String,
    report: &mut RunReport,
) -> Option<String> {
    // A previously generated stub fed back as input is a no-op, and
    // existing stub files take precedence over regeneration.
    if source.starts_with(STUB_HEADER_COMMENT) {
        info!("{} is already a generated stub", path.display());
        return Some(source);
    }
    if path.extension().and_then(|e| e.to_str()) == Some("pyi") {
        info!("using existing stub file {}", path.display());
        return Some(source);
    }

    let module = module_name_from_path(path);
    let ctx = Context::new().with_path(path);
    match transformer.python_to_stub(&source, &ctx, module.as_deref()) {
        Ok(stub) => Some(format!("{STUB_HEADER_COMMENT}\n\n{stub}")),
        Err(err) => {
            error!("failed to create stub for {}: {err}", path.display());
            report.failed += 1;
            None
        }
    }
}

fn load_config(paths: &[PathBuf]) -> Result<Config> {
    let mut config = Config::default();
    if paths.is_empty() {
        for candidate in ["pyproject.toml", "stubcast.toml"] {
            let path = Path::new(candidate);
            if path.is_file() {
                info!("using {}", path.display());
                config = config.merge(Config::from_toml(path)?);
            }
        }
    } else {
        for path in paths {
            info!("using {}", path.display());
            config = config.merge(Config::from_toml(path)?);
        }
    }
    Ok(config)
}
