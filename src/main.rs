//! stubcast - Generate Python stub files from numpydoc-style docstrings.

use clap::Parser;
use log::LevelFilter;
use std::{io, path::PathBuf};

use stubcast::app::{run, RunOptions};
use stubcast::prelude::*;

/// Command-line interface for stubcast.
#[derive(Parser, Debug)]
#[command(
    name = "stubcast",
    version,
    about = "Generate Python stub files from numpydoc-style docstrings",
    long_about = None
)]
struct Cli {
    /// Sets the verbosity level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Generate stub files for the specified package
    Generate {
        /// Path to the package directory
        path: PathBuf,

        /// Write stubs into this directory instead of next to the sources
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Configuration file; otherwise pyproject.toml or stubcast.toml
        /// in the current directory are used. Can be used multiple times.
        #[arg(long = "config")]
        config_paths: Vec<PathBuf>,

        /// Ignore files matching this glob pattern. Can be used multiple
        /// times.
        #[arg(long)]
        ignore: Vec<String>,

        /// Allow this many or fewer errors before exiting with code 1
        #[arg(long, default_value_t = 0)]
        allow_errors: usize,
    },

    /// Check docstrings and report statistics without writing stubs
    Check {
        /// Path to the package directory
        path: PathBuf,

        /// Configuration file. Can be used multiple times.
        #[arg(long = "config")]
        config_paths: Vec<PathBuf>,

        /// Ignore files matching this glob pattern. Can be used multiple
        /// times.
        #[arg(long)]
        ignore: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn setup_logging(level: &str) -> Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    Ok(())
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level).map_err(io::Error::other)?;

    match cli.command {
        Commands::Generate {
            path,
            out_dir,
            config_paths,
            ignore,
            allow_errors,
        } => {
            let options = RunOptions {
                root_path: path,
                out_dir,
                config_paths,
                ignore,
                allow_errors,
                check_only: false,
            };
            match run(&options) {
                Ok(report) => {
                    if report.error_count() > options.allow_errors {
                        std::process::exit(1);
                    }
                }
                Err(err) => {
                    eprintln!("Generation failed: {err}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Check {
            path,
            config_paths,
            ignore,
            format,
        } => {
            let options = RunOptions {
                root_path: path,
                config_paths,
                ignore,
                check_only: true,
                ..RunOptions::default()
            };
            match run(&options) {
                Ok(report) => {
                    match format.as_str() {
                        "json" => match serde_json::to_string_pretty(&report) {
                            Ok(json) => println!("{json}"),
                            Err(err) => eprintln!("Failed to serialize JSON: {err}"),
                        },
                        _ => {
                            println!(
                                "{}: processed={}, matched={}, syntax_errors={}",
                                options.root_path.display(),
                                report.processed,
                                report.stats.matched,
                                report.stats.syntax_errors
                            );
                            if !report.stats.unknown_names.is_empty() {
                                println!("unknown names:\n{}", report.stats.format_unknown_names());
                            }
                        }
                    }
                    if report.error_count() > 0 {
                        std::process::exit(1);
                    }
                }
                Err(err) => {
                    eprintln!("Check failed: {err}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
