//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::config::Mode;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Environment variable holding the log filter
const LOG_ENV: &str = "ASSETPIPE_LOG";

/// Assetpipe - build a stylesheet bundle and a WASM application into one directory
#[derive(Parser)]
#[command(name = "assetpipe")]
#[command(about = "Assetpipe - build a stylesheet bundle and a WASM application into one directory")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every enabled pipeline into the output directory
    Build {
        /// Build mode: development (maps, no minify) or production
        #[arg(short, long)]
        mode: Option<Mode>,

        /// Override output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Path to assetpipe.toml (default: search upwards from the current directory)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pipelines to run concurrently (0 = one per CPU)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Skip the stylesheet pipeline
        #[arg(long)]
        no_style: bool,

        /// Skip the application pipeline
        #[arg(long)]
        no_app: bool,

        /// Watch for changes and rebuild automatically
        #[arg(short, long)]
        watch: bool,

        /// Validate and list outputs without running any tool
        #[arg(long)]
        dry_run: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Report progress as JSON lines on stderr
        #[arg(long)]
        json: bool,
    },

    /// Write a starter assetpipe.toml
    Init {
        /// Project directory (default: current directory)
        path: Option<PathBuf>,

        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,
    },
}

/// Install the tracing subscriber.
///
/// `ASSETPIPE_LOG` takes precedence; otherwise `debug` when verbose, `warn` when not.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "assetpipe=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

/// Parse arguments and run the selected command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { mode, out, config, jobs, no_style, no_app, watch, dry_run, verbose, json } => {
            init_tracing(verbose);
            ExitCode::from(build::run_build(build::BuildArgs {
                mode,
                out,
                config,
                jobs,
                no_style,
                no_app,
                watch,
                dry_run,
                verbose,
                json,
            }))
        }
        Commands::Init { path, name } => {
            init_tracing(false);
            ExitCode::from(build::run_init(path.as_deref(), name.as_deref()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build_flags() {
        let cli = Cli::try_parse_from([
            "assetpipe", "build", "--mode", "development", "--out", "public", "--jobs", "2", "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Build { mode, out, jobs, dry_run, watch, .. } => {
                assert_eq!(mode, Some(Mode::Development));
                assert_eq!(out, Some(PathBuf::from("public")));
                assert_eq!(jobs, Some(2));
                assert!(dry_run);
                assert!(!watch);
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(Cli::try_parse_from(["assetpipe", "build", "--mode", "staging"]).is_err());
    }

    #[test]
    fn test_parse_init() {
        let cli = Cli::try_parse_from(["assetpipe", "init", "web", "--name", "edge-frame"]).unwrap();
        match cli.command {
            Commands::Init { path, name } => {
                assert_eq!(path, Some(PathBuf::from("web")));
                assert_eq!(name.as_deref(), Some("edge-frame"));
            }
            _ => panic!("expected init"),
        }
    }
}
