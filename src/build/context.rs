//! Build context containing configuration and state for a build.

use crate::config::{Mode, PipeConfig};
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a build operation.
///
/// Pipeline declarations are derived from the context, so every path they
/// carry is already resolved against the project root.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: PipeConfig,
    /// Project root directory (where assetpipe.toml is located)
    project_root: PathBuf,
    /// Whether to run in verbose mode
    verbose: bool,
}

impl BuildContext {
    /// Create a new build context.
    ///
    /// A relative `project_root` is anchored at the current directory so that
    /// tools run from other working directories see the same paths.
    pub fn new(config: PipeConfig, project_root: PathBuf) -> Self {
        let project_root = if project_root.is_absolute() {
            project_root
        } else {
            std::env::current_dir().map(|cwd| cwd.join(&project_root)).unwrap_or(project_root)
        };
        Self { config, project_root, verbose: false }
    }

    /// Get the configuration.
    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the output directory (resolved to absolute path).
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.out)
    }

    pub fn mode(&self) -> Mode {
        self.config.project.mode
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Override the build mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.config.project.mode = mode;
        self
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }
}
