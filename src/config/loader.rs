//! Configuration loading and discovery for `assetpipe.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::{
    AppConfig, BuildConfig, Mode, PipeConfig, ProjectConfig, StyleConfig, WatchConfig,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "assetpipe.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse assetpipe.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override output directory
    pub out: Option<PathBuf>,
    /// Override build mode
    pub mode: Option<Mode>,
    /// Number of parallel pipelines
    pub jobs: Option<usize>,
    /// Skip the stylesheet pipeline
    pub no_style: bool,
    /// Skip the application pipeline
    pub no_app: bool,
}

/// Find assetpipe.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    let cwd = env::current_dir().ok()?;
    find_config_from(cwd)
}

/// Find assetpipe.toml by walking up from a specific directory.
///
/// This is the internal implementation that allows specifying the start directory,
/// useful for testing.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from an assetpipe.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns a default
/// configuration.
///
/// # Example
/// ```ignore
/// let config = load_config(None)?;
/// let config = load_config(Some(Path::new("web/assetpipe.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<PipeConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => load_config_file(&p),
        None => Ok(default_config()),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<PipeConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: PipeConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Create a default configuration when no assetpipe.toml is found.
///
/// The project name is taken from the current directory name.
pub fn default_config() -> PipeConfig {
    let project_name = env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unnamed".to_string());

    PipeConfig {
        project: ProjectConfig {
            name: project_name,
            out: PathBuf::from("dist"),
            mode: Mode::Production,
        },
        style: StyleConfig::default(),
        app: AppConfig::default(),
        build: BuildConfig::default(),
        watch: WatchConfig::default(),
    }
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut PipeConfig, overrides: &CliOverrides) {
    if let Some(ref out) = overrides.out {
        config.project.out = out.clone();
    }

    if let Some(mode) = overrides.mode {
        config.project.mode = mode;
    }

    if let Some(jobs) = overrides.jobs {
        config.build.jobs = jobs.max(1);
    }

    if overrides.no_style {
        config.style.enabled = false;
    }

    if overrides.no_app {
        config.app.enabled = false;
    }
}

/// Get the project root directory from a config file path.
///
/// Returns the parent directory of the assetpipe.toml file.
pub fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

/// Render the starter configuration written by `assetpipe init`.
pub fn starter_config(name: &str) -> String {
    format!(
        r#"[project]
name = "{name}"
out = "dist"
mode = "production"

[style]
entry = "js/app.scss"
output = "bundle.css"
include_paths = ["node_modules"]
browsers = ["defaults"]

[app]
static_dir = "static"
crate_dir = "."

[app.entries]
index = "js/index.js"

[app.native]
tool = "wasm-pack"
out_dir = "pkg"
target = "web"

[app.bundler]
tool = "esbuild"
"#
    )
}
