//! Configuration schema types for `assetpipe.toml`
//!
//! Defines the structure and validation rules for an assetpipe project.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Build mode selector
///
/// Controls minification and source-map emission across every tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Unminified output with source maps
    Development,
    /// Minified output, no source maps
    #[default]
    Production,
}

impl Mode {
    /// Whether outputs should be minified.
    pub fn minify(self) -> bool {
        matches!(self, Mode::Production)
    }

    /// Whether source maps should be emitted.
    pub fn source_maps(self) -> bool {
        matches!(self, Mode::Development)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Development => write!(f, "development"),
            Mode::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(format!("unknown mode '{}' (expected development or production)", other)),
        }
    }
}

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required)
    pub name: String,
    /// Shared output directory for every pipeline
    #[serde(default = "default_out")]
    pub out: PathBuf,
    /// Build mode
    #[serde(default)]
    pub mode: Mode,
}

fn default_out() -> PathBuf {
    PathBuf::from("dist")
}

/// Stylesheet pipeline section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Enable the stylesheet pipeline
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Stylesheet source file
    #[serde(default = "default_style_entry")]
    pub entry: PathBuf,
    /// Fixed name of the emitted CSS file
    #[serde(default = "default_style_output")]
    pub output: String,
    /// Directories searched by the compiler for imports
    #[serde(default = "default_include_paths")]
    pub include_paths: Vec<PathBuf>,
    /// Browserslist queries driving vendor prefixing
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
    /// Stylesheet compiler executable
    #[serde(default = "default_style_compiler")]
    pub compiler: String,
    /// Extra arguments passed to the compiler
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_style_entry() -> PathBuf {
    PathBuf::from("js/app.scss")
}

fn default_style_output() -> String {
    "bundle.css".to_string()
}

fn default_include_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("node_modules")]
}

fn default_browsers() -> Vec<String> {
    vec!["defaults".to_string()]
}

fn default_style_compiler() -> String {
    "sass".to_string()
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            entry: default_style_entry(),
            output: default_style_output(),
            include_paths: default_include_paths(),
            browsers: default_browsers(),
            compiler: default_style_compiler(),
            args: vec![],
        }
    }
}

/// Native (WASM) compile settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeConfig {
    /// Native compiler executable
    #[serde(default = "default_native_tool")]
    pub tool: String,
    /// Directory for the binary and glue, relative to the output directory
    #[serde(default = "default_native_out_dir")]
    pub out_dir: PathBuf,
    /// Glue flavour passed as `--target`
    #[serde(default = "default_native_target")]
    pub target: String,
    /// Base name for the generated files (defaults to the crate name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_name: Option<String>,
    /// Extra arguments passed to the compiler
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_native_tool() -> String {
    "wasm-pack".to_string()
}

fn default_native_out_dir() -> PathBuf {
    PathBuf::from("pkg")
}

fn default_native_target() -> String {
    "web".to_string()
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            tool: default_native_tool(),
            out_dir: default_native_out_dir(),
            target: default_native_target(),
            out_name: None,
            args: vec![],
        }
    }
}

/// Module bundler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundlerConfig {
    /// Bundler executable
    #[serde(default = "default_bundler_tool")]
    pub tool: String,
    /// Extra arguments passed to the bundler
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_bundler_tool() -> String {
    "esbuild".to_string()
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self { tool: default_bundler_tool(), args: vec![] }
    }
}

/// Application pipeline section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Enable the application pipeline
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Logical entry name to JS entry point
    #[serde(default = "default_entries")]
    pub entries: BTreeMap<String, PathBuf>,
    /// Static assets copied verbatim (omit to skip the copy step)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<PathBuf>,
    /// Root of the native crate
    #[serde(default = "default_crate_dir")]
    pub crate_dir: PathBuf,
    /// Native compile settings
    #[serde(default)]
    pub native: NativeConfig,
    /// Bundler settings
    #[serde(default)]
    pub bundler: BundlerConfig,
}

fn default_entries() -> BTreeMap<String, PathBuf> {
    BTreeMap::from([("index".to_string(), PathBuf::from("js/index.js"))])
}

fn default_crate_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            entries: default_entries(),
            static_dir: None,
            crate_dir: default_crate_dir(),
            native: NativeConfig::default(),
            bundler: BundlerConfig::default(),
        }
    }
}

/// Build execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Pipelines run concurrently when greater than one
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

fn default_jobs() -> usize {
    1
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { jobs: default_jobs() }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default = "default_true")]
    pub clear_screen: bool,
    /// Additional paths to watch besides the pipeline inputs
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100, clear_screen: true, paths: vec![] }
    }
}

/// Complete assetpipe.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeConfig {
    /// Project metadata (required)
    pub project: ProjectConfig,
    /// Stylesheet pipeline
    #[serde(default)]
    pub style: StyleConfig,
    /// Application pipeline
    #[serde(default)]
    pub app: AppConfig,
    /// Execution settings
    #[serde(default)]
    pub build: BuildConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "style.output")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "assetpipe.toml: '{}' {}", self.field, self.message)
    }
}

impl PipeConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        if !self.style.enabled && !self.app.enabled {
            errors.push(ConfigValidationError {
                field: "style.enabled".to_string(),
                message: "at least one of [style] or [app] must be enabled".to_string(),
            });
        }

        if self.style.enabled {
            if !is_plain_file_name(&self.style.output) {
                errors.push(ConfigValidationError {
                    field: "style.output".to_string(),
                    message: "must be a plain file name without directories".to_string(),
                });
            }
            if self.style.browsers.is_empty() {
                errors.push(ConfigValidationError {
                    field: "style.browsers".to_string(),
                    message: "must contain at least one browserslist query".to_string(),
                });
            }
            if self.style.compiler.is_empty() {
                errors.push(ConfigValidationError {
                    field: "style.compiler".to_string(),
                    message: "must name an executable".to_string(),
                });
            }
        }

        if self.app.enabled {
            if self.app.entries.is_empty() {
                errors.push(ConfigValidationError {
                    field: "app.entries".to_string(),
                    message: "must declare at least one entry point".to_string(),
                });
            }
            for name in self.app.entries.keys() {
                if !is_plain_file_name(name) {
                    errors.push(ConfigValidationError {
                        field: format!("app.entries.{}", name),
                        message: "entry names become file names and must not contain '/'"
                            .to_string(),
                    });
                }
            }
            if !is_nested_dir(&self.app.native.out_dir) {
                errors.push(ConfigValidationError {
                    field: "app.native.out_dir".to_string(),
                    message: "must name a subdirectory of the output directory".to_string(),
                });
            }
        }

        if self.build.jobs == 0 {
            errors.push(ConfigValidationError {
                field: "build.jobs".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && name != "." && name != ".."
}

/// A relative path that, after dropping `.` segments, still names something
/// strictly below its base.
fn is_nested_dir(path: &Path) -> bool {
    let mut normal = 0;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(_) => normal += 1,
            _ => return false,
        }
    }
    normal > 0
}
