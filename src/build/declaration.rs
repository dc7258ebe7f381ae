//! Pipeline declarations.
//!
//! A declaration is the immutable description of one pipeline for one build
//! invocation: its entry points, the shared output directory, the transform
//! chain applied to its sources and the plugins that run before it is built.

use super::chain::TransformChain;
use super::error::BuildError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Which kind of pipeline a declaration describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Style,
    Application,
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineKind::Style => write!(f, "style"),
            PipelineKind::Application => write!(f, "application"),
        }
    }
}

/// A single option value attached to a transform step or plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Text(String),
    List(Vec<String>),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Integer(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        OptionValue::List(value)
    }
}

/// Named options of a step or plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepOptions(BTreeMap<String, OptionValue>);

impl StepOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<OptionValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.0.get(name)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.0.get(name) {
            Some(OptionValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(OptionValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        match self.0.get(name) {
            Some(OptionValue::List(items)) => Some(items),
            _ => None,
        }
    }

    /// A path-valued option (stored as text).
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        self.text(name).map(PathBuf::from)
    }

    pub fn paths(&self, name: &str) -> Vec<PathBuf> {
        self.list(name).map(|items| items.iter().map(PathBuf::from).collect()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Transformation applied to a stylesheet source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformKind {
    /// Compile the preprocessor language to CSS
    StyleCompile,
    /// Vendor-prefix the compiled CSS
    PostProcess,
    /// Turn the processed stylesheet into the final CSS text
    Extract,
    /// Write the CSS text to a fixed file name
    FileEmit,
}

impl TransformKind {
    /// Position in the only valid execution order.
    pub fn rank(self) -> u8 {
        match self {
            TransformKind::StyleCompile => 0,
            TransformKind::PostProcess => 1,
            TransformKind::Extract => 2,
            TransformKind::FileEmit => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TransformKind::StyleCompile => "style-compile",
            TransformKind::PostProcess => "post-process",
            TransformKind::Extract => "extract",
            TransformKind::FileEmit => "file-emit",
        }
    }
}

impl std::fmt::Display for TransformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One step of a [`TransformChain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformStep {
    pub kind: TransformKind,
    #[serde(default, skip_serializing_if = "StepOptions::is_empty")]
    pub options: StepOptions,
}

impl TransformStep {
    pub fn new(kind: TransformKind) -> Self {
        Self { kind, options: StepOptions::new() }
    }

    pub fn with_options(kind: TransformKind, options: StepOptions) -> Self {
        Self { kind, options }
    }
}

/// Pre-build plugin of an application pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginKind {
    /// Copy a static directory verbatim into the output
    StaticCopy,
    /// Compile the native crate to WASM plus glue
    NativeCompile,
}

impl PluginKind {
    pub fn label(self) -> &'static str {
        match self {
            PluginKind::StaticCopy => "static-copy",
            PluginKind::NativeCompile => "native-compile",
        }
    }
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A plugin with its configuration and position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInvocation {
    pub kind: PluginKind,
    #[serde(default)]
    pub config: StepOptions,
    /// Plugins run in ascending order of this value
    pub execution_order: u32,
}

impl PluginInvocation {
    pub fn new(kind: PluginKind, execution_order: u32, config: StepOptions) -> Self {
        Self { kind, config, execution_order }
    }
}

/// A path a declaration reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredInput {
    pub path: PathBuf,
    /// Short label used in error messages
    pub what: &'static str,
    pub is_dir: bool,
}

impl DeclaredInput {
    fn file(path: PathBuf, what: &'static str) -> Self {
        Self { path, what, is_dir: false }
    }

    fn dir(path: PathBuf, what: &'static str) -> Self {
        Self { path, what, is_dir: true }
    }
}

/// Immutable description of one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDeclaration {
    pub name: String,
    pub kind: PipelineKind,
    /// Logical name to source path
    pub entry_points: BTreeMap<String, PathBuf>,
    /// Output directory shared by every declaration of a build
    pub output_path: PathBuf,
    pub transform_chain: TransformChain,
    #[serde(default)]
    pub plugins: Vec<PluginInvocation>,
    /// Directory external tools resolve relative paths from; the process
    /// working directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl PipelineDeclaration {
    /// Check the invariants that hold for a declaration in isolation.
    ///
    /// Does not touch the filesystem; see [`PipelineDeclaration::check_inputs`].
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.entry_points.is_empty() {
            return Err(BuildError::InvalidDeclaration(format!(
                "'{}' declares no entry points",
                self.name
            )));
        }

        match self.kind {
            PipelineKind::Style => {
                if self.entry_points.len() != 1 {
                    return Err(BuildError::InvalidDeclaration(format!(
                        "style pipeline '{}' must have exactly one source, found {}",
                        self.name,
                        self.entry_points.len()
                    )));
                }
                if self.transform_chain.is_empty() {
                    return Err(BuildError::ChainOrder(format!(
                        "style pipeline '{}' has no transform chain",
                        self.name
                    )));
                }
                self.transform_chain.validate()?;
                if !self.plugins.is_empty() {
                    return Err(BuildError::InvalidDeclaration(format!(
                        "style pipeline '{}' does not take plugins",
                        self.name
                    )));
                }
            }
            PipelineKind::Application => {
                self.ordered_plugins()?;
            }
        }

        Ok(())
    }

    /// Plugins in execution order.
    ///
    /// Fails on duplicate kinds or when native compilation is placed before
    /// the static copy.
    pub fn ordered_plugins(&self) -> Result<Vec<&PluginInvocation>, BuildError> {
        let mut plugins: Vec<&PluginInvocation> = self.plugins.iter().collect();
        plugins.sort_by_key(|p| p.execution_order);

        for (i, plugin) in plugins.iter().enumerate() {
            if plugins[..i].iter().any(|p| p.kind == plugin.kind) {
                return Err(BuildError::InvalidDeclaration(format!(
                    "'{}' declares the {} plugin more than once",
                    self.name, plugin.kind
                )));
            }
        }

        let position = |kind| plugins.iter().position(|p| p.kind == kind);
        if let (Some(copy), Some(native)) =
            (position(PluginKind::StaticCopy), position(PluginKind::NativeCompile))
        {
            if native < copy {
                return Err(BuildError::InvalidDeclaration(format!(
                    "'{}' runs native-compile before static-copy",
                    self.name
                )));
            }
        }

        Ok(plugins)
    }

    pub fn plugin(&self, kind: PluginKind) -> Option<&PluginInvocation> {
        self.plugins.iter().find(|p| p.kind == kind)
    }

    /// Every filesystem input the declaration reads.
    pub fn input_paths(&self) -> Vec<DeclaredInput> {
        let mut inputs = Vec::new();
        for path in self.entry_points.values() {
            inputs.push(DeclaredInput::file(path.clone(), "entry point"));
        }
        if let Some(copy) = self.plugin(PluginKind::StaticCopy) {
            if let Some(dir) = copy.config.path("from") {
                inputs.push(DeclaredInput::dir(dir, "static directory"));
            }
        }
        if let Some(native) = self.plugin(PluginKind::NativeCompile) {
            if let Some(dir) = native.config.path("crate_dir") {
                inputs.push(DeclaredInput::dir(dir, "crate directory"));
            }
        }
        inputs
    }

    /// Verify every input exists with the right type: entry points are
    /// files, static and crate directories are directories.
    pub fn check_inputs(&self) -> Result<(), BuildError> {
        for input in self.input_paths() {
            if !input.path.exists() {
                return Err(BuildError::missing_input(input.path, input.what));
            }
            let (present, expected) = if input.is_dir {
                (input.path.is_dir(), "directory")
            } else {
                (input.path.is_file(), "file")
            };
            if !present {
                return Err(BuildError::wrong_input_type(input.path, input.what, expected));
            }
        }
        Ok(())
    }

    /// Directories worth watching for changes to this pipeline.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self
            .input_paths()
            .into_iter()
            .map(|input| {
                if input.is_dir {
                    input.path
                } else {
                    input.path.parent().map(Path::to_path_buf).unwrap_or(input.path)
                }
            })
            .collect();
        roots.sort();
        roots.dedup();
        roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn app_declaration(plugins: Vec<PluginInvocation>) -> PipelineDeclaration {
        PipelineDeclaration {
            name: "app".to_string(),
            kind: PipelineKind::Application,
            entry_points: BTreeMap::from([("index".to_string(), PathBuf::from("js/index.js"))]),
            output_path: PathBuf::from("dist"),
            transform_chain: TransformChain::empty(),
            plugins,
            working_dir: None,
        }
    }

    #[test]
    fn test_step_options_accessors() {
        let options = StepOptions::new()
            .with("bundler_importer", false)
            .with("output", "bundle.css")
            .with("include_paths", vec!["node_modules".to_string()]);

        assert_eq!(options.bool("bundler_importer"), Some(false));
        assert_eq!(options.text("output"), Some("bundle.css"));
        assert_eq!(options.paths("include_paths"), vec![PathBuf::from("node_modules")]);
        assert_eq!(options.text("bundler_importer"), None);
        assert!(options.paths("missing").is_empty());
    }

    #[test]
    fn test_option_value_untagged_serde() {
        let options: StepOptions =
            serde_json::from_str(r#"{"minify": true, "level": 2, "name": "x", "paths": ["a"]}"#)
                .unwrap();
        assert_eq!(options.get("minify"), Some(&OptionValue::Bool(true)));
        assert_eq!(options.get("level"), Some(&OptionValue::Integer(2)));
        assert_eq!(options.get("name"), Some(&OptionValue::Text("x".to_string())));
        assert_eq!(options.list("paths"), Some(&["a".to_string()][..]));
    }

    #[test]
    fn test_empty_entry_points_rejected() {
        let mut decl = app_declaration(vec![]);
        decl.entry_points.clear();
        assert!(matches!(decl.validate(), Err(BuildError::InvalidDeclaration(_))));
    }

    #[test]
    fn test_plugins_sorted_by_execution_order() {
        let decl = app_declaration(vec![
            PluginInvocation::new(PluginKind::NativeCompile, 1, StepOptions::new()),
            PluginInvocation::new(PluginKind::StaticCopy, 0, StepOptions::new()),
        ]);
        let kinds: Vec<PluginKind> = decl.ordered_plugins().unwrap().iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![PluginKind::StaticCopy, PluginKind::NativeCompile]);
    }

    #[test]
    fn test_native_before_copy_rejected() {
        let decl = app_declaration(vec![
            PluginInvocation::new(PluginKind::StaticCopy, 5, StepOptions::new()),
            PluginInvocation::new(PluginKind::NativeCompile, 1, StepOptions::new()),
        ]);
        assert!(matches!(decl.validate(), Err(BuildError::InvalidDeclaration(_))));
    }

    #[test]
    fn test_duplicate_plugin_rejected() {
        let decl = app_declaration(vec![
            PluginInvocation::new(PluginKind::StaticCopy, 0, StepOptions::new()),
            PluginInvocation::new(PluginKind::StaticCopy, 1, StepOptions::new()),
        ]);
        let err = decl.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_style_requires_chain() {
        let decl = PipelineDeclaration {
            name: "style".to_string(),
            kind: PipelineKind::Style,
            entry_points: BTreeMap::from([("style".to_string(), PathBuf::from("js/app.scss"))]),
            output_path: PathBuf::from("dist"),
            transform_chain: TransformChain::empty(),
            plugins: vec![],
            working_dir: None,
        };
        assert!(matches!(decl.validate(), Err(BuildError::ChainOrder(_))));
    }

    #[test]
    fn test_check_inputs_reports_missing_path() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("index.js");
        fs::write(&present, "").unwrap();

        let mut decl = app_declaration(vec![PluginInvocation::new(
            PluginKind::StaticCopy,
            0,
            StepOptions::new().with("from", temp.path().join("static").display().to_string()),
        )]);
        decl.entry_points.insert("index".to_string(), present);

        match decl.check_inputs() {
            Err(BuildError::Filesystem { path, .. }) => assert_eq!(path, temp.path().join("static")),
            other => panic!("expected Filesystem error, got {:?}", other),
        }
    }

    #[test]
    fn test_check_inputs_rejects_directory_entry_point() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("index.js");
        fs::create_dir_all(&entry).unwrap();

        let mut decl = app_declaration(vec![]);
        decl.entry_points.insert("index".to_string(), entry.clone());

        match decl.check_inputs() {
            Err(err @ BuildError::Filesystem { .. }) => {
                assert!(err.to_string().contains("index.js"), "{}", err);
                assert!(matches!(&err, BuildError::Filesystem { path, .. } if *path == entry));
            }
            other => panic!("expected Filesystem error, got {:?}", other),
        }
    }

    #[test]
    fn test_check_inputs_rejects_file_as_crate_directory() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("index.js");
        let crate_dir = temp.path().join("Cargo.toml");
        fs::write(&entry, "").unwrap();
        fs::write(&crate_dir, "[package]").unwrap();

        let mut decl = app_declaration(vec![PluginInvocation::new(
            PluginKind::NativeCompile,
            1,
            StepOptions::new().with("crate_dir", crate_dir.display().to_string()),
        )]);
        decl.entry_points.insert("index".to_string(), entry);

        match decl.check_inputs() {
            Err(BuildError::Filesystem { path, source }) => {
                assert_eq!(path, crate_dir);
                assert!(source.to_string().contains("crate directory is not a directory"));
            }
            other => panic!("expected Filesystem error, got {:?}", other),
        }
    }

    #[test]
    fn test_watch_roots_use_parent_of_files() {
        let temp = TempDir::new().unwrap();
        let js = temp.path().join("js");
        fs::create_dir_all(&js).unwrap();
        fs::write(js.join("index.js"), "").unwrap();

        let mut decl = app_declaration(vec![]);
        decl.entry_points.insert("index".to_string(), js.join("index.js"));
        assert_eq!(decl.watch_roots(), vec![js]);
    }
}
