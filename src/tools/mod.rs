//! External tool capabilities.
//!
//! The build never reimplements the stylesheet language, the native compiler
//! or the module bundler. Each is reached through a small trait so the
//! orchestrator can run against the real CLIs or against test doubles:
//!
//! - [`StyleCompiler`] turns a stylesheet source into CSS (default: Dart Sass)
//! - [`NativeCompiler`] turns a crate into a `.wasm` binary plus JS glue
//!   (default: wasm-pack)
//! - [`Bundler`] bundles JS entry points into `<name>.js` files (default: esbuild)

pub mod esbuild;
pub mod sass;
pub mod wasm_pack;

pub use esbuild::EsbuildBundler;
pub use sass::SassCompiler;
pub use wasm_pack::WasmPackCompiler;

use crate::config::{Mode, PipeConfig};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Executable could not be located
    #[error("'{tool}' was not found on PATH")]
    NotFound { tool: String },
    /// The tool rejected its input as malformed source
    #[error("{tool} reported a syntax error:\n{diagnostics}")]
    Syntax { tool: String, diagnostics: String },
    /// The tool exited unsuccessfully
    #[error("{tool} exited with {}:\n{diagnostics}", describe_status(.status))]
    Failed { tool: String, status: Option<i32>, diagnostics: String },
    /// The process could not be spawned or its output could not be read
    #[error("failed to run {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    /// The tool succeeded but an expected artifact is absent
    #[error("{tool} succeeded but did not produce {what}")]
    MissingOutput { tool: String, what: String },
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Captured result of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code, if the process exited normally
    pub status: Option<i32>,
    /// Whether the process exited with status zero
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Diagnostics to surface to the user: stderr, or stdout if stderr is empty.
    pub fn diagnostics(&self) -> String {
        if self.stderr.trim().is_empty() {
            self.stdout.clone()
        } else {
            self.stderr.clone()
        }
    }

    /// Convert an unsuccessful run into [`ToolError::Failed`].
    pub fn into_failure(self, tool: &str) -> ToolError {
        ToolError::Failed { tool: tool.to_string(), status: self.status, diagnostics: self.diagnostics() }
    }
}

/// Locate `program` and run it to completion, capturing its output.
///
/// A non-zero exit is not an error here; callers decide how to classify it.
pub fn run_tool(
    program: &str,
    args: &[OsString],
    working_dir: Option<&Path>,
) -> Result<ToolOutput, ToolError> {
    let resolved =
        which::which(program).map_err(|_| ToolError::NotFound { tool: program.to_string() })?;

    tracing::debug!(tool = program, path = %resolved.display(), ?args, "running tool");

    let mut command = Command::new(&resolved);
    command.args(args);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    let output =
        command.output().map_err(|source| ToolError::Io { tool: program.to_string(), source })?;

    let result = ToolOutput {
        status: output.status.code(),
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    tracing::debug!(tool = program, status = ?result.status, "tool finished");
    Ok(result)
}

/// Input to a [`StyleCompiler`].
#[derive(Debug, Clone)]
pub struct StyleRequest<'a> {
    /// Stylesheet source file
    pub source: &'a Path,
    /// Directories searched for `@import` / `@use`
    pub include_paths: &'a [PathBuf],
    pub mode: Mode,
}

/// Plain CSS produced by a [`StyleCompiler`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledStyle {
    pub css: String,
    /// Source map JSON, present only when maps were requested and produced
    pub source_map: Option<String>,
}

/// Compiles a preprocessor stylesheet into plain CSS.
pub trait StyleCompiler: Send + Sync {
    /// Tool name used in diagnostics.
    fn name(&self) -> &str;

    /// Compile `request.source`, resolving imports against its include paths.
    fn compile(&self, request: &StyleRequest<'_>) -> Result<CompiledStyle, ToolError>;
}

/// Input to a [`NativeCompiler`].
#[derive(Debug, Clone)]
pub struct NativeRequest<'a> {
    /// Root of the crate to compile
    pub crate_dir: &'a Path,
    /// Directory receiving the binary and its glue
    pub out_dir: &'a Path,
    pub mode: Mode,
}

/// Files produced by a [`NativeCompiler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeArtifact {
    pub out_dir: PathBuf,
    /// The `.wasm` binary
    pub binary: PathBuf,
    /// JS glue modules importing the binary
    pub glue: Vec<PathBuf>,
}

/// Compiles a native crate to a web-loadable binary plus JS glue.
pub trait NativeCompiler: Send + Sync {
    fn name(&self) -> &str;

    fn compile(&self, request: &NativeRequest<'_>) -> Result<NativeArtifact, ToolError>;
}

/// Input to a [`Bundler`].
#[derive(Debug, Clone)]
pub struct BundleRequest<'a> {
    /// Logical entry name to entry point; each produces `<name>.js`
    pub entries: &'a BTreeMap<String, PathBuf>,
    pub out_dir: &'a Path,
    pub mode: Mode,
    /// Directory module resolution starts from
    pub working_dir: &'a Path,
}

/// Bundles JS entry points and their imports into one file per entry.
pub trait Bundler: Send + Sync {
    fn name(&self) -> &str;

    /// Bundle every entry, returning the files written.
    fn bundle(&self, request: &BundleRequest<'_>) -> Result<Vec<PathBuf>, ToolError>;
}

/// The set of tools one build invocation uses.
#[derive(Clone)]
pub struct Toolchain {
    pub style: Arc<dyn StyleCompiler>,
    pub native: Arc<dyn NativeCompiler>,
    pub bundler: Arc<dyn Bundler>,
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolchain")
            .field("style", &self.style.name())
            .field("native", &self.native.name())
            .field("bundler", &self.bundler.name())
            .finish()
    }
}

impl Toolchain {
    pub fn new(
        style: Arc<dyn StyleCompiler>,
        native: Arc<dyn NativeCompiler>,
        bundler: Arc<dyn Bundler>,
    ) -> Self {
        Self { style, native, bundler }
    }

    /// Build the CLI-backed toolchain described by the configuration.
    pub fn from_config(config: &PipeConfig) -> Self {
        Self {
            style: Arc::new(
                SassCompiler::new(&config.style.compiler).with_args(config.style.args.clone()),
            ),
            native: Arc::new(WasmPackCompiler::from_config(&config.app.native)),
            bundler: Arc::new(
                EsbuildBundler::new(&config.app.bundler.tool)
                    .with_args(config.app.bundler.args.clone()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_tool_missing_executable() {
        let result = run_tool("assetpipe-no-such-tool-x9", &[], None);
        match result {
            Err(ToolError::NotFound { tool }) => assert_eq!(tool, "assetpipe-no-such-tool-x9"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_captures_failure() {
        let args: Vec<OsString> = vec!["-c".into(), "echo broken >&2; exit 3".into()];
        let output = run_tool("sh", &args, None).unwrap();
        assert!(!output.success);
        assert_eq!(output.status, Some(3));
        assert_eq!(output.diagnostics().trim(), "broken");

        match output.into_failure("sh") {
            ToolError::Failed { status, diagnostics, .. } => {
                assert_eq!(status, Some(3));
                assert_eq!(diagnostics.trim(), "broken");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_diagnostics_fall_back_to_stdout() {
        let args: Vec<OsString> = vec!["-c".into(), "echo only-stdout; exit 1".into()];
        let output = run_tool("sh", &args, None).unwrap();
        assert_eq!(output.diagnostics().trim(), "only-stdout");
    }

    #[test]
    fn test_failed_error_message_includes_status() {
        let err = ToolError::Failed {
            tool: "esbuild".to_string(),
            status: Some(1),
            diagnostics: "✘ [ERROR] Could not resolve \"./missing\"".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("esbuild exited with status 1"));
        assert!(message.contains("Could not resolve"));
    }

    #[test]
    fn test_toolchain_from_config_uses_configured_tools() {
        let mut config = crate::config::default_config();
        config.style.compiler = "dart-sass".to_string();
        config.app.bundler.tool = "esbuild-wasm".to_string();

        let toolchain = Toolchain::from_config(&config);
        assert_eq!(toolchain.style.name(), "dart-sass");
        assert_eq!(toolchain.native.name(), "wasm-pack");
        assert_eq!(toolchain.bundler.name(), "esbuild-wasm");
    }
}
