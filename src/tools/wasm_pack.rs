//! wasm-pack native compiler.

use super::{run_tool, NativeArtifact, NativeCompiler, NativeRequest, ToolError};
use crate::config::{Mode, NativeConfig};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// [`NativeCompiler`] backed by `wasm-pack build`.
#[derive(Debug, Clone)]
pub struct WasmPackCompiler {
    program: String,
    target: String,
    out_name: Option<String>,
    args: Vec<String>,
}

impl WasmPackCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), target: "web".to_string(), out_name: None, args: Vec::new() }
    }

    pub fn from_config(config: &NativeConfig) -> Self {
        Self {
            program: config.tool.clone(),
            target: config.target.clone(),
            out_name: config.out_name.clone(),
            args: config.args.clone(),
        }
    }

    pub fn command_args(&self, request: &NativeRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["build".into(), request.crate_dir.as_os_str().into()];
        args.push("--target".into());
        args.push(self.target.as_str().into());
        args.push("--out-dir".into());
        args.push(request.out_dir.as_os_str().into());
        if let Some(name) = &self.out_name {
            args.push("--out-name".into());
            args.push(name.as_str().into());
        }
        args.push(match request.mode {
            Mode::Development => "--dev".into(),
            Mode::Production => "--release".into(),
        });
        args.extend(self.args.iter().map(OsString::from));
        args
    }
}

impl Default for WasmPackCompiler {
    fn default() -> Self {
        Self::new("wasm-pack")
    }
}

impl NativeCompiler for WasmPackCompiler {
    fn name(&self) -> &str {
        &self.program
    }

    fn compile(&self, request: &NativeRequest<'_>) -> Result<NativeArtifact, ToolError> {
        let result = run_tool(&self.program, &self.command_args(request), Some(request.crate_dir))?;
        if !result.success {
            let diagnostics = result.diagnostics();
            // cargo reports rejected sources this way; anything else is a tool failure
            if diagnostics.contains("could not compile") {
                return Err(ToolError::Syntax { tool: self.program.clone(), diagnostics });
            }
            return Err(result.into_failure(&self.program));
        }

        collect_artifact(&self.program, request.out_dir)
    }
}

/// Gather the binary and JS glue a successful build left in `out_dir`.
pub fn collect_artifact(tool: &str, out_dir: &Path) -> Result<NativeArtifact, ToolError> {
    let binary = files_with_extension(out_dir, "wasm").into_iter().next().ok_or_else(|| {
        ToolError::MissingOutput { tool: tool.to_string(), what: "a .wasm binary".to_string() }
    })?;
    let glue = files_with_extension(out_dir, "js");
    if glue.is_empty() {
        return Err(ToolError::MissingOutput {
            tool: tool.to_string(),
            what: "JS glue".to_string(),
        });
    }

    Ok(NativeArtifact { out_dir: out_dir.to_path_buf(), binary, glue })
}

fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let pattern = dir.join(format!("*.{}", extension));
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .map(|paths| paths.filter_map(Result::ok).filter(|p| p.is_file()).collect())
        .unwrap_or_default();
    files.sort();
    files
}
