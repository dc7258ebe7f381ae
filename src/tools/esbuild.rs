//! esbuild module bundler.

use super::{run_tool, BundleRequest, Bundler, ToolError};
use crate::config::Mode;
use std::ffi::OsString;
use std::path::PathBuf;

/// [`Bundler`] backed by the `esbuild` executable.
///
/// WASM imports are emitted as files next to the bundle (`--loader:.wasm=file`).
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    program: String,
    args: Vec<String>,
}

impl EsbuildBundler {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn command_args(&self, request: &BundleRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        for (name, path) in request.entries {
            let mut arg = OsString::from(format!("{}=", name));
            arg.push(path);
            args.push(arg);
        }
        args.push("--bundle".into());
        args.push("--format=esm".into());
        let mut outdir = OsString::from("--outdir=");
        outdir.push(request.out_dir);
        args.push(outdir);
        args.push("--loader:.wasm=file".into());
        args.push(match request.mode {
            Mode::Production => "--minify".into(),
            Mode::Development => "--sourcemap".into(),
        });
        args.extend(self.args.iter().map(OsString::from));
        args
    }
}

impl Default for EsbuildBundler {
    fn default() -> Self {
        Self::new("esbuild")
    }
}

impl Bundler for EsbuildBundler {
    fn name(&self) -> &str {
        &self.program
    }

    fn bundle(&self, request: &BundleRequest<'_>) -> Result<Vec<PathBuf>, ToolError> {
        let result =
            run_tool(&self.program, &self.command_args(request), Some(request.working_dir))?;
        if !result.success {
            return Err(result.into_failure(&self.program));
        }

        let mut written = Vec::with_capacity(request.entries.len());
        for name in request.entries.keys() {
            let bundle = request.out_dir.join(format!("{}.js", name));
            if !bundle.is_file() {
                return Err(ToolError::MissingOutput {
                    tool: self.program.clone(),
                    what: bundle.display().to_string(),
                });
            }
            written.push(bundle);
        }
        Ok(written)
    }
}
