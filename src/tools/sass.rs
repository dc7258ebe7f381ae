//! Dart Sass command-line compiler.

use super::{run_tool, CompiledStyle, StyleCompiler, StyleRequest, ToolError};
use crate::config::Mode;
use std::ffi::OsString;
use std::fs;
use std::path::Path;

/// Exit status Dart Sass uses for stylesheet errors.
const SASS_SYNTAX_EXIT: i32 = 65;

/// [`StyleCompiler`] backed by the `sass` executable.
///
/// Imports are resolved by the compiler's own `--load-path` lookup, never by
/// the bundler.
#[derive(Debug, Clone)]
pub struct SassCompiler {
    program: String,
    args: Vec<String>,
}

impl SassCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    /// Extra arguments placed before the source and destination.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Command line for compiling `request` into `output`.
    pub fn command_args(&self, request: &StyleRequest<'_>, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();

        for path in request.include_paths {
            let mut arg = OsString::from("--load-path=");
            arg.push(path);
            args.push(arg);
        }

        args.push(match request.mode {
            Mode::Production => "--style=compressed".into(),
            Mode::Development => "--style=expanded".into(),
        });
        if request.mode.source_maps() {
            // Sources must still resolve once the map leaves the scratch directory
            args.push("--source-map".into());
            args.push("--source-map-urls=absolute".into());
        } else {
            args.push("--no-source-map".into());
        }

        args.extend(self.args.iter().map(OsString::from));
        args.push(request.source.as_os_str().to_os_string());
        args.push(output.as_os_str().to_os_string());
        args
    }
}

impl Default for SassCompiler {
    fn default() -> Self {
        Self::new("sass")
    }
}

impl StyleCompiler for SassCompiler {
    fn name(&self) -> &str {
        &self.program
    }

    fn compile(&self, request: &StyleRequest<'_>) -> Result<CompiledStyle, ToolError> {
        let io_err = |source| ToolError::Io { tool: self.program.clone(), source };

        let scratch = tempfile::TempDir::new().map_err(io_err)?;
        let output = scratch.path().join("compiled.css");

        let result = run_tool(&self.program, &self.command_args(request, &output), None)?;
        if !result.success {
            if result.status == Some(SASS_SYNTAX_EXIT) {
                return Err(ToolError::Syntax {
                    tool: self.program.clone(),
                    diagnostics: result.diagnostics(),
                });
            }
            return Err(result.into_failure(&self.program));
        }

        let css = fs::read_to_string(&output).map_err(|_| ToolError::MissingOutput {
            tool: self.program.clone(),
            what: "a CSS file".to_string(),
        })?;

        let map_path = scratch.path().join("compiled.css.map");
        let source_map = if request.mode.source_maps() && map_path.exists() {
            Some(fs::read_to_string(&map_path).map_err(io_err)?)
        } else {
            None
        };

        Ok(CompiledStyle { css, source_map })
    }
}
