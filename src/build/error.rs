//! Build errors.

use crate::config::ConfigError;
use crate::tools::ToolError;
use std::path::PathBuf;
use thiserror::Error;

/// Broad class of a [`BuildError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed stylesheet or native source
    SourceSyntax,
    /// A tool could not be run or exited unsuccessfully
    ToolInvocation,
    /// Missing input or unwritable output
    Filesystem,
    /// Invalid configuration or declaration
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::SourceSyntax => write!(f, "source syntax"),
            ErrorCategory::ToolInvocation => write!(f, "tool invocation"),
            ErrorCategory::Filesystem => write!(f, "filesystem"),
            ErrorCategory::Configuration => write!(f, "configuration"),
        }
    }
}

/// Fatal error ending a build invocation.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Stylesheet or native source failed to compile
    #[error("{tool} rejected the source:\n{diagnostics}")]
    SourceSyntax { tool: String, diagnostics: String },
    /// Tool exited unsuccessfully
    #[error("{tool} failed ({}):\n{diagnostics}", .status.map_or_else(|| "no exit status".to_string(), |c| format!("exit status {}", c)))]
    ToolInvocation { tool: String, status: Option<i32>, diagnostics: String },
    /// Executable could not be located
    #[error("'{tool}' was not found; install it or set its path in assetpipe.toml")]
    ToolNotFound { tool: String },
    /// Missing input or unwritable output
    #[error("{}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A declaration violates one of its invariants
    #[error("invalid pipeline declaration: {0}")]
    InvalidDeclaration(String),
    /// Transform chain is not in the required execution order
    #[error("invalid transform chain: {0}")]
    ChainOrder(String),
    /// Two pipelines claim the same output
    #[error("output collision at '{}': claimed by both '{first}' and '{second}'", .path.display())]
    OutputCollision { path: PathBuf, first: String, second: String },
}

impl BuildError {
    /// Wrap an I/O error with the path it concerns.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Filesystem { path: path.into(), source }
    }

    /// A required input that does not exist.
    pub fn missing_input(path: impl Into<PathBuf>, what: &str) -> Self {
        BuildError::Filesystem {
            path: path.into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, format!("{} not found", what)),
        }
    }

    pub fn wrong_input_type(path: impl Into<PathBuf>, what: &str, expected: &str) -> Self {
        BuildError::Filesystem {
            path: path.into(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a {}", what, expected),
            ),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BuildError::SourceSyntax { .. } => ErrorCategory::SourceSyntax,
            BuildError::ToolInvocation { .. } | BuildError::ToolNotFound { .. } => {
                ErrorCategory::ToolInvocation
            }
            BuildError::Filesystem { .. } => ErrorCategory::Filesystem,
            BuildError::Config(_)
            | BuildError::InvalidDeclaration(_)
            | BuildError::ChainOrder(_)
            | BuildError::OutputCollision { .. } => ErrorCategory::Configuration,
        }
    }
}

impl From<ToolError> for BuildError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound { tool } => BuildError::ToolNotFound { tool },
            ToolError::Syntax { tool, diagnostics } => BuildError::SourceSyntax { tool, diagnostics },
            ToolError::Failed { tool, status, diagnostics } => {
                BuildError::ToolInvocation { tool, status, diagnostics }
            }
            ToolError::Io { tool, source } => {
                BuildError::ToolInvocation { tool, status: None, diagnostics: source.to_string() }
            }
            ToolError::MissingOutput { tool, what } => BuildError::ToolInvocation {
                tool,
                status: Some(0),
                diagnostics: format!("expected output missing: {}", what),
            },
        }
    }
}
