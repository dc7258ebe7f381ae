//! Build pipelines for assetpipe
//!
//! Turns a project's stylesheet and application sources into one deployable
//! output directory.
//!
//! # Overview
//!
//! A build consists of:
//! - **Declaration**: derive one [`PipelineDeclaration`] per enabled pipeline
//!   from the configuration
//! - **Planning**: validate declarations, check inputs and reject output
//!   collisions before anything is written
//! - **Execution**: run the style pipeline (compile, prefix, extract, emit)
//!   and the application pipeline (static copy, native compile, bundle)
//!
//! # Example
//!
//! ```ignore
//! use assetpipe::build::{BuildContext, Orchestrator};
//! use assetpipe::config::load_config;
//! use assetpipe::tools::Toolchain;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root);
//! let toolchain = Toolchain::from_config(context.config());
//!
//! let result = Orchestrator::from_context(&context, toolchain).run()?;
//! println!("{}", result.summary());
//! ```

pub mod app;
pub mod chain;
pub mod collision;
pub mod context;
pub mod copy;
pub mod declaration;
pub mod error;
pub mod orchestrator;
pub mod parallel;
pub mod prefix;
pub mod progress;
pub mod result;
pub mod style;

pub use app::{AppPipeline, AppState};
pub use chain::TransformChain;
pub use collision::{check_collisions, ClaimedOutput, OutputClaim};
pub use context::BuildContext;
pub use declaration::*;
pub use error::{BuildError, ErrorCategory};
pub use orchestrator::{Orchestrator, Pipeline};
pub use progress::{
    ConsoleProgress, JsonProgress, NullProgress, PipelineStatus, ProgressEvent, ProgressReporter,
};
pub use result::{BuildOutput, BuildResult, PipelineResult};
pub use style::StylePipeline;
