//! Build orchestration.
//!
//! The [`Orchestrator`] holds the ordered pipeline declarations of one build
//! invocation. A run goes through three phases:
//!
//! 1. Validate every declaration, check that all inputs exist and that the
//!    declarations agree on one output directory.
//! 2. Collect each pipeline's output claims and reject overlaps.
//! 3. Create the output directory and run the pipelines.
//!
//! Nothing is written before phase 3, so a bad declaration or a missing input
//! leaves the output directory untouched.
//!
//! # Example
//!
//! ```ignore
//! use assetpipe::build::{BuildContext, Orchestrator};
//! use assetpipe::tools::Toolchain;
//!
//! let toolchain = Toolchain::from_config(ctx.config());
//! let result = Orchestrator::from_context(&ctx, toolchain).with_jobs(2).run()?;
//! println!("{}", result.summary());
//! ```

use super::app::{self, AppPipeline};
use super::collision::{check_collisions, ClaimedOutput, OutputClaim};
use super::context::BuildContext;
use super::declaration::{PipelineDeclaration, PipelineKind};
use super::error::BuildError;
use super::parallel::run_all;
use super::progress::{NullProgress, PipelineStatus, ProgressEvent, ProgressReporter};
use super::result::{BuildOutput, BuildResult, PipelineResult};
use super::style::{self, StylePipeline};
use crate::config::Mode;
use crate::tools::Toolchain;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A declaration bound to the tools that execute it.
#[derive(Debug, Clone)]
pub enum Pipeline {
    Style(StylePipeline),
    App(AppPipeline),
}

impl Pipeline {
    pub fn bind(declaration: PipelineDeclaration, toolchain: &Toolchain, mode: Mode) -> Self {
        match declaration.kind {
            PipelineKind::Style => {
                Pipeline::Style(StylePipeline::new(declaration, Arc::clone(&toolchain.style), mode))
            }
            PipelineKind::Application => Pipeline::App(AppPipeline::new(
                declaration,
                Arc::clone(&toolchain.native),
                Arc::clone(&toolchain.bundler),
                mode,
            )),
        }
    }

    pub fn declaration(&self) -> &PipelineDeclaration {
        match self {
            Pipeline::Style(p) => p.declaration(),
            Pipeline::App(p) => p.declaration(),
        }
    }

    pub fn claims(&self) -> Result<Vec<OutputClaim>, BuildError> {
        match self {
            Pipeline::Style(p) => Ok(p.claims()),
            Pipeline::App(p) => p.claims(),
        }
    }

    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<BuildOutput, BuildError> {
        match self {
            Pipeline::Style(p) => p.run(reporter),
            Pipeline::App(p) => p.run(reporter),
        }
    }
}

/// Runs a set of pipeline declarations as one build.
pub struct Orchestrator {
    pipelines: Vec<Pipeline>,
    jobs: usize,
    dry_run: bool,
    reporter: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pipelines", &self.pipelines)
            .field("jobs", &self.jobs)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Orchestrator {
    /// Orchestrate `declarations`, in order, with the given tools.
    pub fn new(declarations: Vec<PipelineDeclaration>, toolchain: &Toolchain, mode: Mode) -> Self {
        Self {
            pipelines: declarations.into_iter().map(|d| Pipeline::bind(d, toolchain, mode)).collect(),
            jobs: 1,
            dry_run: false,
            reporter: Arc::new(NullProgress),
        }
    }

    /// Declarations for every pipeline enabled in the configuration:
    /// the stylesheet pipeline first, then the application pipeline.
    pub fn declarations(ctx: &BuildContext) -> Vec<PipelineDeclaration> {
        let mut declarations = Vec::new();
        if ctx.config().style.enabled {
            declarations.push(style::declare(ctx));
        }
        if ctx.config().app.enabled {
            declarations.push(app::declare(ctx));
        }
        declarations
    }

    pub fn from_context(ctx: &BuildContext, toolchain: Toolchain) -> Self {
        Self::new(Self::declarations(ctx), &toolchain, ctx.mode()).with_jobs(ctx.config().build.jobs)
    }

    /// Set the number of pipelines run concurrently.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Validate and plan without running any tool or writing any file.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    /// Shared output directory of the declarations.
    pub fn output_path(&self) -> Option<&PathBuf> {
        self.pipelines.first().map(|p| &p.declaration().output_path)
    }

    /// Validate every declaration and return the outputs they will claim.
    pub fn plan(&self) -> Result<Vec<ClaimedOutput>, BuildError> {
        let first = self
            .pipelines
            .first()
            .ok_or_else(|| BuildError::InvalidDeclaration("no pipelines to build".to_string()))?;
        let output_path = &first.declaration().output_path;

        let mut names = HashSet::new();
        for pipeline in &self.pipelines {
            let declaration = pipeline.declaration();
            declaration.validate()?;
            if !names.insert(declaration.name.as_str()) {
                return Err(BuildError::InvalidDeclaration(format!(
                    "pipeline name '{}' is used more than once",
                    declaration.name
                )));
            }
            if &declaration.output_path != output_path {
                return Err(BuildError::InvalidDeclaration(format!(
                    "'{}' writes to {} but '{}' writes to {}; all pipelines share one output directory",
                    declaration.name,
                    declaration.output_path.display(),
                    first.declaration().name,
                    output_path.display()
                )));
            }
        }

        for pipeline in &self.pipelines {
            pipeline.declaration().check_inputs()?;
        }

        let mut claims = Vec::new();
        for pipeline in &self.pipelines {
            let name = &pipeline.declaration().name;
            claims.extend(pipeline.claims()?.into_iter().map(|c| ClaimedOutput::new(name, c)));
        }
        check_collisions(&claims)?;

        Ok(claims)
    }

    /// Run the build.
    ///
    /// Returns the first error in declaration order if any pipeline fails.
    pub fn run(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let _span = tracing::info_span!("build", pipelines = self.pipelines.len(), jobs = self.jobs).entered();

        self.reporter.report(ProgressEvent::BuildStarted { total_pipelines: self.pipelines.len() });

        if let Err(err) = self.plan() {
            self.finish(&BuildResult::new(), start);
            return Err(err);
        }

        let mut result = BuildResult::new();

        if self.dry_run {
            for pipeline in &self.pipelines {
                let declaration = pipeline.declaration();
                self.reporter.report(ProgressEvent::PipelineCompleted {
                    pipeline: declaration.name.clone(),
                    status: PipelineStatus::Skipped,
                    duration_ms: 0,
                });
                result.add_result(PipelineResult::skipped(&declaration.name, declaration.kind));
            }
            let result = result.with_duration(start.elapsed());
            self.finish(&result, start);
            return Ok(result);
        }

        if let Some(out) = self.output_path() {
            fs::create_dir_all(out).map_err(|e| BuildError::filesystem(out, e))?;
        }

        let outcomes = run_all(&self.pipelines, self.jobs, |pipeline| self.run_pipeline(pipeline));

        let mut first_error = None;
        for (pipeline, outcome) in self.pipelines.iter().zip(outcomes) {
            let declaration = pipeline.declaration();
            match outcome {
                Ok((output, duration)) => result.add_result(PipelineResult::success(
                    &declaration.name,
                    declaration.kind,
                    output,
                    duration,
                )),
                Err((err, duration)) => {
                    result.add_result(PipelineResult::failed(
                        &declaration.name,
                        declaration.kind,
                        err.to_string(),
                        duration,
                    ));
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        let result = result.with_duration(start.elapsed());
        self.finish(&result, start);

        match first_error {
            Some(err) => Err(err),
            None => Ok(result),
        }
    }

    fn run_pipeline(&self, pipeline: &Pipeline) -> Result<(BuildOutput, Duration), (BuildError, Duration)> {
        let name = pipeline.declaration().name.clone();
        let started = Instant::now();
        tracing::debug!(pipeline = %name, "pipeline started");
        self.reporter.report(ProgressEvent::PipelineStarted { pipeline: name.clone() });

        let outcome = pipeline.run(self.reporter.as_ref());
        let duration = started.elapsed();

        let status = match &outcome {
            Ok(_) => PipelineStatus::Success,
            Err(err) => PipelineStatus::Failed(err.to_string()),
        };
        self.reporter.report(ProgressEvent::PipelineCompleted {
            pipeline: name,
            status,
            duration_ms: duration.as_millis() as u64,
        });

        outcome.map(|o| (o, duration)).map_err(|e| (e, duration))
    }

    fn finish(&self, result: &BuildResult, start: Instant) {
        let failed = result.failed_count();
        self.reporter.report(ProgressEvent::BuildCompleted {
            success: failed == 0 && result.pipelines.len() == self.pipelines.len(),
            duration_ms: start.elapsed().as_millis() as u64,
            succeeded: result.success_count(),
            failed,
        });
    }
}
