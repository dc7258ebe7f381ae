//! Application pipeline.
//!
//! Copies static assets, compiles the native crate to WASM plus JS glue and
//! bundles the JS entry points, in that order, into the output directory.
//!
//! ```text
//! NotStarted -> AssetsReady -> NativeReady -> Complete
//!      \______________\_____________\______-> Failed
//! ```
//!
//! A failure stops the pipeline where it is; files already written stay.

use super::chain::TransformChain;
use super::collision::OutputClaim;
use super::context::BuildContext;
use super::copy::{copy_static, list_static_files};
use super::declaration::{PipelineDeclaration, PipelineKind, PluginInvocation, PluginKind, StepOptions};
use super::error::BuildError;
use super::progress::{ProgressEvent, ProgressReporter};
use super::result::BuildOutput;
use crate::config::Mode;
use crate::tools::{BundleRequest, Bundler, NativeCompiler, NativeRequest};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Default declaration name.
pub const APP_PIPELINE: &str = "app";

/// Progress of an application pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    NotStarted,
    /// Static assets are in place (or there were none to copy)
    AssetsReady,
    /// WASM binary and glue are in place (or there was no crate to compile)
    NativeReady,
    /// Entry bundles written
    Complete,
    Failed,
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppState::NotStarted => write!(f, "not-started"),
            AppState::AssetsReady => write!(f, "assets-ready"),
            AppState::NativeReady => write!(f, "native-ready"),
            AppState::Complete => write!(f, "complete"),
            AppState::Failed => write!(f, "failed"),
        }
    }
}

/// Derive the application declaration from the project configuration.
pub fn declare(ctx: &BuildContext) -> PipelineDeclaration {
    let app = &ctx.config().app;

    let entry_points = app
        .entries
        .iter()
        .map(|(name, path)| (name.clone(), ctx.resolve_path(path)))
        .collect();

    let mut plugins = Vec::new();
    if let Some(static_dir) = &app.static_dir {
        plugins.push(PluginInvocation::new(
            PluginKind::StaticCopy,
            0,
            StepOptions::new().with("from", ctx.resolve_path(static_dir).display().to_string()),
        ));
    }
    plugins.push(PluginInvocation::new(
        PluginKind::NativeCompile,
        1,
        StepOptions::new()
            .with("crate_dir", ctx.resolve_path(&app.crate_dir).display().to_string())
            .with("out_dir", app.native.out_dir.display().to_string()),
    ));

    PipelineDeclaration {
        name: APP_PIPELINE.to_string(),
        kind: PipelineKind::Application,
        entry_points,
        output_path: ctx.out_dir(),
        transform_chain: TransformChain::empty(),
        plugins,
        working_dir: Some(ctx.project_root().to_path_buf()),
    }
}

/// Runs an application declaration.
#[derive(Clone)]
pub struct AppPipeline {
    declaration: PipelineDeclaration,
    native: Arc<dyn NativeCompiler>,
    bundler: Arc<dyn Bundler>,
    mode: Mode,
}

impl std::fmt::Debug for AppPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppPipeline")
            .field("declaration", &self.declaration.name)
            .field("native", &self.native.name())
            .field("bundler", &self.bundler.name())
            .field("mode", &self.mode)
            .finish()
    }
}

impl AppPipeline {
    pub fn new(
        declaration: PipelineDeclaration,
        native: Arc<dyn NativeCompiler>,
        bundler: Arc<dyn Bundler>,
        mode: Mode,
    ) -> Self {
        Self { declaration, native, bundler, mode }
    }

    pub fn declaration(&self) -> &PipelineDeclaration {
        &self.declaration
    }

    /// Native output directory, relative to the output directory.
    fn native_out_dir(plugin: &PluginInvocation) -> PathBuf {
        plugin.config.path("out_dir").unwrap_or_else(|| PathBuf::from("pkg"))
    }

    /// Paths this pipeline may write, relative to the output directory.
    pub fn claims(&self) -> Result<Vec<OutputClaim>, BuildError> {
        let mut claims = Vec::new();

        if let Some(copy) = self.declaration.plugin(PluginKind::StaticCopy) {
            if let Some(from) = copy.config.path("from") {
                claims.extend(list_static_files(&from)?.into_iter().map(OutputClaim::File));
            }
        }
        if let Some(native) = self.declaration.plugin(PluginKind::NativeCompile) {
            claims.push(OutputClaim::Dir(Self::native_out_dir(native)));
        }
        for name in self.declaration.entry_points.keys() {
            claims.push(OutputClaim::File(PathBuf::from(format!("{}.js", name))));
            if self.mode.source_maps() {
                claims.push(OutputClaim::File(PathBuf::from(format!("{}.js.map", name))));
            }
        }

        Ok(claims)
    }

    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<BuildOutput, BuildError> {
        self.run_with_state(reporter).1
    }

    /// Run the pipeline, also returning the state it ended in.
    pub fn run_with_state(&self, reporter: &dyn ProgressReporter) -> (AppState, Result<BuildOutput, BuildError>) {
        let mut state = AppState::NotStarted;
        let mut artifacts = BTreeSet::new();

        match self.advance(&mut state, &mut artifacts, reporter) {
            Ok(()) => (state, Ok(BuildOutput::new(self.declaration.output_path.clone(), artifacts))),
            Err(err) => {
                tracing::debug!(pipeline = %self.declaration.name, %state, "pipeline failed");
                (AppState::Failed, Err(err))
            }
        }
    }

    fn advance(
        &self,
        state: &mut AppState,
        artifacts: &mut BTreeSet<PathBuf>,
        reporter: &dyn ProgressReporter,
    ) -> Result<(), BuildError> {
        self.declaration.validate()?;
        self.declaration.check_inputs()?;
        let out = &self.declaration.output_path;

        for plugin in self.declaration.ordered_plugins()? {
            let started = Instant::now();
            match plugin.kind {
                PluginKind::StaticCopy => {
                    let from = plugin.config.path("from").ok_or_else(|| {
                        BuildError::InvalidDeclaration("static-copy plugin has no 'from' directory".to_string())
                    })?;
                    artifacts.extend(copy_static(&from, out)?);
                    self.transition(state, AppState::AssetsReady);
                }
                PluginKind::NativeCompile => {
                    self.transition(state, AppState::AssetsReady);
                    let crate_dir = plugin.config.path("crate_dir").ok_or_else(|| {
                        BuildError::InvalidDeclaration("native-compile plugin has no 'crate_dir'".to_string())
                    })?;
                    let native_out = out.join(Self::native_out_dir(plugin));
                    let artifact = self.native.compile(&NativeRequest {
                        crate_dir: &crate_dir,
                        out_dir: &native_out,
                        mode: self.mode,
                    })?;
                    artifacts.extend(
                        std::iter::once(&artifact.binary)
                            .chain(artifact.glue.iter())
                            .filter_map(|p| relative_to(p, out)),
                    );
                    self.transition(state, AppState::NativeReady);
                }
            }
            self.step_completed(reporter, plugin.kind.label(), started);
        }

        self.transition(state, AppState::AssetsReady);
        self.transition(state, AppState::NativeReady);

        let started = Instant::now();
        let written = self.bundler.bundle(&BundleRequest {
            entries: &self.declaration.entry_points,
            out_dir: out,
            mode: self.mode,
            working_dir: self.declaration.working_dir.as_deref().unwrap_or(Path::new(".")),
        })?;
        for bundle in written {
            if self.mode.source_maps() {
                let map = PathBuf::from(format!("{}.map", bundle.display()));
                if map.is_file() {
                    artifacts.extend(relative_to(&map, out));
                }
            }
            artifacts.extend(relative_to(&bundle, out));
        }
        self.step_completed(reporter, "bundle", started);
        self.transition(state, AppState::Complete);

        Ok(())
    }

    /// Move forward to `next`; never moves backwards.
    fn transition(&self, state: &mut AppState, next: AppState) {
        if rank(next) > rank(*state) {
            tracing::debug!(pipeline = %self.declaration.name, from = %state, to = %next, "state change");
            *state = next;
        }
    }

    fn step_completed(&self, reporter: &dyn ProgressReporter, step: &str, started: Instant) {
        reporter.report(ProgressEvent::StepCompleted {
            pipeline: self.declaration.name.clone(),
            step: step.to_string(),
            duration_ms: started.elapsed().as_millis() as u64,
        });
    }
}

fn rank(state: AppState) -> u8 {
    match state {
        AppState::NotStarted => 0,
        AppState::AssetsReady => 1,
        AppState::NativeReady => 2,
        AppState::Complete => 3,
        AppState::Failed => 4,
    }
}

fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::progress::NullProgress;
    use crate::config::default_config;
    use crate::tools::{NativeArtifact, ToolError};
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes a fake binary and glue, recording what it saw.
    #[derive(Default)]
    struct FakeNative {
        fail: bool,
        seen_static: Mutex<Option<bool>>,
    }

    impl NativeCompiler for FakeNative {
        fn name(&self) -> &str {
            "fake-wasm-pack"
        }

        fn compile(&self, request: &NativeRequest<'_>) -> Result<NativeArtifact, ToolError> {
            let static_present = request.out_dir.parent().map(|d| d.join("index.html").exists());
            *self.seen_static.lock().unwrap() = static_present;
            if self.fail {
                return Err(ToolError::Syntax {
                    tool: "fake-wasm-pack".into(),
                    diagnostics: "error: could not compile `demo`".into(),
                });
            }
            fs::create_dir_all(request.out_dir).unwrap();
            let binary = request.out_dir.join("demo_bg.wasm");
            let glue = request.out_dir.join("demo.js");
            fs::write(&binary, b"\0asm\x01\0\0\0").unwrap();
            fs::write(&glue, "export default async function init() {}").unwrap();
            Ok(NativeArtifact { out_dir: request.out_dir.to_path_buf(), binary, glue: vec![glue] })
        }
    }

    #[derive(Default)]
    struct FakeBundler {
        working_dir: Mutex<Option<PathBuf>>,
    }

    impl Bundler for FakeBundler {
        fn name(&self) -> &str {
            "fake-esbuild"
        }

        fn bundle(&self, request: &BundleRequest<'_>) -> Result<Vec<PathBuf>, ToolError> {
            *self.working_dir.lock().unwrap() = Some(request.working_dir.to_path_buf());
            request
                .entries
                .keys()
                .map(|name| {
                    let path = request.out_dir.join(format!("{}.js", name));
                    fs::write(&path, "console.log('bundled');").unwrap();
                    Ok(path)
                })
                .collect()
        }
    }

    fn project(with_static: bool) -> (TempDir, BuildContext) {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("js")).unwrap();
        fs::write(temp.path().join("js/index.js"), "import init from '../dist/pkg/demo.js';").unwrap();
        let mut config = default_config();
        if with_static {
            fs::create_dir_all(temp.path().join("static")).unwrap();
            fs::write(temp.path().join("static/index.html"), "<script src=index.js></script>").unwrap();
            config.app.static_dir = Some(PathBuf::from("static"));
        }
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        (temp, ctx)
    }

    #[test]
    fn test_declare_plugins() {
        let (_temp, ctx) = project(true);
        let decl = declare(&ctx);
        let kinds: Vec<_> = decl.ordered_plugins().unwrap().iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![PluginKind::StaticCopy, PluginKind::NativeCompile]);
        assert!(decl.transform_chain.is_empty());
    }

    #[test]
    fn test_full_run_reaches_complete() {
        let (temp, ctx) = project(true);
        let native = Arc::new(FakeNative::default());
        let app = AppPipeline::new(declare(&ctx), native.clone(), Arc::new(FakeBundler::default()), ctx.mode());

        let (state, result) = app.run_with_state(&NullProgress);
        let output = result.unwrap();

        assert_eq!(state, AppState::Complete);
        assert_eq!(*native.seen_static.lock().unwrap(), Some(true));
        let expected: BTreeSet<PathBuf> =
            ["index.html", "index.js", "pkg/demo.js", "pkg/demo_bg.wasm"].iter().map(PathBuf::from).collect();
        assert_eq!(output.artifacts, expected);
        assert!(temp.path().join("dist/index.js").exists());
    }

    #[test]
    fn test_native_failure_leaves_no_bundle() {
        let (temp, ctx) = project(true);
        let native = Arc::new(FakeNative { fail: true, ..FakeNative::default() });
        let app = AppPipeline::new(declare(&ctx), native, Arc::new(FakeBundler::default()), ctx.mode());

        let (state, result) = app.run_with_state(&NullProgress);

        assert_eq!(state, AppState::Failed);
        assert!(matches!(result, Err(BuildError::SourceSyntax { .. })));
        assert!(temp.path().join("dist/index.html").exists());
        assert!(!temp.path().join("dist/index.js").exists());
    }

    #[test]
    fn test_without_static_dir() {
        let (_temp, ctx) = project(false);
        let app = AppPipeline::new(declare(&ctx), Arc::new(FakeNative::default()), Arc::new(FakeBundler::default()), ctx.mode());
        let (state, result) = app.run_with_state(&NullProgress);
        assert_eq!(state, AppState::Complete);
        assert!(!result.unwrap().contains("index.html"));
    }

    #[test]
    fn test_claims() {
        let (_temp, ctx) = project(true);
        let ctx = ctx.with_mode(Mode::Development);
        let app = AppPipeline::new(declare(&ctx), Arc::new(FakeNative::default()), Arc::new(FakeBundler::default()), ctx.mode());

        assert_eq!(
            app.claims().unwrap(),
            vec![
                OutputClaim::File(PathBuf::from("index.html")),
                OutputClaim::Dir(PathBuf::from("pkg")),
                OutputClaim::File(PathBuf::from("index.js")),
                OutputClaim::File(PathBuf::from("index.js.map")),
            ]
        );
    }

    #[test]
    fn test_bundler_runs_from_project_root() {
        let (temp, ctx) = project(false);
        let elsewhere = TempDir::new().unwrap();
        let mut config = ctx.config().clone();
        config.project.out = elsewhere.path().join("site");
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        let bundler = Arc::new(FakeBundler::default());
        let app = AppPipeline::new(declare(&ctx), Arc::new(FakeNative::default()), bundler.clone(), ctx.mode());

        app.run(&NullProgress).unwrap();

        assert_eq!(bundler.working_dir.lock().unwrap().as_deref(), Some(temp.path()));
        assert!(elsewhere.path().join("site/index.js").exists());
    }

    #[test]
    fn test_transition_never_moves_backwards() {
        let (_temp, ctx) = project(false);
        let app = AppPipeline::new(declare(&ctx), Arc::new(FakeNative::default()), Arc::new(FakeBundler::default()), ctx.mode());
        let mut state = AppState::NativeReady;
        app.transition(&mut state, AppState::AssetsReady);
        assert_eq!(state, AppState::NativeReady);
    }
}
