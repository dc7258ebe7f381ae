//! Stylesheet pipeline.
//!
//! Turns one stylesheet source into one CSS file with a fixed name. The
//! transform chain runs in execution order:
//!
//! 1. `style-compile` - the configured [`StyleCompiler`] produces plain CSS
//! 2. `post-process` - vendor prefixes for the configured browsers
//! 3. `extract` - final CSS text, with a `sourceMappingURL` in development
//! 4. `file-emit` - write `<output>/<name>` (and `<name>.map` in development)
//!
//! Nothing is written until every earlier step has succeeded.

use super::chain::TransformChain;
use super::collision::OutputClaim;
use super::context::BuildContext;
use super::declaration::{
    PipelineDeclaration, PipelineKind, StepOptions, TransformKind, TransformStep,
};
use super::error::BuildError;
use super::prefix::Prefixer;
use super::progress::{ProgressEvent, ProgressReporter};
use super::result::BuildOutput;
use crate::config::Mode;
use crate::tools::{CompiledStyle, StyleCompiler, StyleRequest};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Default declaration name.
pub const STYLE_PIPELINE: &str = "style";

/// Derive the stylesheet declaration from the project configuration.
pub fn declare(ctx: &BuildContext) -> PipelineDeclaration {
    let style = &ctx.config().style;

    let include_paths: Vec<String> = style
        .include_paths
        .iter()
        .map(|p| ctx.resolve_path(p).display().to_string())
        .collect();

    // Written right-to-left: the last step listed runs first
    let authored = vec![
        TransformStep::with_options(
            TransformKind::FileEmit,
            StepOptions::new().with("name", style.output.as_str()),
        ),
        TransformStep::new(TransformKind::Extract),
        TransformStep::with_options(
            TransformKind::PostProcess,
            StepOptions::new().with("browsers", style.browsers.clone()),
        ),
        TransformStep::with_options(
            TransformKind::StyleCompile,
            StepOptions::new()
                .with("include_paths", include_paths)
                .with("bundler_importer", false),
        ),
    ];

    PipelineDeclaration {
        name: STYLE_PIPELINE.to_string(),
        kind: PipelineKind::Style,
        entry_points: BTreeMap::from([(STYLE_PIPELINE.to_string(), ctx.resolve_path(&style.entry))]),
        output_path: ctx.out_dir(),
        transform_chain: TransformChain::from_authored(authored),
        plugins: Vec::new(),
        working_dir: Some(ctx.project_root().to_path_buf()),
    }
}

/// Runs a stylesheet declaration.
#[derive(Clone)]
pub struct StylePipeline {
    declaration: PipelineDeclaration,
    compiler: Arc<dyn StyleCompiler>,
    mode: Mode,
}

impl std::fmt::Debug for StylePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StylePipeline")
            .field("declaration", &self.declaration.name)
            .field("compiler", &self.compiler.name())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Text flowing between the steps of the chain.
#[derive(Debug, Default)]
struct Stage {
    css: Option<String>,
    source_map: Option<String>,
}

impl StylePipeline {
    pub fn new(declaration: PipelineDeclaration, compiler: Arc<dyn StyleCompiler>, mode: Mode) -> Self {
        Self { declaration, compiler, mode }
    }

    pub fn declaration(&self) -> &PipelineDeclaration {
        &self.declaration
    }

    /// Name of the emitted CSS file.
    pub fn output_name(&self) -> String {
        self.declaration
            .transform_chain
            .step(TransformKind::FileEmit)
            .and_then(|s| s.options.text("name"))
            .unwrap_or("bundle.css")
            .to_string()
    }

    fn map_name(&self) -> String {
        format!("{}.map", self.output_name())
    }

    /// Files this pipeline may write, relative to the output directory.
    pub fn claims(&self) -> Vec<OutputClaim> {
        let mut claims = vec![OutputClaim::File(PathBuf::from(self.output_name()))];
        if self.mode.source_maps() {
            claims.push(OutputClaim::File(PathBuf::from(self.map_name())));
        }
        claims
    }

    /// Run the chain and write the CSS file.
    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<BuildOutput, BuildError> {
        self.declaration.validate()?;
        self.declaration.check_inputs()?;

        let source = self
            .declaration
            .entry_points
            .values()
            .next()
            .ok_or_else(|| BuildError::InvalidDeclaration("style pipeline has no source".to_string()))?;

        let mut stage = Stage::default();
        let mut artifacts = BTreeSet::new();

        for step in self.declaration.transform_chain.steps() {
            let started = Instant::now();
            match step.kind {
                TransformKind::StyleCompile => {
                    let include_paths = step.options.paths("include_paths");
                    for missing in include_paths.iter().filter(|p| !p.is_dir()) {
                        reporter.report(ProgressEvent::Warning {
                            pipeline: Some(self.declaration.name.clone()),
                            message: format!("include path {} does not exist", missing.display()),
                        });
                    }
                    let request =
                        StyleRequest { source, include_paths: &include_paths, mode: self.mode };
                    let CompiledStyle { css, source_map } = self.compiler.compile(&request)?;
                    stage.css = Some(css);
                    stage.source_map = source_map;
                }
                TransformKind::PostProcess => {
                    let browsers = step.options.list("browsers").unwrap_or_default().to_vec();
                    let prefixer = Prefixer::new(&browsers)?;
                    let filename = source.display().to_string();
                    let css = prefixer.process(self.stage_css(&stage, step.kind)?, &filename, self.mode.minify())?;
                    stage.css = Some(css);
                }
                TransformKind::Extract => {
                    let mut css = strip_map_comment(self.stage_css(&stage, step.kind)?).to_string();
                    if self.mode.source_maps() && stage.source_map.is_some() {
                        if !css.ends_with('\n') {
                            css.push('\n');
                        }
                        css.push_str(&format!("/*# sourceMappingURL={} */\n", self.map_name()));
                    }
                    stage.css = Some(css);
                }
                TransformKind::FileEmit => {
                    let css = self.stage_css(&stage, step.kind)?;
                    fs::create_dir_all(&self.declaration.output_path)
                        .map_err(|e| BuildError::filesystem(&self.declaration.output_path, e))?;

                    // The CSS is written only once its map is in place
                    if let (true, Some(map)) = (self.mode.source_maps(), &stage.source_map) {
                        let map_target = self.declaration.output_path.join(self.map_name());
                        let map = retarget_source_map(map, &self.output_name());
                        fs::write(&map_target, map).map_err(|e| BuildError::filesystem(&map_target, e))?;
                        artifacts.insert(PathBuf::from(self.map_name()));
                    }

                    let target = self.declaration.output_path.join(self.output_name());
                    fs::write(&target, css).map_err(|e| BuildError::filesystem(&target, e))?;
                    artifacts.insert(PathBuf::from(self.output_name()));
                }
            }

            tracing::debug!(pipeline = %self.declaration.name, step = step.kind.label(), "step finished");
            reporter.report(ProgressEvent::StepCompleted {
                pipeline: self.declaration.name.clone(),
                step: step.kind.label().to_string(),
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }

        Ok(BuildOutput::new(self.declaration.output_path.clone(), artifacts))
    }

    fn stage_css<'a>(&self, stage: &'a Stage, kind: TransformKind) -> Result<&'a str, BuildError> {
        stage.css.as_deref().ok_or_else(|| {
            BuildError::ChainOrder(format!("'{}' has no compiled stylesheet to work on", kind))
        })
    }
}

/// Drop a trailing `sourceMappingURL` comment left by the compiler.
fn strip_map_comment(css: &str) -> &str {
    let trimmed = css.trim_end();
    match trimmed.rfind("/*# sourceMappingURL=") {
        Some(start) if trimmed.ends_with("*/") && !trimmed[start..trimmed.len() - 2].contains("*/") => {
            &css[..start]
        }
        _ => css,
    }
}

/// Point the map's `file` at the emitted stylesheet.
///
/// A map that is not a JSON object is written as the compiler produced it.
fn retarget_source_map(map: &str, file: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(map) {
        Ok(serde_json::Value::Object(mut fields)) => {
            fields.insert("file".to_string(), serde_json::Value::String(file.to_string()));
            serde_json::Value::Object(fields).to_string()
        }
        _ => map.to_string(),
    }
}
