//! Build result types.
//!
//! Contains types for representing the outcome of build operations.

use super::declaration::PipelineKind;
use super::progress::PipelineStatus;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Files one pipeline left in the output directory.
///
/// Produced once per successful pipeline run and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Output directory
    pub path: PathBuf,
    /// Produced files, relative to `path`
    pub artifacts: BTreeSet<PathBuf>,
}

impl BuildOutput {
    pub fn new(path: PathBuf, artifacts: impl IntoIterator<Item = PathBuf>) -> Self {
        Self { path, artifacts: artifacts.into_iter().collect() }
    }

    pub fn contains(&self, relative: impl AsRef<Path>) -> bool {
        self.artifacts.contains(relative.as_ref())
    }

    /// Absolute paths of every artifact.
    pub fn files(&self) -> Vec<PathBuf> {
        self.artifacts.iter().map(|a| self.path.join(a)).collect()
    }
}

/// Result of running a single pipeline.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Declaration name
    pub pipeline: String,
    pub kind: PipelineKind,
    pub status: PipelineStatus,
    /// Present when the pipeline succeeded
    pub output: Option<BuildOutput>,
    pub duration: Duration,
}

impl PipelineResult {
    /// Create a successful result.
    pub fn success(pipeline: &str, kind: PipelineKind, output: BuildOutput, duration: Duration) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            kind,
            status: PipelineStatus::Success,
            output: Some(output),
            duration,
        }
    }

    /// Create a skipped result (dry run).
    pub fn skipped(pipeline: &str, kind: PipelineKind) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            kind,
            status: PipelineStatus::Skipped,
            output: None,
            duration: Duration::ZERO,
        }
    }

    /// Create a failed result.
    pub fn failed(pipeline: &str, kind: PipelineKind, error: String, duration: Duration) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            kind,
            status: PipelineStatus::Failed(error),
            output: None,
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, PipelineStatus::Success | PipelineStatus::Skipped)
    }
}

/// Result of a complete build run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results in declaration order
    pub pipelines: Vec<PipelineResult>,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: PipelineResult) {
        self.pipelines.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    pub fn success_count(&self) -> usize {
        self.pipelines.iter().filter(|r| r.status == PipelineStatus::Success).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.pipelines.iter().filter(|r| r.status == PipelineStatus::Skipped).count()
    }

    pub fn failed_count(&self) -> usize {
        self.pipelines.iter().filter(|r| !r.is_success()).count()
    }

    /// Check if the overall build succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Output of the named pipeline, if it succeeded.
    pub fn output(&self, pipeline: &str) -> Option<&BuildOutput> {
        self.pipelines.iter().find(|r| r.pipeline == pipeline).and_then(|r| r.output.as_ref())
    }

    /// Every artifact produced, relative to the output directory.
    pub fn all_artifacts(&self) -> BTreeSet<PathBuf> {
        self.pipelines
            .iter()
            .filter_map(|r| r.output.as_ref())
            .flat_map(|o| o.artifacts.iter().cloned())
            .collect()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = self.pipelines.len();

        if failed > 0 {
            lines.push(format!(
                "Build failed: {} succeeded, {} skipped, {} failed ({} total)",
                success, skipped, failed, total
            ));
            for result in self.pipelines.iter().filter(|r| !r.is_success()) {
                lines.push(format!("  - {}: {}", result.pipeline, result.status));
            }
        } else if skipped == total {
            lines.push(format!("Dry run: {} pipeline(s) planned, nothing written", total));
        } else {
            lines.push(format!(
                "Build succeeded: {} pipeline(s), {} file(s) in {:?}",
                success,
                self.all_artifacts().len(),
                self.total_duration
            ));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style_output() -> BuildOutput {
        BuildOutput::new(PathBuf::from("/p/dist"), [PathBuf::from("bundle.css")])
    }

    #[test]
    fn test_build_output_files() {
        let output = BuildOutput::new(
            PathBuf::from("/p/dist"),
            [PathBuf::from("index.js"), PathBuf::from("pkg/app_bg.wasm")],
        );
        assert!(output.contains("index.js"));
        assert_eq!(
            output.files(),
            vec![PathBuf::from("/p/dist/index.js"), PathBuf::from("/p/dist/pkg/app_bg.wasm")]
        );
    }

    #[test]
    fn test_build_result_counts() {
        let mut result = BuildResult::new();
        result.add_result(PipelineResult::success(
            "style",
            PipelineKind::Style,
            style_output(),
            Duration::from_millis(10),
        ));
        result.add_result(PipelineResult::failed(
            "app",
            PipelineKind::Application,
            "wasm-pack failed".to_string(),
            Duration::from_millis(5),
        ));

        assert_eq!(result.success_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert!(!result.is_success());
        assert!(result.output("style").is_some());
        assert!(result.output("app").is_none());
    }

    #[test]
    fn test_summary_success() {
        let mut result = BuildResult::new();
        result.add_result(PipelineResult::success(
            "style",
            PipelineKind::Style,
            style_output(),
            Duration::from_millis(10),
        ));
        let summary = result.summary();
        assert!(summary.starts_with("Build succeeded: 1 pipeline(s), 1 file(s)"));
    }

    #[test]
    fn test_summary_failure_lists_pipelines() {
        let mut result = BuildResult::new();
        result.add_result(PipelineResult::failed(
            "app",
            PipelineKind::Application,
            "esbuild exited with status 1".to_string(),
            Duration::ZERO,
        ));
        let summary = result.summary();
        assert!(summary.contains("Build failed: 0 succeeded, 0 skipped, 1 failed"));
        assert!(summary.contains("  - app: failed: esbuild exited with status 1"));
    }

    #[test]
    fn test_summary_dry_run() {
        let mut result = BuildResult::new();
        result.add_result(PipelineResult::skipped("style", PipelineKind::Style));
        result.add_result(PipelineResult::skipped("app", PipelineKind::Application));
        assert_eq!(result.summary(), "Dry run: 2 pipeline(s) planned, nothing written");
    }
}
