//! Build progress reporting.
//!
//! Reporters receive pipeline and step events from the orchestrator. Console
//! output is meant for humans, JSON lines for editors and CI wrappers.
//!
//! # Example
//!
//! ```ignore
//! use assetpipe::build::progress::{ConsoleProgress, PipelineStatus, ProgressEvent, ProgressReporter};
//!
//! let reporter = ConsoleProgress::new();
//! reporter.report(ProgressEvent::BuildStarted { total_pipelines: 2 });
//! reporter.report(ProgressEvent::PipelineCompleted {
//!     pipeline: "style".to_string(),
//!     status: PipelineStatus::Success,
//!     duration_ms: 420,
//! });
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Final status of a pipeline in progress events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Pipeline produced its build output
    Success,
    /// Pipeline was not executed (dry run)
    Skipped,
    /// Pipeline failed
    Failed(String),
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStatus::Success => write!(f, "success"),
            PipelineStatus::Skipped => write!(f, "skipped"),
            PipelineStatus::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Events that can be reported during a build.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Build invocation started
    BuildStarted {
        /// Number of pipeline declarations in the build
        total_pipelines: usize,
    },
    /// A pipeline started executing
    PipelineStarted {
        /// Declaration name
        pipeline: String,
    },
    /// One step of a pipeline finished
    StepCompleted {
        /// Declaration name
        pipeline: String,
        /// Step label (e.g. "style-compile", "native-compile")
        step: String,
        /// Duration in milliseconds
        duration_ms: u64,
    },
    /// A pipeline finished
    PipelineCompleted {
        /// Declaration name
        pipeline: String,
        /// Final status
        status: PipelineStatus,
        /// Duration in milliseconds
        duration_ms: u64,
    },
    /// Build invocation finished
    BuildCompleted {
        /// Whether every pipeline succeeded
        success: bool,
        /// Total duration in milliseconds
        duration_ms: u64,
        /// Number of pipelines that succeeded
        succeeded: usize,
        /// Number of pipelines that failed
        failed: usize,
    },
    /// A non-fatal warning
    Warning {
        /// Pipeline that generated the warning (if applicable)
        pipeline: Option<String>,
        /// Warning message
        message: String,
    },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    /// Create a new null progress reporter.
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    use_colors: bool,
    verbose: bool,
    /// Pipelines finished so far
    current: AtomicUsize,
    /// Pipelines in this build
    total: AtomicUsize,
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("current", &self.current)
            .field("total", &self.total)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a new console progress reporter writing to stderr.
    pub fn new() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stderr),
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(output)),
        }
    }

    /// Set whether to use colors.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Set verbose mode (step-level events are printed).
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BuildStarted { total_pipelines } => {
                self.total.store(total_pipelines, Ordering::SeqCst);
                self.current.store(0, Ordering::SeqCst);
                self.writeln(&format!(
                    "{} Building {} pipeline{}...",
                    self.cyan("[build]"),
                    total_pipelines,
                    if total_pipelines == 1 { "" } else { "s" }
                ));
            }
            ProgressEvent::PipelineStarted { pipeline } => {
                if self.verbose {
                    self.writeln(&format!("{} {} started", self.cyan("[build]"), pipeline));
                }
            }
            ProgressEvent::StepCompleted { pipeline, step, duration_ms } => {
                if self.verbose {
                    self.writeln(&format!(
                        "{}   {} / {} ({})",
                        self.cyan("[step]"),
                        pipeline,
                        step,
                        format_duration(duration_ms)
                    ));
                }
            }
            ProgressEvent::PipelineCompleted { pipeline, status, duration_ms } => {
                let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);

                let status_str = match &status {
                    PipelineStatus::Success => self.green("ok"),
                    PipelineStatus::Skipped => self.yellow("skipped"),
                    PipelineStatus::Failed(_) => self.red("FAILED"),
                };

                self.writeln(&format!(
                    "{} [{}/{}] {} {} ({})",
                    self.cyan("[build]"),
                    current,
                    total,
                    status_str,
                    pipeline,
                    format_duration(duration_ms)
                ));

                // Tool diagnostics are printed as-is, one line at a time
                if let PipelineStatus::Failed(err) = status {
                    for line in err.lines() {
                        self.writeln(&format!("        {}", line));
                    }
                }
            }
            ProgressEvent::BuildCompleted { success, duration_ms, succeeded, failed } => {
                if success {
                    self.writeln(&format!(
                        "{} {} pipeline{} built in {}",
                        self.green("[done]"),
                        succeeded,
                        if succeeded == 1 { "" } else { "s" },
                        format_duration(duration_ms)
                    ));
                } else {
                    self.writeln(&format!(
                        "{} Build failed: {} succeeded, {} failed in {}",
                        self.red("[error]"),
                        succeeded,
                        failed,
                        format_duration(duration_ms)
                    ));
                }
            }
            ProgressEvent::Warning { pipeline, message } => {
                let prefix = match pipeline {
                    Some(name) => format!("{}: ", name),
                    None => String::new(),
                };
                self.writeln(&format!("{} {}{}", self.yellow("[warn]"), prefix, message));
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// JSON-lines progress reporter for machine-readable output.
pub struct JsonProgress {
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Create a new JSON progress reporter writing to stderr.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stderr())) }
    }

    /// Create a JSON progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }

    fn write_json(&self, value: &serde_json::Value) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", value);
        }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        use serde_json::json;

        let value = match event {
            ProgressEvent::BuildStarted { total_pipelines } => {
                json!({ "event": "build_started", "total_pipelines": total_pipelines })
            }
            ProgressEvent::PipelineStarted { pipeline } => {
                json!({ "event": "pipeline_started", "pipeline": pipeline })
            }
            ProgressEvent::StepCompleted { pipeline, step, duration_ms } => json!({
                "event": "step_completed",
                "pipeline": pipeline,
                "step": step,
                "duration_ms": duration_ms,
            }),
            ProgressEvent::PipelineCompleted { pipeline, status, duration_ms } => {
                let mut value = json!({
                    "event": "pipeline_completed",
                    "pipeline": pipeline,
                    "duration_ms": duration_ms,
                });
                let (label, error) = match status {
                    PipelineStatus::Success => ("success", None),
                    PipelineStatus::Skipped => ("skipped", None),
                    PipelineStatus::Failed(e) => ("failed", Some(e)),
                };
                value["status"] = json!(label);
                if let Some(error) = error {
                    value["error"] = json!(error);
                }
                value
            }
            ProgressEvent::BuildCompleted { success, duration_ms, succeeded, failed } => json!({
                "event": "build_completed",
                "success": success,
                "duration_ms": duration_ms,
                "succeeded": succeeded,
                "failed": failed,
            }),
            ProgressEvent::Warning { pipeline, message } => {
                let mut value = json!({ "event": "warning", "message": message });
                if let Some(pipeline) = pipeline {
                    value["pipeline"] = json!(pipeline);
                }
                value
            }
        };
        self.write_json(&value);
    }
}

/// Format a duration in milliseconds to a human-readable string.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{}m {}s", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct TestWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn captured() -> (Arc<Mutex<Vec<u8>>>, TestWriter) {
        let output = Arc::new(Mutex::new(Vec::new()));
        let writer = TestWriter(Arc::clone(&output));
        (output, writer)
    }

    #[test]
    fn test_pipeline_status_display() {
        assert_eq!(PipelineStatus::Success.to_string(), "success");
        assert_eq!(PipelineStatus::Skipped.to_string(), "skipped");
        assert_eq!(PipelineStatus::Failed("boom".to_string()).to_string(), "failed: boom");
    }

    #[test]
    fn test_null_progress() {
        let reporter = NullProgress::new();
        reporter.report(ProgressEvent::BuildStarted { total_pipelines: 2 });
        assert!(!reporter.is_verbose());
    }

    #[test]
    fn test_console_progress_pipeline_completed() {
        let (output, writer) = captured();
        let reporter = ConsoleProgress::with_output(writer).with_colors(false);

        reporter.report(ProgressEvent::BuildStarted { total_pipelines: 2 });
        reporter.report(ProgressEvent::PipelineCompleted {
            pipeline: "style".to_string(),
            status: PipelineStatus::Success,
            duration_ms: 150,
        });

        let output = output.lock().unwrap();
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("Building 2 pipelines"));
        assert!(text.contains("[1/2] ok style (150ms)"));
    }

    #[test]
    fn test_console_progress_failure_prints_diagnostics_verbatim() {
        let (output, writer) = captured();
        let reporter = ConsoleProgress::with_output(writer).with_colors(false);

        reporter.report(ProgressEvent::BuildStarted { total_pipelines: 1 });
        reporter.report(ProgressEvent::PipelineCompleted {
            pipeline: "app".to_string(),
            status: PipelineStatus::Failed("error: expected \";\".\n  ╷\n1 │ a {".to_string()),
            duration_ms: 10,
        });

        let output = output.lock().unwrap();
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("FAILED app"));
        assert!(text.contains("error: expected \";\"."));
        assert!(text.contains("1 │ a {"));
    }

    #[test]
    fn test_console_progress_steps_only_when_verbose() {
        let (output, writer) = captured();
        let quiet = ConsoleProgress::with_output(writer).with_colors(false);
        quiet.report(ProgressEvent::StepCompleted {
            pipeline: "style".to_string(),
            step: "post-process".to_string(),
            duration_ms: 3,
        });
        assert!(output.lock().unwrap().is_empty());

        let (output, writer) = captured();
        let verbose = ConsoleProgress::with_output(writer).with_colors(false).with_verbose(true);
        verbose.report(ProgressEvent::StepCompleted {
            pipeline: "style".to_string(),
            step: "post-process".to_string(),
            duration_ms: 3,
        });
        let output = output.lock().unwrap();
        assert!(String::from_utf8_lossy(&output).contains("style / post-process"));
    }

    #[test]
    fn test_console_progress_build_completed_failed() {
        let (output, writer) = captured();
        let reporter = ConsoleProgress::with_output(writer).with_colors(false);
        reporter.report(ProgressEvent::BuildCompleted {
            success: false,
            duration_ms: 500,
            succeeded: 1,
            failed: 1,
        });

        let output = output.lock().unwrap();
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("Build failed: 1 succeeded, 1 failed"));
    }

    #[test]
    fn test_json_progress_lines() {
        let (output, writer) = captured();
        let reporter = JsonProgress::with_output(writer);

        reporter.report(ProgressEvent::BuildStarted { total_pipelines: 2 });
        reporter.report(ProgressEvent::PipelineCompleted {
            pipeline: "app".to_string(),
            status: PipelineStatus::Failed("wasm-pack exited with status 1".to_string()),
            duration_ms: 42,
        });

        let output = output.lock().unwrap();
        let text = String::from_utf8_lossy(&output);
        let lines: Vec<serde_json::Value> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "build_started");
        assert_eq!(lines[0]["total_pipelines"], 2);
        assert_eq!(lines[1]["status"], "failed");
        assert_eq!(lines[1]["error"], "wasm-pack exited with status 1");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(150), "150ms");
        assert_eq!(format_duration(1500), "1.5s");
        assert_eq!(format_duration(125_000), "2m 5s");
    }
}
