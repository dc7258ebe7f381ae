//! Watch mode for automatic rebuilds on file changes
//!
//! Provides file system watching with debouncing for `assetpipe build --watch`.
//! Every relevant change reruns the whole build; a failed build is reported and
//! watching continues.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use crate::build::{BuildError, BuildResult};
use crate::config::schema::WatchConfig;

/// Error during watch mode
#[derive(Debug)]
pub enum WatchError {
    /// Failed to initialize file watcher
    WatcherInit(notify::Error),
    /// Failed to add watch path
    WatchPath(notify::Error),
    /// Channel receive error
    ChannelError(String),
    /// Nothing to watch
    NoWatchRoots,
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::WatcherInit(e) => write!(f, "Failed to initialize file watcher: {}", e),
            WatchError::WatchPath(e) => write!(f, "Failed to watch path: {}", e),
            WatchError::ChannelError(msg) => write!(f, "Watch channel error: {}", msg),
            WatchError::NoWatchRoots => write!(f, "None of the watched paths exist"),
        }
    }
}

impl std::error::Error for WatchError {}

/// Tracks whether the previous build failed, to announce recoveries
#[derive(Debug, Default)]
pub struct ErrorTracker {
    failing: bool,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a build outcome; returns true when it fixes a previous failure
    pub fn update(&mut self, succeeded: bool) -> bool {
        let recovered = self.failing && succeeded;
        self.failing = !succeeded;
        recovered
    }

    /// Whether the last build failed
    pub fn has_errors(&self) -> bool {
        self.failing
    }
}

/// Options for watch mode
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Directories to watch recursively
    pub roots: Vec<PathBuf>,
    /// Output directory; changes inside it never trigger a rebuild
    pub out_dir: PathBuf,
    /// Watch configuration (debounce, clear screen)
    pub config: WatchConfig,
    /// Verbose output
    pub verbose: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from("js")],
            out_dir: PathBuf::from("dist"),
            config: WatchConfig::default(),
            verbose: false,
        }
    }
}

impl WatchOptions {
    /// Existing roots with nested duplicates removed.
    pub fn effective_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.roots.iter().filter(|r| r.exists()).cloned().collect();
        roots.sort();
        roots.dedup();
        let all = roots.clone();
        roots.retain(|r| !all.iter().any(|other| other != r && r.starts_with(other)));
        roots
    }
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Format duration for display
fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Get current timestamp for logging
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400; // seconds since midnight
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Watch for file changes and rebuild automatically.
///
/// Runs `build` once up front, then after every debounced batch of relevant
/// changes. Blocks until interrupted (Ctrl+C).
///
/// # Example
/// ```ignore
/// let options = WatchOptions { roots: vec![root.join("js")], out_dir: root.join("dist"), ..Default::default() };
/// watch_and_rebuild(options, || orchestrator.run())?;
/// ```
pub fn watch_and_rebuild<F>(options: WatchOptions, mut build: F) -> Result<(), WatchError>
where
    F: FnMut() -> Result<BuildResult, BuildError>,
{
    let roots = options.effective_roots();
    if roots.is_empty() {
        return Err(WatchError::NoWatchRoots);
    }

    // Create channel for debounced events
    let (tx, rx) = channel();

    let debounce_duration = Duration::from_millis(options.config.debounce_ms as u64);
    let mut debouncer = new_debouncer(debounce_duration, tx).map_err(WatchError::WatcherInit)?;

    for root in &roots {
        debouncer.watcher().watch(root, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;
        tracing::debug!(root = %root.display(), "watching");
    }

    let mut error_tracker = ErrorTracker::new();

    if options.config.clear_screen {
        clear_screen();
    }
    rebuild(&mut build, &mut error_tracker);
    println!("[{}] Watching {} path(s) for changes...", timestamp(), roots.len());

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant_changes: Vec<_> = events
                    .iter()
                    .filter(|e| {
                        matches!(e.kind, DebouncedEventKind::Any)
                            && is_relevant_file(&e.path, &options.out_dir)
                    })
                    .collect();

                if relevant_changes.is_empty() {
                    continue;
                }

                if options.config.clear_screen {
                    clear_screen();
                }
                for event in &relevant_changes {
                    if let Some(name) = event.path.file_name() {
                        println!("[{}] Changed: {}", timestamp(), name.to_string_lossy());
                    }
                }

                rebuild(&mut build, &mut error_tracker);
                println!("[{}] Watching {} path(s) for changes...", timestamp(), roots.len());
            }
            Ok(Err(error)) => {
                // Watch error (non-fatal) - log but continue watching
                eprintln!("[{}] Watch error: {:?}", timestamp(), error);
                eprintln!("[{}] Continuing to watch...", timestamp());
            }
            Err(e) => {
                return Err(WatchError::ChannelError(e.to_string()));
            }
        }
    }
}

fn rebuild<F>(build: &mut F, tracker: &mut ErrorTracker)
where
    F: FnMut() -> Result<BuildResult, BuildError>,
{
    println!("[{}] Building...", timestamp());
    let start = Instant::now();
    let outcome = build();
    let elapsed = start.elapsed();

    if tracker.update(outcome.is_ok()) {
        println!("[{}] Fixed: build is passing again", timestamp());
    }

    match outcome {
        Ok(result) => {
            println!(
                "[{}] Build complete ({}) - {}",
                timestamp(),
                format_duration(elapsed),
                result.summary()
            );
        }
        Err(err) => {
            eprintln!("[{}] Build failed ({}) - {} error", timestamp(), format_duration(elapsed), err.category());
            eprintln!("{}", err);
        }
    }
}

/// Check if a changed path should trigger a rebuild
///
/// Output files, build directories and hidden files are ignored.
fn is_relevant_file(path: &Path, out_dir: &Path) -> bool {
    if path.starts_with(out_dir) {
        return false;
    }
    !path.components().any(|c| {
        let part = c.as_os_str().to_string_lossy();
        part == "target" || part == "node_modules" || (part.starts_with('.') && part.len() > 1 && part != "..")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_watch_options_default() {
        let options = WatchOptions::default();
        assert_eq!(options.roots, vec![PathBuf::from("js")]);
        assert_eq!(options.out_dir, PathBuf::from("dist"));
        assert_eq!(options.config.debounce_ms, 100);
        assert!(options.config.clear_screen);
    }

    #[test]
    fn test_is_relevant_file() {
        let out = Path::new("/p/dist");
        assert!(is_relevant_file(Path::new("/p/js/app.scss"), out));
        assert!(is_relevant_file(Path::new("/p/src/lib.rs"), out));
        assert!(!is_relevant_file(Path::new("/p/dist/bundle.css"), out));
        assert!(!is_relevant_file(Path::new("/p/target/wasm32-unknown-unknown/x.wasm"), out));
        assert!(!is_relevant_file(Path::new("/p/node_modules/lib/index.js"), out));
        assert!(!is_relevant_file(Path::new("/p/.git/HEAD"), out));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(1000)), "1.00s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }

    #[test]
    fn test_effective_roots_drop_missing_and_nested() {
        let temp = TempDir::new().unwrap();
        let js = temp.path().join("js");
        std::fs::create_dir_all(js.join("components")).unwrap();

        let options = WatchOptions {
            roots: vec![js.join("components"), js.clone(), temp.path().join("missing")],
            ..Default::default()
        };
        assert_eq!(options.effective_roots(), vec![js]);
    }

    #[test]
    fn test_watch_without_roots_errors() {
        let options =
            WatchOptions { roots: vec![PathBuf::from("/nonexistent/path")], ..Default::default() };

        let result = watch_and_rebuild(options, || Ok(BuildResult::new()));
        assert!(matches!(result, Err(WatchError::NoWatchRoots)));
    }

    #[test]
    fn test_error_tracker_detects_recovery() {
        let mut tracker = ErrorTracker::new();
        assert!(!tracker.update(true));
        assert!(!tracker.update(false));
        assert!(tracker.has_errors());
        assert!(!tracker.update(false));
        assert!(tracker.update(true));
        assert!(!tracker.has_errors());
    }
}
