//! Build command implementations (build, init)

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::build::parallel::default_jobs;
use crate::build::{
    BuildContext, ConsoleProgress, JsonProgress, Orchestrator, OutputClaim, ProgressReporter,
};
use crate::config::loader::{
    default_config, find_config, load_config, merge_cli_overrides, starter_config, CliOverrides,
    CONFIG_FILE_NAME,
};
use crate::config::{Mode, PipeConfig};
use crate::tools::Toolchain;
use crate::watch::{watch_and_rebuild, WatchOptions};

/// Arguments of `assetpipe build`
#[derive(Debug, Default)]
pub struct BuildArgs {
    pub mode: Option<Mode>,
    pub out: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub no_style: bool,
    pub no_app: bool,
    pub watch: bool,
    pub dry_run: bool,
    pub verbose: bool,
    pub json: bool,
}

/// Locate and load the configuration, returning it with the project root.
fn load_project(args: &BuildArgs) -> Result<(PipeConfig, PathBuf), String> {
    let config_path = match &args.config {
        Some(path) => Some(path.clone()),
        None => find_config(),
    };

    match config_path {
        Some(path) => {
            if args.verbose {
                eprintln!("Using config: {}", path.display());
            }
            let config = load_config(Some(&path))
                .map_err(|e| format!("Error loading {}: {}", path.display(), e))?;
            let root = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
            Ok((config, root))
        }
        None => {
            if args.verbose {
                eprintln!("No {} found, using defaults", CONFIG_FILE_NAME);
            }
            Ok((default_config(), std::env::current_dir().unwrap_or_default()))
        }
    }
}

/// Run the build command, returning the process exit code
pub fn run_build(args: BuildArgs) -> u8 {
    if args.watch && args.dry_run {
        eprintln!("Error: --watch and --dry-run cannot be combined");
        return EXIT_INVALID_ARGS;
    }

    let (mut config, project_root) = match load_project(&args) {
        Ok(loaded) => loaded,
        Err(message) => {
            eprintln!("{}", message);
            return EXIT_ERROR;
        }
    };

    let overrides = CliOverrides {
        out: args.out.clone(),
        mode: args.mode,
        jobs: args.jobs.map(|j| if j == 0 { default_jobs() } else { j }),
        no_style: args.no_style,
        no_app: args.no_app,
    };
    merge_cli_overrides(&mut config, &overrides);

    let errors = config.validate();
    if !errors.is_empty() {
        for error in errors {
            eprintln!("Error: {}", error);
        }
        return EXIT_ERROR;
    }

    let context = BuildContext::new(config, project_root).with_verbose(args.verbose);
    let reporter: Arc<dyn ProgressReporter> = if args.json {
        Arc::new(JsonProgress::new())
    } else {
        Arc::new(ConsoleProgress::new().with_verbose(args.verbose))
    };

    let orchestrator = Orchestrator::from_context(&context, Toolchain::from_config(context.config()))
        .with_dry_run(args.dry_run)
        .with_reporter(reporter);

    tracing::debug!(mode = %context.mode(), out = %context.out_dir().display(), "starting build");

    if args.dry_run {
        return dry_run(&orchestrator, &context);
    }

    if args.watch {
        let mut roots: Vec<PathBuf> = orchestrator
            .pipelines()
            .iter()
            .flat_map(|p| p.declaration().watch_roots())
            .collect();
        roots.extend(context.config().watch.paths.iter().map(|p| context.resolve_path(p)));

        let options = WatchOptions {
            roots,
            out_dir: context.out_dir(),
            config: context.config().watch.clone(),
            verbose: args.verbose,
        };

        println!("Starting watch mode...");
        println!("Press Ctrl+C to stop");
        println!();

        return match watch_and_rebuild(options, || orchestrator.run()) {
            Ok(()) => EXIT_SUCCESS,
            Err(e) => {
                eprintln!("Watch error: {}", e);
                EXIT_ERROR
            }
        };
    }

    match orchestrator.run() {
        Ok(result) => {
            println!("{}", result.summary());
            EXIT_SUCCESS
        }
        Err(e) => {
            // Tool diagnostics are printed unmodified
            eprintln!("Error ({}): {}", e.category(), e);
            EXIT_ERROR
        }
    }
}

fn dry_run(orchestrator: &Orchestrator, context: &BuildContext) -> u8 {
    match orchestrator.plan() {
        Ok(claims) => {
            println!("Dry run - would build:");
            println!("  Mode:   {}", context.mode());
            println!("  Output: {}", context.out_dir().display());
            for pipeline in orchestrator.pipelines() {
                let declaration = pipeline.declaration();
                println!("  Pipeline '{}' ({}):", declaration.name, declaration.kind);
                if !declaration.transform_chain.is_empty() {
                    println!("    chain: {}", declaration.transform_chain.describe());
                }
                for claim in claims.iter().filter(|c| c.pipeline == declaration.name) {
                    match &claim.claim {
                        OutputClaim::File(path) => println!("    - {}", path.display()),
                        OutputClaim::Dir(path) => println!("    - {}/", path.display()),
                    }
                }
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Error ({}): {}", e.category(), e);
            EXIT_ERROR
        }
    }
}

/// Run the init command
pub fn run_init(path: Option<&Path>, name: Option<&str>) -> u8 {
    let project_path = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    let project_name = name
        .map(|n| n.to_string())
        .or_else(|| {
            let absolute = if project_path.is_absolute() {
                project_path.clone()
            } else {
                std::env::current_dir().unwrap_or_default().join(&project_path)
            };
            absolute.file_name().map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "my-project".to_string());

    let config_path = project_path.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        eprintln!("Error: {} already exists", config_path.display());
        return EXIT_ERROR;
    }

    if let Err(e) = fs::create_dir_all(&project_path) {
        eprintln!("Error: cannot create {}: {}", project_path.display(), e);
        return EXIT_ERROR;
    }

    match fs::write(&config_path, starter_config(&project_name)) {
        Ok(()) => {
            println!("Created {} for '{}'", config_path.display(), project_name);
            println!();
            println!("Expected layout:");
            println!("  {}/", project_path.display());
            println!("  ├── {}", CONFIG_FILE_NAME);
            println!("  ├── Cargo.toml      (crate compiled to WASM)");
            println!("  ├── js/index.js     (application entry)");
            println!("  ├── js/app.scss     (stylesheet)");
            println!("  └── static/         (copied verbatim)");
            println!();
            println!("Next steps:");
            println!("  cd {}", project_path.display());
            println!("  assetpipe build --mode development");
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Error: cannot write {}: {}", config_path.display(), e);
            EXIT_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_config_once() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("site");

        assert_eq!(run_init(Some(&dir), Some("site")), EXIT_SUCCESS);
        let written = fs::read_to_string(dir.join(CONFIG_FILE_NAME)).unwrap();
        assert!(written.contains("name = \"site\""));

        assert_eq!(run_init(Some(&dir), Some("site")), EXIT_ERROR);
    }

    #[test]
    fn test_init_defaults_name_to_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("edge-frame");

        assert_eq!(run_init(Some(&dir), None), EXIT_SUCCESS);
        let config = load_config(Some(&dir.join(CONFIG_FILE_NAME))).unwrap();
        assert_eq!(config.project.name, "edge-frame");
    }

    #[test]
    fn test_watch_and_dry_run_conflict() {
        let args = BuildArgs { watch: true, dry_run: true, ..Default::default() };
        assert_eq!(run_build(args), EXIT_INVALID_ARGS);
    }

    #[test]
    fn test_dry_run_with_explicit_config() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("js")).unwrap();
        fs::write(temp.path().join("js/app.scss"), "").unwrap();
        fs::write(temp.path().join("js/index.js"), "").unwrap();
        fs::write(temp.path().join(CONFIG_FILE_NAME), "[project]\nname = \"dry\"\n").unwrap();

        let args = BuildArgs {
            config: Some(temp.path().join(CONFIG_FILE_NAME)),
            dry_run: true,
            ..Default::default()
        };
        assert_eq!(run_build(args), EXIT_SUCCESS);
        assert!(!temp.path().join("dist").exists());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let temp = TempDir::new().unwrap();
        let args = BuildArgs { config: Some(temp.path().join("nope.toml")), ..Default::default() };
        assert_eq!(run_build(args), EXIT_ERROR);
    }
}
