//! NL-014: CLI subcommands: init, validate, args, plan, launch.

use crate::bringup::{self, BringupOptions};
use crate::core::composer::UnitOutcome;
use crate::core::executor::{self, ExecuteConfig, ExecutionReport};
use crate::core::parser;
use crate::core::plan::LaunchPlan;
use crate::runtime::local;
use crate::runtime::packages::PackageIndex;
use crate::runtime::recorder::RecordingRuntime;
use crate::runtime::script::{ScriptRuntime, DEFAULT_LAUNCHER};
use clap::Subcommand;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the navigation bringup manifest
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Install root holding the behavior-tree definitions (default: PATH/install)
        #[arg(long)]
        install_root: Option<PathBuf>,
    },

    /// Validate navlaunch.yaml and build the plan without executing it
    Validate {
        /// Path to navlaunch.yaml
        #[arg(short, long, default_value = "navlaunch.yaml")]
        file: PathBuf,
    },

    /// List declared launch arguments
    Args {
        /// Path to navlaunch.yaml
        #[arg(short, long, default_value = "navlaunch.yaml")]
        file: PathBuf,
    },

    /// Evaluate the plan without starting anything
    Plan {
        /// Path to navlaunch.yaml
        #[arg(short, long, default_value = "navlaunch.yaml")]
        file: PathBuf,

        /// Argument overrides, `name:=value`
        overrides: Vec<String>,

        /// State directory (resolved documents, event log)
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Install prefixes, colon separated (default: $AMENT_PREFIX_PATH)
        #[arg(long)]
        prefix_path: Option<String>,

        /// Do not append to the provenance event log
        #[arg(long)]
        no_event_log: bool,
    },

    /// Evaluate the plan and start every included sub-plan
    Launch {
        /// Path to navlaunch.yaml
        #[arg(short, long, default_value = "navlaunch.yaml")]
        file: PathBuf,

        /// Argument overrides, `name:=value`
        overrides: Vec<String>,

        /// Print the launch script without running it
        #[arg(long)]
        dry_run: bool,

        /// State directory (resolved documents, event log, launch script)
        #[arg(long, default_value = "state")]
        state_dir: PathBuf,

        /// Install prefixes, colon separated (default: $AMENT_PREFIX_PATH)
        #[arg(long)]
        prefix_path: Option<String>,

        /// Launcher executable
        #[arg(long, default_value = DEFAULT_LAUNCHER)]
        launcher: String,

        /// Do not append to the provenance event log
        #[arg(long)]
        no_event_log: bool,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path, install_root } => cmd_init(&path, install_root),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Args { file } => cmd_args(&file),
        Commands::Plan {
            file,
            overrides,
            state_dir,
            prefix_path,
            no_event_log,
        } => {
            let cfg = execute_config(&overrides, &state_dir, prefix_path.as_deref(), no_event_log)?;
            cmd_plan(&file, &cfg)
        }
        Commands::Launch {
            file,
            overrides,
            dry_run,
            state_dir,
            prefix_path,
            launcher,
            no_event_log,
        } => {
            let cfg = execute_config(&overrides, &state_dir, prefix_path.as_deref(), no_event_log)?;
            cmd_launch(&file, &cfg, &launcher, dry_run)
        }
    }
}

/// Parse a `name:=value` override.
pub fn parse_override(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(":=") {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid override '{}' (expected name:=value)", raw)),
    }
}

fn parse_overrides(raw: &[String]) -> Result<IndexMap<String, String>, String> {
    let mut overrides = IndexMap::new();
    for item in raw {
        let (name, value) = parse_override(item)?;
        // last one wins, like the launch system itself
        overrides.insert(name, value);
    }
    Ok(overrides)
}

fn execute_config(
    overrides: &[String],
    state_dir: &Path,
    prefix_path: Option<&str>,
    no_event_log: bool,
) -> Result<ExecuteConfig, String> {
    Ok(ExecuteConfig {
        overrides: parse_overrides(overrides)?,
        packages: prefix_path
            .map(PackageIndex::from_path_list)
            .unwrap_or_else(PackageIndex::from_env),
        state_dir: state_dir.to_path_buf(),
        event_log: !no_event_log,
    })
}

fn cmd_init(path: &Path, install_root: Option<PathBuf>) -> Result<(), String> {
    let manifest_path = path.join("navlaunch.yaml");
    if manifest_path.exists() {
        return Err(format!("{} already exists", manifest_path.display()));
    }

    let state_dir = path.join("state");
    std::fs::create_dir_all(&state_dir).map_err(|e| format!("cannot create state dir: {}", e))?;

    let root = std::path::absolute(path).map_err(|e| format!("cannot resolve {}: {}", path.display(), e))?;
    let opts = BringupOptions {
        install_root: install_root.unwrap_or_else(|| root.join("install")),
    };
    let yaml = parser::manifest_to_yaml(&bringup::navigation_bringup(&opts)).map_err(|e| e.to_string())?;
    std::fs::write(&manifest_path, yaml)
        .map_err(|e| format!("cannot write {}: {}", manifest_path.display(), e))?;

    println!("Initialized navlaunch project at {}", path.display());
    println!("  Created: {}", manifest_path.display());
    println!("  Created: {}/", state_dir.display());
    Ok(())
}

/// Parse, validate, and build, printing every validation error.
fn load(file: &Path) -> Result<LaunchPlan, String> {
    let manifest = parser::parse_manifest_file(file).map_err(|e| e.to_string())?;
    let errors = parser::validate_manifest(&manifest);
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        return Err(format!("{} validation error(s)", errors.len()));
    }
    parser::build_plan(&manifest).map_err(|e| e.to_string())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let plan = load(file)?;
    let units = plan
        .entries()
        .iter()
        .filter(|e| matches!(e, crate::core::types::PlanEntry::Unit(_)))
        .count();
    println!(
        "OK: {} ({} arguments, {} templates, {} units)",
        plan.name(),
        plan.arguments().len(),
        plan.templates().len(),
        units
    );
    Ok(())
}

fn cmd_args(file: &Path) -> Result<(), String> {
    let plan = load(file)?;
    let width = plan
        .arguments()
        .iter()
        .map(|a| a.name.len())
        .max()
        .unwrap_or(0);
    for arg in plan.arguments() {
        let default = match &arg.default {
            Some(d) => d.to_string(),
            None => "required".to_string(),
        };
        println!("  {:width$}  {:<40}  {}", arg.name, default, arg.description, width = width);
    }
    Ok(())
}

fn cmd_plan(file: &Path, cfg: &ExecuteConfig) -> Result<(), String> {
    let plan = load(file)?;
    let mut runtime = RecordingRuntime::new();
    let report = executor::execute(plan, cfg, &mut runtime).map_err(|e| e.to_string())?;
    print_report(&report);
    Ok(())
}

/// Display an evaluated plan to stdout.
fn print_report(report: &ExecutionReport) {
    println!("Planning: {} ({})", report.plan, report.fingerprint);
    println!();

    if !report.environment.is_empty() {
        println!("environment:");
        for (name, value) in &report.environment {
            println!("  {}={}", name, value);
        }
    }

    println!("arguments:");
    for (name, bound) in &report.arguments {
        println!("  {} = '{}' ({})", name, bound.value, bound.source);
    }

    if !report.documents.is_empty() {
        println!("documents:");
        for (id, doc) in &report.documents {
            println!("  {}: {} ({})", id, doc.path.display(), doc.hash);
        }
    }

    println!("units:");
    for outcome in &report.outcomes {
        match outcome {
            UnitOutcome::Included(r) => {
                println!("  + {} [{}]", r.source.display(), r.namespace);
                for (name, value) in &r.arguments {
                    println!("      {}:={}", name, value);
                }
            }
            UnitOutcome::Skipped(s) => {
                println!("  - {} [{}] skipped: {}", s.unit, s.namespace, s.condition);
            }
        }
    }

    for name in &report.ignored_overrides {
        println!("  ! ignored override '{}' (not declared)", name);
    }

    println!();
    println!(
        "Plan: {} included, {} skipped.",
        report.included().len(),
        report.skipped().len()
    );
}

fn cmd_launch(file: &Path, cfg: &ExecuteConfig, launcher: &str, dry_run: bool) -> Result<(), String> {
    let plan = load(file)?;
    let mut runtime = ScriptRuntime::new(launcher);
    let report = executor::execute(plan, cfg, &mut runtime).map_err(|e| e.to_string())?;
    let script = runtime.render();

    if dry_run {
        print!("{}", script);
        return Ok(());
    }

    let script_path = cfg.state_dir.join(&report.plan).join("launch.sh");
    if let Some(parent) = script_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("cannot create state dir: {}", e))?;
    }
    std::fs::write(&script_path, &script)
        .map_err(|e| format!("cannot write {}: {}", script_path.display(), e))?;
    tracing::info!(script = %script_path.display(), jobs = runtime.jobs(), "starting launch script");

    let code = local::run_local(&script).map_err(|e| e.to_string())?;
    if code != 0 {
        return Err(format!("launch exited with status {}", code));
    }
    println!("Launch complete: {} sub-plan(s).", runtime.jobs());
    Ok(())
}
