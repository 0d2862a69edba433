//! NL-007: Executor. Evaluates a built plan against a launch runtime.
//!
//! plan → for each entry in append order: env | bind argument | walk unit tree
//! → runtime calls → provenance events. The plan is consumed; the first error
//! aborts the rest and nothing already applied is rolled back.

use super::composer::{evaluate_unit, Namespace, SkippedUnit, UnitOutcome};
use super::context::{BoundArgument, LaunchContext};
use super::error::LaunchResult;
use super::plan::LaunchPlan;
use super::resolver::ResolvedDocument;
use super::types::{PlanEntry, PlanState, ProvenanceEvent};
use crate::provenance::eventlog;
use crate::runtime::packages::PackageIndex;
use crate::runtime::{IncludeRequest, LaunchRuntime};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Configuration for one execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
    /// Caller-supplied argument values
    pub overrides: IndexMap<String, String>,
    /// Install prefixes for package lookup
    pub packages: PackageIndex,
    /// Root for resolved documents and the event log
    pub state_dir: PathBuf,
    /// Append provenance events to `<state_dir>/<plan>/events.jsonl`
    pub event_log: bool,
}

impl ExecuteConfig {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            overrides: IndexMap::new(),
            packages: PackageIndex::from_env(),
            state_dir: state_dir.into(),
            event_log: true,
        }
    }

    /// Directory resolved parameter documents are written to.
    pub fn document_dir(&self) -> PathBuf {
        self.state_dir.join("documents")
    }
}

/// What a completed execution did.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub plan: String,
    pub run_id: String,
    pub fingerprint: String,
    pub state: PlanState,
    pub environment: IndexMap<String, String>,
    pub arguments: IndexMap<String, BoundArgument>,
    pub documents: IndexMap<String, ResolvedDocument>,
    /// Included and skipped units in evaluation order
    pub outcomes: Vec<UnitOutcome>,
    pub ignored_overrides: Vec<String>,
    pub duration: Duration,
}

impl ExecutionReport {
    pub fn included(&self) -> Vec<&IncludeRequest> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                UnitOutcome::Included(r) => Some(r),
                UnitOutcome::Skipped(_) => None,
            })
            .collect()
    }

    pub fn skipped(&self) -> Vec<&SkippedUnit> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                UnitOutcome::Skipped(s) => Some(s),
                UnitOutcome::Included(_) => None,
            })
            .collect()
    }
}

/// Event sink for one run; a failed append is logged, never fatal.
struct EventSink<'a> {
    state_dir: &'a Path,
    plan: &'a str,
    run_id: &'a str,
    enabled: bool,
}

impl EventSink<'_> {
    fn emit(&self, event: ProvenanceEvent) {
        if !self.enabled {
            return;
        }
        if let Err(e) = eventlog::append_event(self.state_dir, self.plan, event) {
            tracing::warn!(error = %e, "failed to append provenance event");
        }
    }
}

/// Execute the plan. Consumes it: a plan runs at most once.
pub fn execute(
    plan: LaunchPlan,
    cfg: &ExecuteConfig,
    runtime: &mut dyn LaunchRuntime,
) -> LaunchResult<ExecutionReport> {
    let start = Instant::now();
    let fingerprint = plan.fingerprint()?;
    let LaunchPlan {
        name,
        entries,
        templates,
        ..
    } = plan;

    let run_id = eventlog::generate_run_id();
    let sink = EventSink {
        state_dir: &cfg.state_dir,
        plan: &name,
        run_id: &run_id,
        enabled: cfg.event_log,
    };
    let span = tracing::info_span!("execute", plan = %name, run_id = %run_id);
    let _guard = span.enter();
    tracing::info!(state = %PlanState::Executing, fingerprint = %fingerprint, "executing plan");

    sink.emit(ProvenanceEvent::PlanStarted {
        plan: name.clone(),
        run_id: run_id.clone(),
        fingerprint: fingerprint.clone(),
        navlaunch_version: env!("CARGO_PKG_VERSION").to_string(),
    });

    let mut ctx = LaunchContext::new(
        cfg.overrides.clone(),
        cfg.packages.clone(),
        cfg.document_dir(),
    )
    .with_templates(templates);
    let mut run = Run {
        environment: IndexMap::new(),
        outcomes: Vec::new(),
        documents_seen: 0,
        outcomes_seen: 0,
    };

    for entry in &entries {
        let result = run.entry(entry, &mut ctx, runtime, &sink);
        run.flush(&ctx, &sink);
        if let Err(e) = result {
            tracing::error!(state = %PlanState::Failed, error = %e, "plan failed");
            sink.emit(ProvenanceEvent::PlanFailed {
                plan: name.clone(),
                run_id: run_id.clone(),
                error: e.to_string(),
            });
            return Err(e);
        }
    }

    let ignored_overrides: Vec<String> = ctx
        .unused_overrides()
        .into_iter()
        .map(str::to_string)
        .collect();
    for name in &ignored_overrides {
        tracing::warn!(argument = %name, "override names an undeclared argument, ignored");
    }

    let duration = start.elapsed();
    let report = ExecutionReport {
        plan: name.clone(),
        run_id: run_id.clone(),
        fingerprint,
        state: PlanState::Complete,
        environment: run.environment,
        arguments: ctx.bound().clone(),
        documents: ctx.documents().clone(),
        outcomes: run.outcomes,
        ignored_overrides,
        duration,
    };

    sink.emit(ProvenanceEvent::PlanCompleted {
        plan: name.clone(),
        run_id: run_id.clone(),
        units_included: report.included().len() as u32,
        units_skipped: report.skipped().len() as u32,
        total_seconds: duration.as_secs_f64(),
    });
    tracing::info!(
        state = %report.state,
        included = report.included().len(),
        skipped = report.skipped().len(),
        "plan complete"
    );
    Ok(report)
}

/// Mutable state of one run.
struct Run {
    environment: IndexMap<String, String>,
    outcomes: Vec<UnitOutcome>,
    documents_seen: usize,
    outcomes_seen: usize,
}

impl Run {
    fn entry(
        &mut self,
        entry: &PlanEntry,
        ctx: &mut LaunchContext,
        runtime: &mut dyn LaunchRuntime,
        sink: &EventSink,
    ) -> LaunchResult<()> {
        match entry {
            PlanEntry::SetEnv { name, value } => {
                let value = ctx.evaluate(value)?;
                runtime.set_env(name, &value)?;
                tracing::debug!(name = %name, value = %value, "environment set");
                sink.emit(ProvenanceEvent::EnvironmentSet {
                    run_id: sink.run_id.to_string(),
                    name: name.clone(),
                    value: value.clone(),
                });
                self.environment.insert(name.clone(), value);
            }
            PlanEntry::Declare(argument) => {
                let bound = ctx.bind(argument)?;
                tracing::debug!(
                    name = %argument.name,
                    value = %bound.value,
                    source = %bound.source,
                    "argument bound"
                );
                sink.emit(ProvenanceEvent::ArgumentBound {
                    run_id: sink.run_id.to_string(),
                    name: argument.name.clone(),
                    value: bound.value.clone(),
                    source: bound.source,
                });
            }
            PlanEntry::Unit(unit) => {
                evaluate_unit(unit, &Namespace::root(), ctx, runtime, &mut self.outcomes)?;
            }
        }
        Ok(())
    }

    /// Emit events for documents and unit outcomes produced since the last flush.
    fn flush(&mut self, ctx: &LaunchContext, sink: &EventSink) {
        for doc in ctx.documents().values().skip(self.documents_seen) {
            sink.emit(ProvenanceEvent::DocumentResolved {
                run_id: sink.run_id.to_string(),
                template: doc.template.clone(),
                source: doc.source.display().to_string(),
                path: doc.path.display().to_string(),
                hash: doc.hash.clone(),
            });
        }
        self.documents_seen = ctx.documents().len();

        for outcome in self.outcomes.iter().skip(self.outcomes_seen) {
            let event = match outcome {
                UnitOutcome::Included(r) => ProvenanceEvent::UnitIncluded {
                    run_id: sink.run_id.to_string(),
                    location: r.source.display().to_string(),
                    namespace: r.namespace.to_string(),
                },
                UnitOutcome::Skipped(s) => ProvenanceEvent::UnitSkipped {
                    run_id: sink.run_id.to_string(),
                    unit: s.unit.clone(),
                    condition: s.condition.clone(),
                },
            };
            sink.emit(event);
        }
        self.outcomes_seen = self.outcomes.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::composer::{group, include};
    use crate::core::error::{LaunchError, MissingKind};
    use crate::core::plan::LaunchPlanBuilder;
    use crate::core::types::{Condition, LaunchArgument, ParamTemplate, Substitution};
    use crate::runtime::recorder::{RecordingRuntime, RuntimeAction};

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("slam.py"), "").unwrap();
            std::fs::write(dir.path().join("nav.py"), "").unwrap();
            std::fs::write(
                dir.path().join("params.yaml"),
                "robot_radius: <robot_radius>\nfootprint_radius: <robot_radius>\n",
            )
            .unwrap();
            Self { dir }
        }

        fn file(&self, name: &str) -> Substitution {
            Substitution::text(self.dir.path().join(name).to_str().unwrap())
        }

        fn plan(&self) -> LaunchPlan {
            let mut b = LaunchPlanBuilder::new("test-plan");
            b.set_env("RCUTILS_LOGGING_BUFFERED_STREAM", Substitution::text("1"))
                .unwrap();
            let slam = b
                .declare(LaunchArgument::with_default("slam", "True", ""))
                .unwrap();
            let radius = b
                .declare(LaunchArgument::required("robot_radius", ""))
                .unwrap();
            let doc = b
                .template(
                    "params",
                    ParamTemplate::new(self.file("params.yaml"))
                        .bind("<robot_radius>", radius)
                        .unwrap(),
                )
                .unwrap();
            b.add_unit(group(
                None,
                None,
                vec![
                    include(
                        self.file("slam.py"),
                        Some(Condition::If(slam)),
                        [("params_file", doc.clone())],
                    ),
                    include(self.file("nav.py"), None, [("params_file", doc)]),
                ],
            ))
            .unwrap();
            b.build()
        }

        fn config(&self, overrides: &[(&str, &str)]) -> ExecuteConfig {
            ExecuteConfig {
                overrides: overrides
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                packages: PackageIndex::default(),
                state_dir: self.dir.path().join("state"),
                event_log: true,
            }
        }
    }

    #[test]
    fn test_nl007_execute_complete() {
        let fx = Fixture::new();
        let mut rt = RecordingRuntime::new();
        let report = execute(fx.plan(), &fx.config(&[("robot_radius", "0.3")]), &mut rt).unwrap();

        assert_eq!(report.state, PlanState::Complete);
        assert_eq!(report.environment["RCUTILS_LOGGING_BUFFERED_STREAM"], "1");
        assert!(matches!(rt.actions()[0], RuntimeAction::SetEnv { .. }));

        let included = report.included();
        assert_eq!(included.len(), 2);
        assert!(included[0].source.ends_with("slam.py"));
        assert!(included[1].source.ends_with("nav.py"));
        assert_eq!(
            included[0].arguments["params_file"],
            included[1].arguments["params_file"]
        );

        let doc = &report.documents["params"];
        let text = std::fs::read_to_string(&doc.path).unwrap();
        assert_eq!(text, "robot_radius: 0.3\nfootprint_radius: 0.3\n");
        assert_eq!(doc.occurrences["<robot_radius>"], 2);
        assert!(doc.path.starts_with(fx.dir.path().join("state/documents")));
    }

    #[test]
    fn test_nl007_slam_false_skips_slam() {
        let fx = Fixture::new();
        let mut rt = RecordingRuntime::new();
        let report = execute(
            fx.plan(),
            &fx.config(&[("robot_radius", "0.3"), ("slam", "false")]),
            &mut rt,
        )
        .unwrap();
        let included = report.included();
        assert_eq!(included.len(), 1);
        assert!(included[0].source.ends_with("nav.py"));
        assert_eq!(report.skipped().len(), 1);
    }

    #[test]
    fn test_nl007_missing_required_fails() {
        let fx = Fixture::new();
        let mut rt = RecordingRuntime::new();
        let err = execute(fx.plan(), &fx.config(&[]), &mut rt).unwrap_err();
        assert!(matches!(
            err,
            LaunchError::MissingArgument {
                kind: MissingKind::Unsupplied,
                ref name,
            } if name == "robot_radius"
        ));
        // env already applied is not rolled back
        assert_eq!(rt.actions().len(), 1);
        assert!(rt.includes().is_empty());

        let events = eventlog::read_events(&fx.dir.path().join("state"), "test-plan").unwrap();
        let last = events.last().unwrap();
        assert!(matches!(last.event, ProvenanceEvent::PlanFailed { .. }));
    }

    #[test]
    fn test_nl007_event_log_order() {
        let fx = Fixture::new();
        let mut rt = RecordingRuntime::new();
        execute(fx.plan(), &fx.config(&[("robot_radius", "0.3")]), &mut rt).unwrap();

        let events = eventlog::read_events(&fx.dir.path().join("state"), "test-plan").unwrap();
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e.event {
                ProvenanceEvent::PlanStarted { .. } => "started",
                ProvenanceEvent::EnvironmentSet { .. } => "env",
                ProvenanceEvent::ArgumentBound { .. } => "arg",
                ProvenanceEvent::DocumentResolved { .. } => "doc",
                ProvenanceEvent::UnitIncluded { .. } => "included",
                ProvenanceEvent::UnitSkipped { .. } => "skipped",
                ProvenanceEvent::PlanCompleted { .. } => "completed",
                ProvenanceEvent::PlanFailed { .. } => "failed",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["started", "env", "arg", "arg", "doc", "included", "included", "completed"]
        );
    }

    #[test]
    fn test_nl007_event_log_disabled() {
        let fx = Fixture::new();
        let mut cfg = fx.config(&[("robot_radius", "0.3")]);
        cfg.event_log = false;
        execute(fx.plan(), &cfg, &mut RecordingRuntime::new()).unwrap();
        assert!(!eventlog::event_log_path(&cfg.state_dir, "test-plan").exists());
    }

    #[test]
    fn test_nl007_unknown_override_ignored() {
        let fx = Fixture::new();
        let report = execute(
            fx.plan(),
            &fx.config(&[("robot_radius", "0.3"), ("robot_radiu", "0.5")]),
            &mut RecordingRuntime::new(),
        )
        .unwrap();
        assert_eq!(report.ignored_overrides, vec!["robot_radiu".to_string()]);
    }

    #[test]
    fn test_nl007_rerun_is_idempotent() {
        let fx = Fixture::new();
        let cfg = fx.config(&[("robot_radius", "0.3")]);
        let a = execute(fx.plan(), &cfg, &mut RecordingRuntime::new()).unwrap();
        let b = execute(fx.plan(), &cfg, &mut RecordingRuntime::new()).unwrap();
        assert_eq!(a.documents["params"].path, b.documents["params"].path);
        assert_eq!(a.documents["params"].hash, b.documents["params"].hash);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(
            a.documents["params"].path,
            fx.dir.path().join("params.yaml")
        );
    }
}
