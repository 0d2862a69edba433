//! NL-008: Script runtime. Renders the evaluated plan as a bash launch script.
//!
//! Every included sub-plan becomes one background `ros2 launch` job; the
//! script waits on each of them and exits with the last non-zero status.
//! A non-root namespace scope is passed as `namespace:=<scope>` unless the
//! include already forwards a `namespace` argument.

use super::{valid_env_name, IncludeRequest, LaunchRuntime};
use crate::core::error::{LaunchError, LaunchResult};

/// Default launcher executable.
pub const DEFAULT_LAUNCHER: &str = "ros2";

/// Launch argument carrying the group namespace scope.
pub const NAMESPACE_ARG: &str = "namespace";

const WAIT_ALL: &str = "status=0\nfor pid in \"${pids[@]}\"; do\n  wait \"$pid\" || status=$?\ndone\nexit \"$status\"\n";

/// Accumulates script lines in evaluation order.
#[derive(Debug)]
pub struct ScriptRuntime {
    launcher: String,
    lines: Vec<String>,
    jobs: usize,
}

impl Default for ScriptRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_LAUNCHER)
    }
}

impl ScriptRuntime {
    pub fn new(launcher: &str) -> Self {
        Self {
            launcher: launcher.to_string(),
            lines: Vec::new(),
            jobs: 0,
        }
    }

    /// Number of background launch jobs.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// The complete script.
    pub fn render(&self) -> String {
        let mut script = String::from("#!/usr/bin/env bash\nset -euo pipefail\npids=()\n");
        for line in &self.lines {
            script.push_str(line);
            script.push('\n');
        }
        if self.jobs > 0 {
            script.push_str(WAIT_ALL);
        }
        script
    }
}

impl LaunchRuntime for ScriptRuntime {
    fn set_env(&mut self, name: &str, value: &str) -> LaunchResult<()> {
        if !valid_env_name(name) {
            return Err(LaunchError::Runtime(format!(
                "invalid environment variable name '{}'",
                name
            )));
        }
        self.lines
            .push(format!("export {}={}", name, shell_quote(value)));
        Ok(())
    }

    fn include(&mut self, request: &IncludeRequest) -> LaunchResult<()> {
        let mut line = format!(
            "{} launch {}",
            shell_quote(&self.launcher),
            shell_quote(&request.source.display().to_string())
        );
        for (name, value) in &request.arguments {
            line.push(' ');
            line.push_str(&shell_quote(&format!("{}:={}", name, value)));
        }
        // a forwarded `namespace` argument takes precedence over the group scope
        if !request.namespace.is_root() && !request.arguments.contains_key(NAMESPACE_ARG) {
            line.push(' ');
            line.push_str(&shell_quote(&format!("{}:={}", NAMESPACE_ARG, request.namespace)));
        }
        line.push_str(" &");
        self.lines.push(line);
        self.lines.push("pids+=($!)".to_string());
        self.jobs += 1;
        Ok(())
    }
}

/// Single-quote for bash.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
