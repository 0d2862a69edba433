//! NL-008: Recording runtime. Evaluates a plan without starting anything.

use super::{valid_env_name, IncludeRequest, LaunchRuntime};
use crate::core::error::{LaunchError, LaunchResult};

/// One call received by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeAction {
    SetEnv { name: String, value: String },
    Include(IncludeRequest),
}

/// Records every action in arrival order.
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    actions: Vec<RuntimeAction>,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[RuntimeAction] {
        &self.actions
    }

    pub fn includes(&self) -> Vec<&IncludeRequest> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                RuntimeAction::Include(r) => Some(r),
                RuntimeAction::SetEnv { .. } => None,
            })
            .collect()
    }
}

impl LaunchRuntime for RecordingRuntime {
    fn set_env(&mut self, name: &str, value: &str) -> LaunchResult<()> {
        if !valid_env_name(name) {
            return Err(LaunchError::Runtime(format!(
                "invalid environment variable name '{}'",
                name
            )));
        }
        self.actions.push(RuntimeAction::SetEnv {
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn include(&mut self, request: &IncludeRequest) -> LaunchResult<()> {
        self.actions.push(RuntimeAction::Include(request.clone()));
        Ok(())
    }
}
