//! NL-008: External launch runtime seam.
//!
//! The composer hands every environment mutation and included sub-plan to a
//! [`LaunchRuntime`]. What the started processes do is the runtime's concern.

pub mod local;
pub mod packages;
pub mod recorder;
pub mod script;

use crate::core::composer::Namespace;
use crate::core::error::{LaunchError, LaunchResult};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// A resolved sub-plan invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRequest {
    /// Sub-plan file
    pub source: PathBuf,
    /// Namespace scope the sub-plan runs under
    pub namespace: Namespace,
    /// Forwarded argument mapping, already resolved
    pub arguments: IndexMap<String, String>,
}

/// Receives the evaluated plan.
pub trait LaunchRuntime {
    fn set_env(&mut self, name: &str, value: &str) -> LaunchResult<()>;

    /// Locate a sub-plan file. The default requires it to exist.
    fn locate(&self, location: &Path) -> LaunchResult<PathBuf> {
        if location.is_file() {
            Ok(location.to_path_buf())
        } else {
            Err(LaunchError::UnresolvableSubPlan {
                location: location.display().to_string(),
                reason: "no such file".to_string(),
            })
        }
    }

    fn include(&mut self, request: &IncludeRequest) -> LaunchResult<()>;
}

/// Environment variable names accepted by the runtimes.
pub fn valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
