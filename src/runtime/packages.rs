//! NL-008: Package share lookup across install prefixes.

use crate::core::error::{LaunchError, LaunchResult};
use std::path::{Path, PathBuf};

/// Environment variable listing install prefixes, colon separated.
pub const PREFIX_PATH_VAR: &str = "AMENT_PREFIX_PATH";

/// Ordered install prefixes; the first prefix providing a package wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIndex {
    prefixes: Vec<PathBuf>,
}

impl PackageIndex {
    pub fn new(prefixes: Vec<PathBuf>) -> Self {
        Self { prefixes }
    }

    /// Build from `AMENT_PREFIX_PATH` (empty index when unset).
    pub fn from_env() -> Self {
        std::env::var(PREFIX_PATH_VAR)
            .map(|v| Self::from_path_list(&v))
            .unwrap_or_default()
    }

    /// Parse a colon-separated prefix list, skipping empty segments.
    pub fn from_path_list(list: &str) -> Self {
        Self::new(
            list.split(':')
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect(),
        )
    }

    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }

    /// `<prefix>/share/<package>` for the first prefix that has it.
    pub fn share_dir(&self, package: &str) -> LaunchResult<PathBuf> {
        if package.is_empty() || package.contains('/') {
            return Err(LaunchError::PackageNotFound(package.to_string()));
        }
        self.prefixes
            .iter()
            .map(|prefix| share_path(prefix, package))
            .find(|dir| dir.is_dir())
            .ok_or_else(|| LaunchError::PackageNotFound(package.to_string()))
    }
}

fn share_path(prefix: &Path, package: &str) -> PathBuf {
    prefix.join("share").join(package)
}
