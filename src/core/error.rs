//! NL-009: Error taxonomy for plan construction and execution.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why an argument value could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingKind {
    /// The name was never declared.
    Undeclared,
    /// Declared without a default and no value was supplied.
    Unsupplied,
}

impl fmt::Display for MissingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undeclared => write!(f, "not declared"),
            Self::Unsupplied => write!(f, "required but no value was supplied"),
        }
    }
}

/// Errors raised while building or executing a launch plan.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("launch argument '{0}' is declared more than once")]
    DuplicateArgument(String),

    #[error("launch argument '{name}' is {kind}")]
    MissingArgument { name: String, kind: MissingKind },

    #[error("cannot resolve sub-plan {location}: {reason}")]
    UnresolvableSubPlan { location: String, reason: String },

    #[error("package '{0}' not found in any install prefix")]
    PackageNotFound(String),

    #[error("'{value}' is not a boolean condition value (expected true/false/1/0)")]
    InvalidCondition { value: String },

    #[error("token '{0}' is bound more than once")]
    DuplicateToken(String),

    #[error("template '{0}' binds an empty token")]
    EmptyToken(String),

    #[error("unknown parameter template '{0}'")]
    UnknownTemplate(String),

    #[error("parameter document {}: {source}", .path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl LaunchError {
    pub(crate) fn undeclared(name: impl Into<String>) -> Self {
        Self::MissingArgument {
            name: name.into(),
            kind: MissingKind::Undeclared,
        }
    }

    pub(crate) fn unsupplied(name: impl Into<String>) -> Self {
        Self::MissingArgument {
            name: name.into(),
            kind: MissingKind::Unsupplied,
        }
    }

    pub(crate) fn document(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Document {
            path: path.into(),
            source,
        }
    }
}

/// Result type for launch operations.
pub type LaunchResult<T> = Result<T, LaunchError>;
