//! NL-003: Argument registry of named, defaulted, string-valued launch inputs.
//!
//! Declarations happen once while the plan is built. `resolve` hands out a
//! deferred reference; the value is only looked up when the plan executes.
//! No type coercion or range checks: "true", "0.3" and "-25" are all just text.

use super::error::{LaunchError, LaunchResult};
use super::types::{LaunchArgument, Substitution};
use indexmap::IndexMap;

/// Declared launch arguments in registration order.
#[derive(Debug, Clone, Default)]
pub struct ArgumentRegistry {
    arguments: IndexMap<String, LaunchArgument>,
}

impl ArgumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an argument. Re-declaring a name is a configuration error.
    pub fn declare(&mut self, argument: LaunchArgument) -> LaunchResult<()> {
        if self.arguments.contains_key(&argument.name) {
            return Err(LaunchError::DuplicateArgument(argument.name));
        }
        tracing::trace!(name = %argument.name, default = ?argument.default, "declared argument");
        self.arguments.insert(argument.name.clone(), argument);
        Ok(())
    }

    /// Deferred reference to a declared argument.
    pub fn resolve(&self, name: &str) -> LaunchResult<Substitution> {
        if self.arguments.contains_key(name) {
            Ok(Substitution::arg(name))
        } else {
            Err(LaunchError::undeclared(name))
        }
    }

    /// Fail with `MissingArgument` on the first name that was never declared.
    pub fn check_refs(&self, names: &[&str]) -> LaunchResult<()> {
        match names.iter().find(|n| !self.arguments.contains_key(**n)) {
            Some(name) => Err(LaunchError::undeclared(*name)),
            None => Ok(()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&LaunchArgument> {
        self.arguments.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LaunchArgument> {
        self.arguments.values()
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::MissingKind;

    #[test]
    fn test_nl003_declare_and_resolve() {
        let mut reg = ArgumentRegistry::new();
        reg.declare(LaunchArgument::with_default("slam", "True", "Whether run a SLAM"))
            .unwrap();
        assert_eq!(reg.resolve("slam").unwrap(), Substitution::arg("slam"));
        assert_eq!(reg.get("slam").unwrap().default, Some(Substitution::text("True")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_nl003_duplicate_declaration() {
        let mut reg = ArgumentRegistry::new();
        reg.declare(LaunchArgument::required("robot_radius", "")).unwrap();
        let err = reg
            .declare(LaunchArgument::with_default("robot_radius", "0.3", ""))
            .unwrap_err();
        assert!(matches!(err, LaunchError::DuplicateArgument(ref n) if n == "robot_radius"));
        // first declaration wins
        assert_eq!(reg.get("robot_radius").unwrap().default, None);
    }

    #[test]
    fn test_nl003_resolve_undeclared() {
        let reg = ArgumentRegistry::new();
        let err = reg.resolve("namespace").unwrap_err();
        assert!(matches!(
            err,
            LaunchError::MissingArgument {
                kind: MissingKind::Undeclared,
                ..
            }
        ));
    }

    #[test]
    fn test_nl003_order_preserved() {
        let mut reg = ArgumentRegistry::new();
        for name in ["namespace", "use_namespace", "slam", "raytrace_range"] {
            reg.declare(LaunchArgument::required(name, "")).unwrap();
        }
        let names: Vec<_> = reg.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["namespace", "use_namespace", "slam", "raytrace_range"]);
    }

    #[test]
    fn test_nl003_check_refs() {
        let mut reg = ArgumentRegistry::new();
        reg.declare(LaunchArgument::required("a", "")).unwrap();
        assert!(reg.check_refs(&["a"]).is_ok());
        let err = reg.check_refs(&["a", "b"]).unwrap_err();
        assert_eq!(err.to_string(), "launch argument 'b' is not declared");
    }
}
