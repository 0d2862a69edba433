//! NL-007: Launch context, the single resolution point for deferred values.
//!
//! Holds caller overrides, argument values bound so far, and the parameter
//! documents resolved during this execution. Write-once per name.

use super::error::{LaunchError, LaunchResult};
use super::resolver::{self, ResolvedDocument};
use super::types::{ArgumentSource, LaunchArgument, ParamTemplate, Substitution};
use crate::runtime::packages::PackageIndex;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// A concrete argument value and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundArgument {
    pub value: String,
    pub source: ArgumentSource,
}

/// Execution-time state for one plan run.
#[derive(Debug)]
pub struct LaunchContext {
    overrides: IndexMap<String, String>,
    bound: IndexMap<String, BoundArgument>,
    templates: IndexMap<String, ParamTemplate>,
    documents: IndexMap<String, ResolvedDocument>,
    packages: PackageIndex,
    document_dir: PathBuf,
}

impl LaunchContext {
    pub fn new(
        overrides: IndexMap<String, String>,
        packages: PackageIndex,
        document_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            overrides,
            bound: IndexMap::new(),
            templates: IndexMap::new(),
            documents: IndexMap::new(),
            packages,
            document_dir: document_dir.into(),
        }
    }

    pub fn with_templates(mut self, templates: IndexMap<String, ParamTemplate>) -> Self {
        self.templates = templates;
        self
    }

    /// Bind a declared argument: caller value, else default, else `MissingArgument`.
    pub fn bind(&mut self, argument: &LaunchArgument) -> LaunchResult<&BoundArgument> {
        let bound = if let Some(v) = self.overrides.get(&argument.name) {
            BoundArgument {
                value: v.clone(),
                source: ArgumentSource::Override,
            }
        } else if let Some(default) = &argument.default {
            BoundArgument {
                value: self.evaluate(default)?,
                source: ArgumentSource::Default,
            }
        } else {
            return Err(LaunchError::unsupplied(&argument.name));
        };
        let (index, _) = self.bound.insert_full(argument.name.clone(), bound);
        Ok(&self.bound[index])
    }

    /// Value of an argument that has already been bound.
    pub fn value(&self, name: &str) -> LaunchResult<&str> {
        self.bound
            .get(name)
            .map(|b| b.value.as_str())
            .ok_or_else(|| LaunchError::undeclared(name))
    }

    pub fn bound(&self) -> &IndexMap<String, BoundArgument> {
        &self.bound
    }

    pub fn documents(&self) -> &IndexMap<String, ResolvedDocument> {
        &self.documents
    }

    pub fn document_dir(&self) -> &Path {
        &self.document_dir
    }

    /// Overrides that never matched a declaration.
    pub fn unused_overrides(&self) -> Vec<&str> {
        self.overrides
            .keys()
            .filter(|k| !self.bound.contains_key(*k))
            .map(String::as_str)
            .collect()
    }

    /// Resolve a deferred value against the current state.
    pub fn evaluate(&mut self, value: &Substitution) -> LaunchResult<String> {
        match value {
            Substitution::Text(s) => Ok(s.clone()),
            Substitution::Arg { arg } => self.value(arg).map(str::to_string),
            Substitution::PackageShare {
                package_share,
                path,
            } => {
                let dir = self.packages.share_dir(package_share)?;
                let full = match path {
                    Some(p) => dir.join(p),
                    None => dir,
                };
                Ok(full.display().to_string())
            }
            Substitution::Document { document } => {
                Ok(self.document(document)?.path.display().to_string())
            }
            Substitution::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&self.evaluate(part)?);
                }
                Ok(out)
            }
        }
    }

    /// Resolve a parameter template, at most once per execution.
    pub fn document(&mut self, id: &str) -> LaunchResult<&ResolvedDocument> {
        if let Some(index) = self.documents.get_index_of(id) {
            return Ok(&self.documents[index]);
        }
        let template = self
            .templates
            .get(id)
            .cloned()
            .ok_or_else(|| LaunchError::UnknownTemplate(id.to_string()))?;
        let resolved = resolver::resolve_template(id, &template, self)?;
        let (index, _) = self.documents.insert_full(id.to_string(), resolved);
        Ok(&self.documents[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::MissingKind;

    fn ctx(overrides: &[(&str, &str)]) -> LaunchContext {
        let overrides = overrides
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LaunchContext::new(overrides, PackageIndex::default(), "/nonexistent")
    }

    #[test]
    fn test_nl007_bind_override_then_default() {
        let mut c = ctx(&[("slam", "false")]);
        let b = c
            .bind(&LaunchArgument::with_default("slam", "True", ""))
            .unwrap();
        assert_eq!(b.value, "false");
        assert_eq!(b.source, ArgumentSource::Override);
        let b = c
            .bind(&LaunchArgument::with_default("autostart", "true", ""))
            .unwrap()
            .clone();
        assert_eq!(b.source, ArgumentSource::Default);
        assert_eq!(c.value("autostart").unwrap(), "true");
    }

    #[test]
    fn test_nl007_required_unsupplied() {
        let mut c = ctx(&[]);
        let err = c
            .bind(&LaunchArgument::required("raytrace_range", ""))
            .unwrap_err();
        assert!(matches!(
            err,
            LaunchError::MissingArgument {
                kind: MissingKind::Unsupplied,
                ..
            }
        ));
    }

    #[test]
    fn test_nl007_empty_default_is_a_value() {
        let mut c = ctx(&[]);
        c.bind(&LaunchArgument::with_default("namespace", "", "")).unwrap();
        assert_eq!(c.value("namespace").unwrap(), "");
    }

    #[test]
    fn test_nl007_default_is_deferred() {
        let prefix = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(prefix.path().join("share/nav2_bringup/params")).unwrap();
        let mut c = LaunchContext::new(
            IndexMap::new(),
            PackageIndex::new(vec![prefix.path().to_path_buf()]),
            prefix.path().join("docs"),
        );
        let b = c
            .bind(&LaunchArgument::with_default_value(
                "params_file",
                Substitution::package_share("nav2_bringup", "params/nav2_params.yaml"),
                "",
            ))
            .unwrap();
        assert!(b.value.ends_with("share/nav2_bringup/params/nav2_params.yaml"));
        assert_eq!(b.source, ArgumentSource::Default);

        // an override never evaluates the default
        let mut c = ctx(&[("params_file", "/tmp/p.yaml")]);
        let b = c
            .bind(&LaunchArgument::with_default_value(
                "params_file",
                Substitution::package_share("nav2_bringup", "params/nav2_params.yaml"),
                "",
            ))
            .unwrap();
        assert_eq!(b.value, "/tmp/p.yaml");
    }

    #[test]
    fn test_nl007_evaluate_unbound_arg() {
        let mut c = ctx(&[("robot_radius", "0.3")]);
        // supplied but never declared: still missing
        let err = c.evaluate(&Substitution::arg("robot_radius")).unwrap_err();
        assert!(matches!(err, LaunchError::MissingArgument { .. }));
        assert_eq!(c.unused_overrides(), vec!["robot_radius"]);
    }

    #[test]
    fn test_nl007_evaluate_concat_and_share() {
        let prefix = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(prefix.path().join("share/nav2_bringup/params")).unwrap();
        let mut c = LaunchContext::new(
            IndexMap::from([("namespace".to_string(), "robot0".to_string())]),
            PackageIndex::new(vec![prefix.path().to_path_buf()]),
            prefix.path().join("docs"),
        );
        c.bind(&LaunchArgument::with_default("namespace", "", "")).unwrap();

        let s = Substitution::concat(vec![Substitution::text("/"), Substitution::arg("namespace")]);
        assert_eq!(c.evaluate(&s).unwrap(), "/robot0");

        let share = c
            .evaluate(&Substitution::package_share("nav2_bringup", "params/nav2_params.yaml"))
            .unwrap();
        assert_eq!(
            share,
            prefix
                .path()
                .join("share/nav2_bringup/params/nav2_params.yaml")
                .display()
                .to_string()
        );
        assert!(matches!(
            c.evaluate(&Substitution::package_share("missing_pkg", "")),
            Err(LaunchError::PackageNotFound(_))
        ));
    }

    #[test]
    fn test_nl007_unknown_template() {
        let mut c = ctx(&[]);
        let err = c.evaluate(&Substitution::document("nope")).unwrap_err();
        assert!(matches!(err, LaunchError::UnknownTemplate(ref id) if id == "nope"));
    }

    #[test]
    fn test_nl007_document_resolved_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("nav2_params.yaml");
        std::fs::write(&source, "robot_radius: <robot_radius>\n").unwrap();

        let template = ParamTemplate {
            source: Substitution::text(source.to_str().unwrap()),
            replacements: IndexMap::from([(
                "<robot_radius>".to_string(),
                Substitution::arg("robot_radius"),
            )]),
        };
        let mut c = LaunchContext::new(
            IndexMap::from([("robot_radius".to_string(), "0.3".to_string())]),
            PackageIndex::default(),
            dir.path().join("documents"),
        )
        .with_templates(IndexMap::from([("params".to_string(), template)]));
        c.bind(&LaunchArgument::required("robot_radius", "")).unwrap();

        let first = c.evaluate(&Substitution::document("params")).unwrap();
        let second = c.evaluate(&Substitution::document("params")).unwrap();
        assert_eq!(first, second);
        assert_eq!(c.documents().len(), 1);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "robot_radius: 0.3\n");
    }
}
