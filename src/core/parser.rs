//! NL-002: Manifest parsing, validation, and plan construction.
//!
//! Parses navlaunch.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - Argument names unique and non-empty
//! - Every `{arg}` reference names a declared argument
//! - Every `{document}` reference names an earlier template
//! - No empty tokens, no empty include sources

use super::composer::{unit_argument_refs, unit_document_refs};
use super::error::{LaunchError, LaunchResult};
use super::plan::{LaunchPlan, LaunchPlanBuilder};
use super::types::*;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a navlaunch.yaml file from disk.
pub fn parse_manifest_file(path: &Path) -> LaunchResult<LaunchManifest> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LaunchError::Manifest(format!("failed to read {}: {}", path.display(), e)))?;
    parse_manifest(&content)
}

/// Parse a navlaunch.yaml from a string.
pub fn parse_manifest(yaml: &str) -> LaunchResult<LaunchManifest> {
    from_yaml(yaml).map_err(|e| LaunchError::Manifest(format!("YAML parse error: {}", e)))
}

/// Deserialize YAML with enums read as single-key maps (`- include: ...`).
pub fn from_yaml<T: DeserializeOwned>(yaml: &str) -> Result<T, serde_yaml_ng::Error> {
    serde_yaml_ng::with::singleton_map_recursive::deserialize(serde_yaml_ng::Deserializer::from_str(yaml))
}

/// Render a manifest as YAML, enums written as single-key maps (`- group: ...`).
pub fn manifest_to_yaml(manifest: &LaunchManifest) -> LaunchResult<String> {
    let mut buf = Vec::new();
    let mut ser = serde_yaml_ng::Serializer::new(&mut buf);
    serde_yaml_ng::with::singleton_map_recursive::serialize(manifest, &mut ser)
        .map_err(|e| LaunchError::Manifest(format!("YAML serialize error: {}", e)))?;
    String::from_utf8(buf).map_err(|e| LaunchError::Manifest(format!("YAML is not UTF-8: {}", e)))
}

/// Validate a parsed manifest. Returns a list of errors (empty = valid).
pub fn validate_manifest(manifest: &LaunchManifest) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut error = |message: String| errors.push(ValidationError { message });

    if manifest.version != "1.0" {
        error(format!("version must be \"1.0\", got \"{}\"", manifest.version));
    }

    if manifest.name.is_empty() {
        error("name must not be empty".to_string());
    } else if !valid_plan_name(&manifest.name) {
        error(format!(
            "name '{}' must be a single path segment (no '/', '\\', '.' or '..')",
            manifest.name
        ));
    }

    for (name, value) in &manifest.env {
        if name.is_empty() {
            error("env variable name must not be empty".to_string());
        }
        let mut args = Vec::new();
        value.argument_refs(&mut args);
        for arg in args {
            error(format!(
                "env '{}' cannot reference argument '{}' (environment is applied before arguments)",
                name, arg
            ));
        }
        let mut docs = Vec::new();
        value.document_refs(&mut docs);
        for doc in docs {
            error(format!("env '{}' cannot reference document '{}'", name, doc));
        }
    }

    let mut declared = HashSet::new();
    for argument in &manifest.arguments {
        if let Some(default) = &argument.default {
            let mut args = Vec::new();
            default.argument_refs(&mut args);
            for arg in args.into_iter().filter(|a| !declared.contains(a)) {
                error(format!(
                    "argument '{}' default references undeclared or later argument '{}'",
                    argument.name, arg
                ));
            }
            let mut docs = Vec::new();
            default.document_refs(&mut docs);
            for doc in docs {
                error(format!(
                    "argument '{}' default references template '{}', but templates are registered after all arguments",
                    argument.name, doc
                ));
            }
        }
        if argument.name.is_empty() {
            error("argument name must not be empty".to_string());
        } else if !declared.insert(argument.name.as_str()) {
            error(format!("argument '{}' is declared more than once", argument.name));
        }
    }

    let mut earlier: HashSet<&str> = HashSet::new();
    for (id, template) in &manifest.templates {
        let mut args = Vec::new();
        let mut docs = Vec::new();
        template.source.argument_refs(&mut args);
        template.source.document_refs(&mut docs);
        for (token, replacement) in &template.replacements {
            if token.is_empty() {
                error(format!("template '{}' has an empty token", id));
            }
            replacement.argument_refs(&mut args);
            replacement.document_refs(&mut docs);
        }
        for arg in args.into_iter().filter(|a| !declared.contains(a)) {
            error(format!("template '{}' references unknown argument '{}'", id, arg));
        }
        for doc in docs.into_iter().filter(|d| !earlier.contains(d)) {
            error(format!(
                "template '{}' references unknown or later template '{}'",
                id, doc
            ));
        }
        earlier.insert(id.as_str());
    }

    for (i, unit) in manifest.units.iter().enumerate() {
        let mut args = Vec::new();
        unit_argument_refs(unit, &mut args);
        for arg in args.into_iter().filter(|a| !declared.contains(a)) {
            error(format!("unit {} references unknown argument '{}'", i, arg));
        }
        let mut docs = Vec::new();
        unit_document_refs(unit, &mut docs);
        for doc in docs.into_iter().filter(|d| !earlier.contains(d)) {
            error(format!("unit {} references unknown template '{}'", i, doc));
        }
        check_sources(unit, i, &mut error);
    }

    errors
}

/// Plan names become directories under the state dir.
pub fn valid_plan_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

fn check_sources(unit: &LaunchUnit, index: usize, error: &mut impl FnMut(String)) {
    match unit {
        LaunchUnit::Group(g) => g
            .children
            .iter()
            .for_each(|c| check_sources(c, index, error)),
        LaunchUnit::Include(inc) => {
            if matches!(&inc.source, Substitution::Text(s) if s.trim().is_empty()) {
                error(format!("unit {} has an include with an empty source", index));
            }
        }
    }
}

/// Build a plan in manifest order: env, arguments, templates, units.
pub fn build_plan(manifest: &LaunchManifest) -> LaunchResult<LaunchPlan> {
    if !valid_plan_name(&manifest.name) {
        return Err(LaunchError::Manifest(format!("invalid plan name '{}'", manifest.name)));
    }
    let mut builder = LaunchPlanBuilder::new(&manifest.name);
    for (name, value) in &manifest.env {
        builder.set_env(name, value.clone())?;
    }
    for argument in &manifest.arguments {
        builder.declare(argument.clone())?;
    }
    for (id, template) in &manifest.templates {
        builder.template(id, template.clone())?;
    }
    for unit in &manifest.units {
        builder.add_unit(unit.clone())?;
    }
    Ok(builder.build())
}

/// Parse, validate, and build a plan from a manifest file.
pub fn load_plan(path: &Path) -> LaunchResult<LaunchPlan> {
    let manifest = parse_manifest_file(path)?;
    let errors = validate_manifest(&manifest);
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        return Err(LaunchError::Manifest(messages.join("; ")));
    }
    build_plan(&manifest)
}
