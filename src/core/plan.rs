//! NL-006: Launch plan builder.
//!
//! Append-only registration with a single `build` step. The builder checks
//! that every argument a value reads is declared before it, and that every
//! document a value reads names an earlier template. The built plan is an
//! immutable snapshot handed to the executor.

use super::composer::{unit_argument_refs, unit_document_refs};
use super::error::{LaunchError, LaunchResult};
use super::registry::ArgumentRegistry;
use super::types::{LaunchArgument, LaunchUnit, ParamTemplate, PlanEntry, PlanState, Substitution};
use crate::provenance::hasher;
use crate::runtime::valid_env_name;
use indexmap::IndexMap;
use serde::Serialize;

/// Accumulates plan entries in registration order.
#[derive(Debug, Default)]
pub struct LaunchPlanBuilder {
    name: String,
    entries: Vec<PlanEntry>,
    registry: ArgumentRegistry,
    templates: IndexMap<String, ParamTemplate>,
}

impl LaunchPlanBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn state(&self) -> PlanState {
        PlanState::Unbuilt
    }

    /// Append an environment mutation.
    pub fn set_env(&mut self, name: &str, value: Substitution) -> LaunchResult<()> {
        if !valid_env_name(name) {
            return Err(LaunchError::Manifest(format!(
                "invalid environment variable name '{}'",
                name
            )));
        }
        self.check_value(&value)?;
        self.entries.push(PlanEntry::SetEnv {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    /// Declare an argument and return a deferred reference to it.
    pub fn declare(&mut self, argument: LaunchArgument) -> LaunchResult<Substitution> {
        if let Some(default) = &argument.default {
            self.check_value(default)?;
        }
        self.registry.declare(argument.clone())?;
        let reference = Substitution::arg(&argument.name);
        self.entries.push(PlanEntry::Declare(argument));
        Ok(reference)
    }

    /// Deferred reference to an already declared argument.
    pub fn arg(&self, name: &str) -> LaunchResult<Substitution> {
        self.registry.resolve(name)
    }

    /// Register a parameter template and return a reference to its resolved document.
    pub fn template(&mut self, id: &str, template: ParamTemplate) -> LaunchResult<Substitution> {
        if id.is_empty() {
            return Err(LaunchError::Manifest("template id must not be empty".to_string()));
        }
        if self.templates.contains_key(id) {
            return Err(LaunchError::Manifest(format!(
                "template '{}' is registered more than once",
                id
            )));
        }
        if template.replacements.keys().any(String::is_empty) {
            return Err(LaunchError::EmptyToken(id.to_string()));
        }
        self.check_value(&template.source)?;
        for replacement in template.replacements.values() {
            self.check_value(replacement)?;
        }
        tracing::trace!(
            template = id,
            tokens = template.replacements.len(),
            "registered template"
        );
        self.templates.insert(id.to_string(), template);
        Ok(Substitution::document(id))
    }

    /// Append a composed unit.
    pub fn add_unit(&mut self, unit: LaunchUnit) -> LaunchResult<()> {
        let mut args = Vec::new();
        unit_argument_refs(&unit, &mut args);
        self.registry.check_refs(&args)?;
        let mut docs = Vec::new();
        unit_document_refs(&unit, &mut docs);
        self.check_documents(&docs)?;
        self.entries.push(PlanEntry::Unit(unit));
        Ok(())
    }

    pub fn build(self) -> LaunchPlan {
        tracing::debug!(
            plan = %self.name,
            entries = self.entries.len(),
            templates = self.templates.len(),
            "plan built"
        );
        LaunchPlan {
            name: self.name,
            entries: self.entries,
            arguments: self.registry.iter().cloned().collect(),
            templates: self.templates,
        }
    }

    fn check_value(&self, value: &Substitution) -> LaunchResult<()> {
        let mut args = Vec::new();
        value.argument_refs(&mut args);
        self.registry.check_refs(&args)?;
        let mut docs = Vec::new();
        value.document_refs(&mut docs);
        self.check_documents(&docs)
    }

    fn check_documents(&self, ids: &[&str]) -> LaunchResult<()> {
        match ids.iter().find(|id| !self.templates.contains_key(**id)) {
            Some(id) => Err(LaunchError::UnknownTemplate(id.to_string())),
            None => Ok(()),
        }
    }
}

/// A built, immutable launch plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchPlan {
    pub(crate) name: String,
    pub(crate) entries: Vec<PlanEntry>,
    pub(crate) arguments: Vec<LaunchArgument>,
    pub(crate) templates: IndexMap<String, ParamTemplate>,
}

impl LaunchPlan {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Declared arguments in registration order.
    pub fn arguments(&self) -> &[LaunchArgument] {
        &self.arguments
    }

    pub fn templates(&self) -> &IndexMap<String, ParamTemplate> {
        &self.templates
    }

    pub fn state(&self) -> PlanState {
        PlanState::Built
    }

    /// `blake3:{hex}` over the plan's canonical JSON form.
    pub fn fingerprint(&self) -> LaunchResult<String> {
        let json = serde_json::to_string(self)
            .map_err(|e| LaunchError::Runtime(format!("JSON serialize error: {}", e)))?;
        Ok(hasher::hash_string(&json))
    }
}
