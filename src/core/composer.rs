//! NL-005: Conditional composition of launch units.
//!
//! A group gates its children on one condition and may push a namespace;
//! an include forwards a resolved argument mapping to an external sub-plan.
//! Children are evaluated depth-first in declaration order.

use super::context::LaunchContext;
use super::error::{LaunchError, LaunchResult};
use super::types::{Condition, GroupUnit, IncludeUnit, LaunchUnit, NamespaceScope, Substitution};
use crate::runtime::{IncludeRequest, LaunchRuntime};
use indexmap::IndexMap;
use std::fmt;
use std::path::Path;

/// Absolute namespace scope, `/` at the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    segments: Vec<String>,
}

impl Namespace {
    pub fn root() -> Self {
        Self::default()
    }

    /// Relative names append, absolute names replace, empty names are a no-op.
    pub fn push(&self, name: &str) -> Self {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed == "/" {
            return self.clone();
        }
        let mut segments = if trimmed.starts_with('/') {
            Vec::new()
        } else {
            self.segments.clone()
        };
        segments.extend(
            trimmed
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

/// A unit whose condition evaluated false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUnit {
    pub unit: String,
    pub condition: String,
    pub namespace: Namespace,
}

/// Result of evaluating one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Included(IncludeRequest),
    Skipped(SkippedUnit),
}

/// Build a group unit.
pub fn group(
    when: Option<Condition>,
    namespace: Option<NamespaceScope>,
    children: Vec<LaunchUnit>,
) -> LaunchUnit {
    LaunchUnit::Group(GroupUnit {
        when,
        namespace,
        children,
    })
}

/// Build an include unit forwarding `arguments` to `source`.
pub fn include<'a>(
    source: Substitution,
    when: Option<Condition>,
    arguments: impl IntoIterator<Item = (&'a str, Substitution)>,
) -> LaunchUnit {
    LaunchUnit::Include(IncludeUnit {
        source,
        when,
        arguments: arguments
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    })
}

/// Parse a boolean-like launch value.
pub fn parse_bool(value: &str) -> LaunchResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(LaunchError::InvalidCondition {
            value: value.to_string(),
        }),
    }
}

impl Condition {
    pub fn evaluate(&self, ctx: &mut LaunchContext) -> LaunchResult<bool> {
        match self {
            Self::If(s) => parse_bool(&ctx.evaluate(s)?),
            Self::Unless(s) => parse_bool(&ctx.evaluate(s)?).map(|b| !b),
            Self::Equals(a, b) => Ok(ctx.evaluate(a)? == ctx.evaluate(b)?),
            Self::Not(c) => c.evaluate(ctx).map(|b| !b),
            Self::All(cs) => {
                for c in cs {
                    if !c.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Any(cs) => {
                for c in cs {
                    if c.evaluate(ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

/// Collect every argument name a unit tree reads.
pub fn unit_argument_refs<'a>(unit: &'a LaunchUnit, out: &mut Vec<&'a str>) {
    match unit {
        LaunchUnit::Group(g) => {
            if let Some(c) = &g.when {
                c.argument_refs(out);
            }
            if let Some(ns) = &g.namespace {
                ns.value.argument_refs(out);
                if let Some(c) = &ns.when {
                    c.argument_refs(out);
                }
            }
            g.children.iter().for_each(|c| unit_argument_refs(c, out));
        }
        LaunchUnit::Include(inc) => {
            if let Some(c) = &inc.when {
                c.argument_refs(out);
            }
            inc.source.argument_refs(out);
            inc.arguments.values().for_each(|v| v.argument_refs(out));
        }
    }
}

/// Collect every template id a unit tree reads.
pub fn unit_document_refs<'a>(unit: &'a LaunchUnit, out: &mut Vec<&'a str>) {
    match unit {
        LaunchUnit::Group(g) => {
            if let Some(c) = &g.when {
                c.document_refs(out);
            }
            if let Some(ns) = &g.namespace {
                ns.value.document_refs(out);
                if let Some(c) = &ns.when {
                    c.document_refs(out);
                }
            }
            g.children.iter().for_each(|c| unit_document_refs(c, out));
        }
        LaunchUnit::Include(inc) => {
            if let Some(c) = &inc.when {
                c.document_refs(out);
            }
            inc.source.document_refs(out);
            inc.arguments.values().for_each(|v| v.document_refs(out));
        }
    }
}

/// Short label for logs and reports.
pub fn describe_unit(unit: &LaunchUnit) -> String {
    match unit {
        LaunchUnit::Group(g) => format!("group ({} children)", g.children.len()),
        LaunchUnit::Include(inc) => format!("include {}", inc.source),
    }
}

/// Evaluate a unit tree under `scope`, appending outcomes in evaluation order.
///
/// The first error aborts the walk; outcomes recorded so far are kept.
pub fn evaluate_unit(
    unit: &LaunchUnit,
    scope: &Namespace,
    ctx: &mut LaunchContext,
    runtime: &mut dyn LaunchRuntime,
    outcomes: &mut Vec<UnitOutcome>,
) -> LaunchResult<()> {
    let when = match unit {
        LaunchUnit::Group(g) => g.when.as_ref(),
        LaunchUnit::Include(inc) => inc.when.as_ref(),
    };
    if let Some(condition) = when {
        if !condition.evaluate(ctx)? {
            tracing::info!(unit = %describe_unit(unit), condition = %condition, "condition false, skipping");
            outcomes.push(UnitOutcome::Skipped(SkippedUnit {
                unit: describe_unit(unit),
                condition: condition.to_string(),
                namespace: scope.clone(),
            }));
            return Ok(());
        }
    }

    match unit {
        LaunchUnit::Group(g) => {
            let inner = group_scope(g, scope, ctx)?;
            for child in &g.children {
                evaluate_unit(child, &inner, ctx, runtime, outcomes)?;
            }
            Ok(())
        }
        LaunchUnit::Include(inc) => {
            let request = build_request(inc, scope, ctx, runtime)?;
            runtime.include(&request)?;
            tracing::info!(
                source = %request.source.display(),
                namespace = %request.namespace,
                "included sub-plan"
            );
            outcomes.push(UnitOutcome::Included(request));
            Ok(())
        }
    }
}

fn group_scope(
    g: &GroupUnit,
    scope: &Namespace,
    ctx: &mut LaunchContext,
) -> LaunchResult<Namespace> {
    let Some(ns) = &g.namespace else {
        return Ok(scope.clone());
    };
    if let Some(condition) = &ns.when {
        if !condition.evaluate(ctx)? {
            return Ok(scope.clone());
        }
    }
    let name = ctx.evaluate(&ns.value)?;
    Ok(scope.push(&name))
}

fn build_request(
    inc: &IncludeUnit,
    scope: &Namespace,
    ctx: &mut LaunchContext,
    runtime: &dyn LaunchRuntime,
) -> LaunchResult<IncludeRequest> {
    let location = match ctx.evaluate(&inc.source) {
        Ok(location) => location,
        Err(LaunchError::PackageNotFound(package)) => {
            return Err(LaunchError::UnresolvableSubPlan {
                location: inc.source.to_string(),
                reason: format!("package '{}' not found", package),
            })
        }
        Err(e) => return Err(e),
    };
    let source = runtime.locate(Path::new(&location))?;

    let mut arguments = IndexMap::new();
    for (name, value) in &inc.arguments {
        arguments.insert(name.clone(), ctx.evaluate(value)?);
    }

    Ok(IncludeRequest {
        source,
        namespace: scope.clone(),
        arguments,
    })
}
