//! NL-001: Launch manifest schema, plan entries, and provenance events.
//!
//! Every manifest type derives Serialize/Deserialize so the bringup
//! description can be written out by `init` and read back unchanged.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ============================================================================
// Top-level navlaunch.yaml
// ============================================================================

/// Root manifest: the declarative startup description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchManifest {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Plan name, also used for the provenance log directory
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Environment mutations applied before any unit (order-preserving)
    #[serde(default)]
    pub env: IndexMap<String, Substitution>,

    /// Argument declarations in registration order
    #[serde(default)]
    pub arguments: Vec<LaunchArgument>,

    /// Parameter templates keyed by id
    #[serde(default)]
    pub templates: IndexMap<String, ParamTemplate>,

    /// Composed launch units
    #[serde(default)]
    pub units: Vec<LaunchUnit>,
}

// ============================================================================
// Arguments
// ============================================================================

/// A user-overridable launch input. Values are always strings.
///
/// The default is itself deferred, so it may point into an installed
/// package (`{package_share: nav2_bringup, path: params/nav2_params.yaml}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchArgument {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Substitution>,

    #[serde(default)]
    pub description: String,
}

impl LaunchArgument {
    /// A required argument (no default).
    pub fn required(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            default: None,
            description: description.to_string(),
        }
    }

    /// An argument that falls back to `default` when not supplied.
    pub fn with_default(name: &str, default: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            default: Some(Substitution::text(default)),
            description: description.to_string(),
        }
    }

    /// An argument whose default is a deferred value.
    pub fn with_default_value(name: &str, default: Substitution, description: &str) -> Self {
        Self {
            name: name.to_string(),
            default: Some(default),
            description: description.to_string(),
        }
    }
}

/// Where a bound argument value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentSource {
    Default,
    Override,
}

impl fmt::Display for ArgumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Override => write!(f, "override"),
        }
    }
}

// ============================================================================
// Deferred values
// ============================================================================

/// A value resolved only when the plan executes.
///
/// YAML forms: a scalar is literal text, a list is a concatenation,
/// `{arg: NAME}`, `{package_share: PKG, path: REL}`, `{document: ID}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Substitution {
    Text(#[serde(deserialize_with = "scalar")] String),
    Concat(Vec<Substitution>),
    Arg {
        arg: String,
    },
    PackageShare {
        package_share: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Document {
        document: String,
    },
}

impl Substitution {
    pub fn text(value: &str) -> Self {
        Self::Text(value.to_string())
    }

    pub fn arg(name: &str) -> Self {
        Self::Arg {
            arg: name.to_string(),
        }
    }

    pub fn package_share(package: &str, path: &str) -> Self {
        Self::PackageShare {
            package_share: package.to_string(),
            path: (!path.is_empty()).then(|| path.to_string()),
        }
    }

    pub fn document(id: &str) -> Self {
        Self::Document {
            document: id.to_string(),
        }
    }

    pub fn concat(parts: Vec<Substitution>) -> Self {
        Self::Concat(parts)
    }

    /// Collect every argument name this value reads, in first-seen order.
    pub fn argument_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Arg { arg } => {
                if !out.contains(&arg.as_str()) {
                    out.push(arg);
                }
            }
            Self::Concat(parts) => parts.iter().for_each(|p| p.argument_refs(out)),
            Self::Text(_) | Self::PackageShare { .. } | Self::Document { .. } => {}
        }
    }

    /// Collect every template id this value reads.
    pub fn document_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Document { document } => {
                if !out.contains(&document.as_str()) {
                    out.push(document);
                }
            }
            Self::Concat(parts) => parts.iter().for_each(|p| p.document_refs(out)),
            Self::Text(_) | Self::PackageShare { .. } | Self::Arg { .. } => {}
        }
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "'{}'", s),
            Self::Arg { arg } => write!(f, "$({})", arg),
            Self::PackageShare {
                package_share,
                path,
            } => match path {
                Some(p) => write!(f, "share({})/{}", package_share, p),
                None => write!(f, "share({})", package_share),
            },
            Self::Document { document } => write!(f, "document({})", document),
            Self::Concat(parts) => {
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{}", p)?;
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// Boolean expression over argument values, evaluated once at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    If(Substitution),
    Unless(Substitution),
    Equals(Substitution, Substitution),
    Not(Box<Condition>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    pub fn argument_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::If(s) | Self::Unless(s) => s.argument_refs(out),
            Self::Equals(a, b) => {
                a.argument_refs(out);
                b.argument_refs(out);
            }
            Self::Not(c) => c.argument_refs(out),
            Self::All(cs) | Self::Any(cs) => cs.iter().for_each(|c| c.argument_refs(out)),
        }
    }

    pub fn document_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::If(s) | Self::Unless(s) => s.document_refs(out),
            Self::Equals(a, b) => {
                a.document_refs(out);
                b.document_refs(out);
            }
            Self::Not(c) => c.document_refs(out),
            Self::All(cs) | Self::Any(cs) => cs.iter().for_each(|c| c.document_refs(out)),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::If(s) => write!(f, "if {}", s),
            Self::Unless(s) => write!(f, "unless {}", s),
            Self::Equals(a, b) => write!(f, "{} == {}", a, b),
            Self::Not(c) => write!(f, "not ({})", c),
            Self::All(cs) => write_joined(f, cs, " and "),
            Self::Any(cs) => write_joined(f, cs, " or "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, cs: &[Condition], sep: &str) -> fmt::Result {
    for (i, c) in cs.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "({})", c)?;
    }
    Ok(())
}

// ============================================================================
// Parameter templates
// ============================================================================

/// A templated parameter document and its token bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamTemplate {
    /// Path of the unresolved source document
    pub source: Substitution,

    /// token -> replacement, unique per template
    #[serde(default)]
    pub replacements: IndexMap<String, Substitution>,
}

// ============================================================================
// Launch units
// ============================================================================

/// A node in the composed startup tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchUnit {
    Group(GroupUnit),
    Include(IncludeUnit),
}

/// A namespace scope over an ordered list of children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUnit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<NamespaceScope>,

    #[serde(default)]
    pub children: Vec<LaunchUnit>,
}

/// Namespace pushed for a group's descendants, optionally conditional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceScope {
    pub value: Substitution,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,
}

/// An external sub-plan invoked with a forwarded argument mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeUnit {
    /// Location of the sub-plan file
    pub source: Substitution,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,

    /// Forwarded verbatim once resolved
    #[serde(default)]
    pub arguments: IndexMap<String, Substitution>,
}

// ============================================================================
// Plan
// ============================================================================

/// One entry of a built plan, evaluated in append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntry {
    SetEnv { name: String, value: Substitution },
    Declare(LaunchArgument),
    Unit(LaunchUnit),
}

/// Lifecycle of a plan. There is no transition back to `Unbuilt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    Unbuilt,
    Built,
    Executing,
    Complete,
    Failed,
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbuilt => write!(f, "UNBUILT"),
            Self::Built => write!(f, "BUILT"),
            Self::Executing => write!(f, "EXECUTING"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

// ============================================================================
// Provenance events
// ============================================================================

/// Provenance event for the JSONL event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvenanceEvent {
    PlanStarted {
        plan: String,
        run_id: String,
        fingerprint: String,
        navlaunch_version: String,
    },
    EnvironmentSet {
        run_id: String,
        name: String,
        value: String,
    },
    ArgumentBound {
        run_id: String,
        name: String,
        value: String,
        source: ArgumentSource,
    },
    DocumentResolved {
        run_id: String,
        template: String,
        source: String,
        path: String,
        hash: String,
    },
    UnitIncluded {
        run_id: String,
        location: String,
        namespace: String,
    },
    UnitSkipped {
        run_id: String,
        unit: String,
        condition: String,
    },
    PlanCompleted {
        plan: String,
        run_id: String,
        units_included: u32,
        units_skipped: u32,
        total_seconds: f64,
    },
    PlanFailed {
        plan: String,
        run_id: String,
        error: String,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: ProvenanceEvent,
}

// ============================================================================
// Scalar helpers
// ============================================================================

/// Convert a scalar YAML value to its string form.
pub fn yaml_value_to_string(val: &serde_yaml_ng::Value) -> String {
    match val {
        serde_yaml_ng::Value::String(s) => s.clone(),
        serde_yaml_ng::Value::Number(n) => n.to_string(),
        serde_yaml_ng::Value::Bool(b) => b.to_string(),
        serde_yaml_ng::Value::Null => String::new(),
        other => format!("{:?}", other),
    }
}

/// Accept any YAML scalar as a string; `slam: true` and `robot_radius: 0.3`
/// load the same as their quoted forms.
fn scalar<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let value = serde_yaml_ng::Value::deserialize(d)?;
    match value {
        serde_yaml_ng::Value::Sequence(_)
        | serde_yaml_ng::Value::Mapping(_)
        | serde_yaml_ng::Value::Tagged(_) => {
            Err(serde::de::Error::custom("expected a scalar value"))
        }
        other => Ok(yaml_value_to_string(&other)),
    }
}

// ============================================================================
// Tests
// ============================================================================
