//! Shared vocabulary: data interfaces, property values and governance actions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the action that blocks an operation outright.
pub const DENY_ACTION: &str = "Deny";

/// A (protocol, data format) pair. Two interfaces are compatible iff both
/// components are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub protocol: String,
    #[serde(alias = "format")]
    pub dataformat: String,
}

impl Interface {
    pub fn new(protocol: impl Into<String>, dataformat: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            dataformat: dataformat.into(),
        }
    }

    /// An interface with an empty protocol or format cannot be matched.
    pub fn is_complete(&self) -> bool {
        !self.protocol.is_empty() && !self.dataformat.is_empty()
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol, self.dataformat)
    }
}

/// Free-form property value. Kept to a closed set of kinds so that
/// arguments and connection details stay serializable and comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    String(String),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// Granularity at which an action is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementLevel {
    #[default]
    Dataset,
    Column,
    Row,
}

/// A named transformation or restriction mandated by policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceAction {
    pub name: String,
    /// Identifier modules advertise support for. Falls back to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub level: EnforcementLevel,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: Properties,
}

impl GovernanceAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            level: EnforcementLevel::Dataset,
            args: Properties::new(),
        }
    }

    pub fn deny() -> Self {
        Self::new(DENY_ACTION)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_level(mut self, level: EnforcementLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn identifier(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }

    pub fn is_deny(&self) -> bool {
        self.name == DENY_ACTION
    }
}

/// Redaction of a single column; the default action the mock policy engine emits.
pub fn redact_column(column: impl Into<String>) -> GovernanceAction {
    GovernanceAction::new("redact")
        .with_id("redact-ID")
        .with_level(EnforcementLevel::Column)
        .with_arg("column_name", column.into())
}
