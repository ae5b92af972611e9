//! Registered data-path modules and the capabilities they advertise.

use crate::taxonomy::Interface;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kind of data path a capability (or a plan step) serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    Read,
    Write,
    Copy,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Read => "read",
            FlowType::Write => "write",
            FlowType::Copy => "copy",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How widely one deployed instance of a capability is shared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityScope {
    /// One instance per asset.
    #[default]
    Asset,
    /// One instance per workload, serving all of its assets.
    Workload,
    /// One instance per cluster.
    Cluster,
}

impl CapabilityScope {
    pub fn is_shared(&self) -> bool {
        !matches!(self, CapabilityScope::Asset)
    }
}

/// A supported (source, sink) pair. Either side may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInOut {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Interface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sink: Option<Interface>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub hostname: String,
    pub port: u16,
    pub scheme: String,
}

impl EndpointSpec {
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.hostname, self.port)
    }
}

/// Externally reachable API exposed by a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleApi {
    #[serde(flatten)]
    pub interface: Interface,
    pub endpoint: EndpointSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCapability {
    pub capability: FlowType,
    #[serde(default)]
    pub scope: CapabilityScope,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_interfaces: Vec<ModuleInOut>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ModuleApi>,
    /// Identifiers of the governance actions this capability can enforce.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub actions: BTreeSet<String>,
}

impl ModuleCapability {
    pub fn supports_action(&self, id: &str) -> bool {
        self.actions.contains(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Module,
    Connector,
    Feature,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(rename = "type")]
    pub kind: DependencyType,
    pub name: String,
}

/// Deployable artifact backing a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub chart: ChartSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub capabilities: Vec<ModuleCapability>,
}

impl Module {
    pub fn capabilities_of(&self, flow: FlowType) -> impl Iterator<Item = &ModuleCapability> {
        self.capabilities
            .iter()
            .filter(move |c| c.capability == flow)
    }

    pub fn has_capability(&self, flow: FlowType) -> bool {
        self.capabilities_of(flow).next().is_some()
    }

    /// Names of other modules this one needs deployed alongside it.
    pub fn module_dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .filter(|d| d.kind == DependencyType::Module)
            .map(|d| d.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READ_MODULE: &str = r#"
name: arrow-flight
chart:
  name: charts/arrow-flight
capabilities:
  - capability: read
    scope: workload
    supportedInterfaces:
      - source: { protocol: s3, dataformat: parquet }
    api:
      protocol: fybrik-arrow-flight
      dataformat: arrow
      endpoint: { hostname: arrow-flight, port: 80, scheme: grpc }
    actions: [redact-ID]
  - capability: write
    supportedInterfaces:
      - sink: { protocol: s3, dataformat: parquet }
dependencies:
  - type: module
    name: vault-plugin
  - type: feature
    name: ingress
"#;

    #[test]
    fn module_yaml_parses_with_defaults() {
        let module: Module = serde_yaml::from_str(READ_MODULE).expect("module parses");
        assert!(module.has_capability(FlowType::Read));
        assert!(!module.has_capability(FlowType::Copy));

        let read = module.capabilities_of(FlowType::Read).next().expect("read capability");
        assert_eq!(read.scope, CapabilityScope::Workload);
        assert!(read.supports_action("redact-ID"));
        assert_eq!(
            read.api.as_ref().map(|a| a.endpoint.url()).as_deref(),
            Some("grpc://arrow-flight:80")
        );

        let write = module.capabilities_of(FlowType::Write).next().expect("write capability");
        assert_eq!(write.scope, CapabilityScope::Asset);

        let deps: Vec<&str> = module.module_dependencies().collect();
        assert_eq!(deps, vec!["vault-plugin"]);
    }
}
