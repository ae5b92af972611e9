//! In-process collaborators seeded with a small, consistent world: two
//! clusters, a handful of catalogs and the modules that serve them.
//!
//! Used by the CLI when no external services are configured, and by tests.

use crate::catalog::MemoryCatalog;
use crate::cluster::StaticClusterLister;
use crate::evaluator::DefaultConfigEvaluator;
use crate::reconciler::Collaborators;
use crate::registry::MemoryModuleRegistry;
use crate::storage::MemoryStorageAllocator;
use std::collections::BTreeSet;
use std::sync::Arc;
use weir_core::config::ConnectorsConfig;
use weir_core::{
    CapabilityScope, ChartSpec, Cluster, EndpointSpec, FlowType, Interface, Module, ModuleApi,
    ModuleCapability, ModuleInOut, WeirConfig,
};
use weir_policy::{AllowAllPolicyClient, MockPolicyClient, MultiPolicyClient, PolicyClient};

pub const LOCAL_CLUSTER: &str = "thegreendragon";
pub const LOCAL_REGION: &str = "theshire";

/// Builds a named policy engine.
pub fn policy_engine(name: &str) -> anyhow::Result<Arc<dyn PolicyClient>> {
    match name {
        "mock" => Ok(Arc::new(MockPolicyClient::fixtures())),
        "allow-all" => Ok(Arc::new(AllowAllPolicyClient)),
        other => anyhow::bail!("unknown policy engine '{other}' (expected mock or allow-all)"),
    }
}

/// The main engine, merged with the extension engine when one is configured.
pub fn policy_from_config(connectors: &ConnectorsConfig) -> anyhow::Result<Arc<dyn PolicyClient>> {
    let main = policy_engine(&connectors.policy_engine)?;
    match &connectors.extension_policy_engine {
        Some(extension) => Ok(Arc::new(
            MultiPolicyClient::new(main).with_engine(policy_engine(extension)?),
        )),
        None => Ok(main),
    }
}

fn arrow() -> Interface {
    Interface::new("fybrik-arrow-flight", "arrow")
}

fn parquet() -> Interface {
    Interface::new("s3", "parquet")
}

fn module(name: &str, capabilities: Vec<ModuleCapability>) -> Module {
    Module {
        name: name.to_string(),
        description: None,
        chart: ChartSpec {
            name: format!("ghcr.io/weir/charts/{name}:0.1.0"),
            values: Default::default(),
        },
        dependencies: Vec::new(),
        capabilities,
    }
}

fn actions(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn copy(source: Interface, ids: &[&str]) -> ModuleCapability {
    ModuleCapability {
        capability: FlowType::Copy,
        scope: CapabilityScope::Asset,
        supported_interfaces: vec![ModuleInOut {
            source: Some(source),
            sink: Some(parquet()),
        }],
        api: None,
        actions: actions(ids),
    }
}

/// Reader and writer for S3, plus copies from DB2 and Kafka into S3.
pub fn modules() -> Vec<Module> {
    let read = ModuleCapability {
        capability: FlowType::Read,
        scope: CapabilityScope::Workload,
        supported_interfaces: vec![
            ModuleInOut {
                source: Some(parquet()),
                sink: None,
            },
            ModuleInOut {
                source: Some(Interface::new("s3", "csv")),
                sink: None,
            },
        ],
        api: Some(ModuleApi {
            interface: arrow(),
            endpoint: EndpointSpec {
                hostname: "arrow-flight-module".to_string(),
                port: 80,
                scheme: "grpc".to_string(),
            },
        }),
        actions: actions(&["redact-ID"]),
    };
    let write = ModuleCapability {
        capability: FlowType::Write,
        scope: CapabilityScope::Asset,
        supported_interfaces: vec![ModuleInOut {
            source: None,
            sink: Some(parquet()),
        }],
        api: None,
        actions: actions(&["redact-ID"]),
    };

    vec![
        module("arrow-flight-module", vec![read, write]),
        module(
            "implicit-copy-db2-to-s3",
            vec![copy(Interface::new("jdbc-db2", "table"), &["redact-ID", "encrypt-ID"])],
        ),
        module(
            "implicit-copy-kafka-to-s3-stream",
            vec![copy(Interface::new("kafka", "json"), &["redact-ID"])],
        ),
        module(
            "implicit-copy-s3",
            vec![copy(parquet(), &["redact-ID"])],
        ),
    ]
}

pub fn clusters() -> Vec<Cluster> {
    vec![
        Cluster::new(LOCAL_CLUSTER, LOCAL_REGION),
        Cluster::new("neverland-cluster", "neverland"),
    ]
}

/// Defaults plus the local cluster and one storage region.
pub fn config() -> WeirConfig {
    let mut config = WeirConfig::default();
    config.controller.local_cluster = Some(LOCAL_CLUSTER.to_string());
    config.storage.regions = vec![LOCAL_REGION.to_string()];
    config
}

/// Concrete handles on the fixture collaborators, so callers can change the
/// world between passes.
pub struct Fixtures {
    pub catalog: Arc<MemoryCatalog>,
    pub storage: Arc<MemoryStorageAllocator>,
    pub registry: Arc<MemoryModuleRegistry>,
    pub clusters: Arc<StaticClusterLister>,
    pub policy: Arc<dyn PolicyClient>,
}

impl Fixtures {
    pub fn new(config: &WeirConfig) -> anyhow::Result<Self> {
        Ok(Self {
            catalog: Arc::new(MemoryCatalog::fixtures()),
            storage: Arc::new(MemoryStorageAllocator::new(config.storage.regions.iter())),
            registry: Arc::new(MemoryModuleRegistry::new(modules())),
            clusters: Arc::new(StaticClusterLister::new(clusters())),
            policy: policy_from_config(&config.connectors)?,
        })
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            catalog: self.catalog.clone(),
            policy: self.policy.clone(),
            storage: self.storage.clone(),
            clusters: self.clusters.clone(),
            registry: self.registry.clone(),
            evaluator: Arc::new(DefaultConfigEvaluator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_engines_resolve_by_name() {
        let mut connectors = ConnectorsConfig::default();
        assert_eq!(policy_from_config(&connectors).expect("mock").name(), "mock");

        connectors.extension_policy_engine = Some("allow-all".to_string());
        assert_eq!(policy_from_config(&connectors).expect("multi").name(), "multi");

        connectors.policy_engine = "opa".to_string();
        let err = policy_from_config(&connectors).err().expect("unknown engine");
        assert!(err.to_string().contains("opa"));
    }

    #[test]
    fn every_fixture_module_has_a_capability() {
        let modules = modules();
        assert!(modules.iter().all(|m| !m.capabilities.is_empty()));
        assert!(modules[0].has_capability(FlowType::Read));
        assert!(modules[0].has_capability(FlowType::Write));
    }
}
