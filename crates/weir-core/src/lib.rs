//! Core data model shared by all Weir crates.
//!
//! An application asks for governed access to a set of catalog assets. The
//! planner turns each asset into data-path steps built from registered
//! modules, and the runtime converges the resulting execution plan and the
//! application status.

pub mod application;
pub mod asset;
pub mod cluster;
pub mod config;
pub mod error;
pub mod module;
pub mod plan;
pub mod resource;
pub mod status;
pub mod taxonomy;

pub use application::{
    Application, ApplicationSpec, CatalogRegistration, CopyRequirements, DataContext,
    DataRequirements, ValidationError, WorkloadSelector,
};
pub use asset::{AssetMetadata, AssetRequest, DataStore, Usage};
pub use cluster::Cluster;
pub use config::WeirConfig;
pub use error::{ErrorClass, ErrorReason};
pub use module::{
    CapabilityScope, ChartSpec, Dependency, DependencyType, EndpointSpec, FlowType, Module,
    ModuleApi, ModuleCapability, ModuleInOut,
};
pub use plan::{
    ComponentTemplate, CopyArgs, DataFlow, ExecutionPlan, ExecutionUnit, FlowStep, Placement,
    PlanStatus, ReadArgs, StepArguments, UnitStatus, WriteArgs,
};
pub use resource::{ObjectMeta, Resource, ResourceKey};
pub use status::{
    ApplicationStatus, AssetCondition, AssetState, Phase, ProvisionedStorage, ResourceReference,
};
pub use taxonomy::{
    EnforcementLevel, GovernanceAction, Interface, Properties, PropertyValue, DENY_ACTION,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn store(name: &str, protocol: &str, format: &str) -> DataStore {
        DataStore {
            name: name.to_string(),
            interface: Interface::new(protocol, format),
            connection: Properties::from([("endpoint".to_string(), PropertyValue::from("http://s3"))]),
            credential_ref: Some(format!("{name}-creds")),
        }
    }

    fn sample_plan() -> ExecutionPlan {
        let read_api = ModuleApi {
            interface: Interface::new("fybrik-arrow-flight", "arrow"),
            endpoint: EndpointSpec {
                hostname: "notebook-arrow-flight".to_string(),
                port: 80,
                scheme: "grpc".to_string(),
            },
        };
        let copy = FlowStep {
            name: "notebook-db2-allow-dataset-implicit-copy-db2-to-s3".to_string(),
            template: "implicit-copy-db2-to-s3".to_string(),
            scope: CapabilityScope::Asset,
            arguments: StepArguments::Copy(CopyArgs {
                asset_id: "db2/allow-dataset".to_string(),
                source: store("db2", "jdbc-db2", "table"),
                destination: store("bucket-1", "s3", "parquet"),
                transformations: vec![taxonomy::redact_column("SSN")],
            }),
            placement: Placement::DataResident {
                region: "theshire".to_string(),
            },
            allowed_clusters: None,
            api: None,
        };
        let read = FlowStep {
            name: "notebook-arrow-flight".to_string(),
            template: "arrow-flight".to_string(),
            scope: CapabilityScope::Workload,
            arguments: StepArguments::Read {
                assets: vec![ReadArgs {
                    asset_id: "s3/allow-dataset".to_string(),
                    source: store("s3", "s3", "parquet"),
                    transformations: Vec::new(),
                }],
            },
            placement: Placement::Workload,
            allowed_clusters: None,
            api: Some(read_api),
        };
        let chart = ChartSpec {
            name: "charts/module".to_string(),
            values: BTreeMap::new(),
        };
        let templates = BTreeMap::from([
            (
                "arrow-flight".to_string(),
                ComponentTemplate {
                    name: "arrow-flight".to_string(),
                    kind: "Module".to_string(),
                    chart: chart.clone(),
                },
            ),
            (
                "implicit-copy-db2-to-s3".to_string(),
                ComponentTemplate {
                    name: "implicit-copy-db2-to-s3".to_string(),
                    kind: "Module".to_string(),
                    chart,
                },
            ),
        ]);

        ExecutionPlan {
            app_uuid: "8c0a3c2e-3b7e-4a55-9d8c-0d5d9f2b6d11".to_string(),
            assets: vec!["s3/allow-dataset".to_string(), "db2/allow-dataset".to_string()],
            units: BTreeMap::from([(
                "thegreendragon".to_string(),
                ExecutionUnit {
                    cluster: "thegreendragon".to_string(),
                    entrypoint: "notebook-arrow-flight".to_string(),
                    flow: DataFlow {
                        name: "notebook".to_string(),
                        steps: vec![copy, read],
                    },
                    templates,
                },
            )]),
        }
    }

    #[test]
    fn execution_plan_serialization_validates_against_schema() {
        let instance = serde_json::to_value(sample_plan()).expect("plan must serialize");
        let schema: serde_json::Value =
            serde_json::from_str(include_str!("../../../schemas/ExecutionPlan.schema.json"))
                .expect("schema must parse");

        let validator = jsonschema::draft202012::options()
            .build(&schema)
            .expect("schema must compile");

        if !validator.is_valid(&instance) {
            let mut msgs = Vec::new();
            for (idx, err) in validator.iter_errors(&instance).take(20).enumerate() {
                msgs.push(format!("{}: {}", idx + 1, err));
            }
            panic!("execution plan did not validate: {}", msgs.join("; "));
        }
    }

    #[test]
    fn plan_steps_are_found_per_asset() {
        let plan = sample_plan();
        assert!(plan.covers("db2/allow-dataset"));
        let flows: Vec<FlowType> = plan
            .steps_for_asset("db2/allow-dataset")
            .map(FlowStep::flow)
            .collect();
        assert_eq!(flows, vec![FlowType::Copy]);
        assert_eq!(plan.steps().count(), 2);
    }
}
