//! Execution plans: the ordered, cluster-assigned steps that realize the
//! data paths of an application.
//!
//! Matches `schemas/ExecutionPlan.schema.json`.

use crate::asset::DataStore;
use crate::module::{CapabilityScope, ChartSpec, FlowType, ModuleApi};
use crate::taxonomy::GovernanceAction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyArgs {
    pub asset_id: String,
    pub source: DataStore,
    pub destination: DataStore,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<GovernanceAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadArgs {
    pub asset_id: String,
    pub source: DataStore,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<GovernanceAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteArgs {
    pub asset_id: String,
    pub destination: DataStore,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<GovernanceAction>,
}

/// Arguments handed to a step, typed by the kind of flow it serves.
/// Read and write steps carry one entry per asset so that shared
/// instances can serve several assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "flow", rename_all = "lowercase")]
pub enum StepArguments {
    Copy(CopyArgs),
    Read { assets: Vec<ReadArgs> },
    Write { assets: Vec<WriteArgs> },
}

impl StepArguments {
    pub fn flow(&self) -> FlowType {
        match self {
            StepArguments::Copy(_) => FlowType::Copy,
            StepArguments::Read { .. } => FlowType::Read,
            StepArguments::Write { .. } => FlowType::Write,
        }
    }

    /// Asset ids served by this step, in argument order.
    pub fn asset_ids(&self) -> Vec<&str> {
        match self {
            StepArguments::Copy(args) => vec![args.asset_id.as_str()],
            StepArguments::Read { assets } => assets.iter().map(|a| a.asset_id.as_str()).collect(),
            StepArguments::Write { assets } => assets.iter().map(|a| a.asset_id.as_str()).collect(),
        }
    }
}

/// Placement constraint of a step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Placement {
    /// Must run on the workload's cluster.
    Workload,
    /// Must run in the region where the data resides.
    DataResident { region: String },
    /// No constraint.
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    pub name: String,
    /// Name of the module (and template) instantiated by this step.
    pub template: String,
    pub scope: CapabilityScope,
    pub arguments: StepArguments,
    pub placement: Placement,
    /// Cluster names this step may be assigned to, when restricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_clusters: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ModuleApi>,
}

impl FlowStep {
    pub fn flow(&self) -> FlowType {
        self.arguments.flow()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentTemplate {
    pub name: String,
    pub kind: String,
    pub chart: ChartSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFlow {
    pub name: String,
    pub steps: Vec<FlowStep>,
}

/// The part of a plan deployed to a single cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionUnit {
    pub cluster: String,
    pub entrypoint: String,
    pub flow: DataFlow,
    pub templates: BTreeMap<String, ComponentTemplate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// Uid of the owning application.
    pub app_uuid: String,
    /// Assets with at least one step in this plan.
    pub assets: Vec<String>,
    /// Cluster name -> unit.
    pub units: BTreeMap<String, ExecutionUnit>,
}

impl ExecutionPlan {
    pub fn steps(&self) -> impl Iterator<Item = &FlowStep> {
        self.units.values().flat_map(|u| u.flow.steps.iter())
    }

    pub fn steps_for_asset<'a>(&'a self, asset_id: &'a str) -> impl Iterator<Item = &'a FlowStep> {
        self.steps()
            .filter(move |s| s.arguments.asset_ids().contains(&asset_id))
    }

    pub fn covers(&self, asset_id: &str) -> bool {
        self.assets.iter().any(|a| a == asset_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitStatus {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Deployment status reported back on a plan resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatus {
    pub observed_generation: u64,
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub units: BTreeMap<String, UnitStatus>,
}
