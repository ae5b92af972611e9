//! The application resource: a workload's request for governed access to a
//! set of assets.

use crate::resource::{ObjectMeta, Resource};
use crate::status::ApplicationStatus;
use crate::taxonomy::{Interface, Properties};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSelector {
    /// Cluster the workload runs on. Defaults to the local cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

impl WorkloadSelector {
    pub fn is_empty(&self) -> bool {
        self.cluster_name.is_none() && self.match_labels.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRegistration {
    pub catalog_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRequirements {
    /// Copy the asset even when a direct path exists.
    #[serde(default)]
    pub required: bool,
    /// Register the copy into this catalog once the plan is ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<CatalogRegistration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequirements {
    pub interface: Interface,
    #[serde(default)]
    pub copy: CopyRequirements,
    /// The workload writes to this asset.
    #[serde(default)]
    pub write: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataContext {
    pub dataset_id: String,
    pub requirements: DataRequirements,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    #[serde(default, skip_serializing_if = "WorkloadSelector::is_empty")]
    pub selector: WorkloadSelector,
    /// Workload properties passed to policy and configuration evaluation.
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub app_info: Properties,
    /// Secret holding credentials used to query the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,
    #[serde(default)]
    pub data: Vec<DataContext>,
}

impl ApplicationSpec {
    /// Whether a workload consumes the data. Copy-only applications have none.
    pub fn has_workload(&self) -> bool {
        !self.selector.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub metadata: ObjectMeta,
    pub spec: ApplicationSpec,
    #[serde(default)]
    pub status: ApplicationStatus,
}

impl Application {
    pub fn new(metadata: ObjectMeta, spec: ApplicationSpec) -> Self {
        Self {
            metadata,
            spec,
            status: ApplicationStatus::default(),
        }
    }
}

impl Resource for Application {
    const KIND: &'static str = "Application";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn spec_eq(&self, other: &Self) -> bool {
        self.spec == other.spec
    }
}

/// Structural problems that make an application unplannable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("data entry {index} has an empty dataset id")]
    EmptyDatasetId { index: usize },

    #[error("dataset '{0}' is requested more than once")]
    DuplicateDatasetId(String),

    #[error("dataset '{dataset}' requests an incomplete interface '{interface}'")]
    IncompleteInterface { dataset: String, interface: Interface },

    #[error("dataset '{0}' requests catalog registration without a catalog id")]
    MissingCatalogId(String),

    #[error("dataset '{0}' requests nothing: no workload reads it, and no copy or write is requested")]
    NoUsage(String),
}

/// Validates an application spec before any collaborator is consulted.
/// Returns every problem found, in declaration order.
pub fn validate(spec: &ApplicationSpec) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, ctx) in spec.data.iter().enumerate() {
        if ctx.dataset_id.trim().is_empty() {
            errors.push(ValidationError::EmptyDatasetId { index });
            continue;
        }
        if !seen.insert(ctx.dataset_id.as_str()) {
            errors.push(ValidationError::DuplicateDatasetId(ctx.dataset_id.clone()));
        }
        if !ctx.requirements.interface.is_complete() {
            errors.push(ValidationError::IncompleteInterface {
                dataset: ctx.dataset_id.clone(),
                interface: ctx.requirements.interface.clone(),
            });
        }
        if let Some(catalog) = &ctx.requirements.copy.catalog
            && catalog.catalog_id.trim().is_empty()
        {
            errors.push(ValidationError::MissingCatalogId(ctx.dataset_id.clone()));
        }
        let copies = ctx.requirements.copy.required || ctx.requirements.copy.catalog.is_some();
        if !spec.has_workload() && !copies && !ctx.requirements.write {
            errors.push(ValidationError::NoUsage(ctx.dataset_id.clone()));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
