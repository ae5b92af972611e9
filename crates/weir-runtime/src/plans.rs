//! Generated execution plans as stored resources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use weir_core::{ExecutionPlan, ObjectMeta, PlanStatus, Resource, ResourceKey};

pub const APP_NAME_LABEL: &str = "weir.io/app.name";
pub const APP_NAMESPACE_LABEL: &str = "weir.io/app.namespace";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResource {
    pub metadata: ObjectMeta,
    pub spec: ExecutionPlan,
    #[serde(default)]
    pub status: PlanStatus,
}

impl PlanResource {
    /// A plan owned by the application `owner`. It shares the owner's key.
    pub fn for_application(owner: &ResourceKey, spec: ExecutionPlan) -> Self {
        let mut metadata = ObjectMeta::new(&owner.namespace, &owner.name);
        metadata.labels = BTreeMap::from([
            (APP_NAME_LABEL.to_string(), owner.name.clone()),
            (APP_NAMESPACE_LABEL.to_string(), owner.namespace.clone()),
        ]);
        Self {
            metadata,
            spec,
            status: PlanStatus::default(),
        }
    }

    /// Ready once the deployed units report ready for the current spec.
    pub fn is_ready(&self) -> bool {
        self.status.ready && self.status.observed_generation == self.metadata.generation
    }

    /// Deployment error reported for the current spec. Errors left over from
    /// an earlier spec are ignored until the plan loop observes this one.
    pub fn current_error(&self) -> Option<&str> {
        self.status
            .error
            .as_deref()
            .filter(|_| self.status.observed_generation == self.metadata.generation)
    }
}

impl Resource for PlanResource {
    const KIND: &'static str = "Plan";

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

/// The application that owns a plan, from the plan's labels.
pub fn owner_of(labels: &BTreeMap<String, String>) -> Option<ResourceKey> {
    let name = labels.get(APP_NAME_LABEL)?;
    let namespace = labels.get(APP_NAMESPACE_LABEL)?;
    Some(ResourceKey::new(namespace, name))
}
