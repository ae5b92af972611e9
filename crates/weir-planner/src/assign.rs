//! Assignment of flow steps to clusters.

use crate::error::AssignError;
use std::collections::BTreeMap;
use weir_core::{Cluster, FlowStep, Placement};

/// Places flow steps on clusters.
///
/// Workload-placed steps go to the workload cluster. Data-resident steps go to
/// a cluster in the step's region, the workload cluster if it is there. Only
/// clusters the step allows are considered.
pub struct ClusterAssigner<'a> {
    workload: Option<&'a Cluster>,
    available: &'a [Cluster],
}

impl<'a> ClusterAssigner<'a> {
    pub fn new(workload: Option<&'a Cluster>, available: &'a [Cluster]) -> Self {
        Self {
            workload,
            available,
        }
    }

    /// Partitions steps by cluster, preserving their relative order within
    /// each cluster.
    pub fn assign(
        &self,
        steps: Vec<FlowStep>,
    ) -> Result<BTreeMap<String, Vec<FlowStep>>, AssignError> {
        let mut units: BTreeMap<String, Vec<FlowStep>> = BTreeMap::new();
        for step in steps {
            let cluster = self.pick(&step)?;
            tracing::debug!(step = %step.name, cluster = %cluster.name, "step assigned");
            units.entry(cluster.name.clone()).or_default().push(step);
        }
        Ok(units)
    }

    fn pick(&self, step: &FlowStep) -> Result<&'a Cluster, AssignError> {
        let allowed = |c: &&'a Cluster| {
            step.allowed_clusters
                .as_ref()
                .is_none_or(|names| names.contains(&c.name))
        };
        let candidates: Vec<&'a Cluster> = self.available.iter().filter(allowed).collect();
        let workload = self
            .workload
            .and_then(|w| candidates.iter().copied().find(|c| c.name == w.name));

        match &step.placement {
            Placement::Workload if self.workload.is_some() => workload.ok_or_else(|| {
                AssignError::InvalidClusterConfiguration(format!(
                    "step '{}' must run on workload cluster '{}', which is not available",
                    step.name,
                    self.workload.map(|w| w.name.as_str()).unwrap_or_default()
                ))
            }),
            Placement::DataResident { region } => workload
                .filter(|c| &c.region == region)
                .or_else(|| candidates.iter().copied().find(|c| &c.region == region))
                .ok_or_else(|| {
                    AssignError::InvalidClusterConfiguration(format!(
                        "step '{}' must run in region '{}', but no available cluster is there",
                        step.name, region
                    ))
                }),
            _ => workload
                .or_else(|| candidates.first().copied())
                .ok_or_else(|| {
                    AssignError::InvalidClusterConfiguration(format!(
                        "no available cluster can run step '{}'",
                        step.name
                    ))
                }),
        }
    }
}
