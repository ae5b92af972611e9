//! Per-asset data-path planning.
//!
//! For each asset the planner looks for a direct read (or write) path over the
//! asset's native store. When none exists, or a copy is explicitly requested,
//! it plans an implicit copy into newly allocated storage and reads from the
//! copy instead.

use crate::decisions::{ConfigDecisions, DeployDecision};
use crate::error::PlanningError;
use crate::index::{CapabilityMatch, CapabilityQuery, ModuleCapabilityIndex};
use crate::storage::{OwnerRef, StorageAllocator, StoreRef};
use std::collections::BTreeSet;
use weir_core::{
    AssetRequest, CapabilityScope, CopyArgs, DataStore, ErrorReason, FlowType, GovernanceAction,
    Interface, ModuleApi, Placement, ReadArgs, StepArguments, WriteArgs,
};

/// Enforcement actions per operation, as returned by policy. May contain Deny.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequiredActions {
    pub read: Vec<GovernanceAction>,
    pub write: Vec<GovernanceAction>,
    /// Actions for copying into the preferred storage region.
    pub copy: Vec<GovernanceAction>,
}

/// A step before naming and consolidation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub module: String,
    pub scope: CapabilityScope,
    pub arguments: StepArguments,
    pub placement: Placement,
    pub allowed_clusters: Option<BTreeSet<String>>,
    pub api: Option<ModuleApi>,
}

impl PlannedStep {
    pub fn flow(&self) -> FlowType {
        self.arguments.flow()
    }
}

/// Steps for one asset, in dependency order (copy before read).
#[derive(Debug, Clone, PartialEq)]
pub struct AssetPlan {
    pub asset_id: String,
    pub steps: Vec<PlannedStep>,
    /// Storage allocated for an implicit copy.
    pub storage: Option<StoreRef>,
}

struct CopySelection<'m> {
    copy: CapabilityMatch<'m>,
    sink: &'m Interface,
    /// Read actions enforced by the copy module.
    pushed: Vec<GovernanceAction>,
    /// Read actions left for the read module.
    remaining: Vec<GovernanceAction>,
    read: Option<CapabilityMatch<'m>>,
}

/// Plans the steps of a single asset against the module registry, allocating
/// storage for implicit copies.
pub struct FlowPlanner<'a> {
    index: &'a ModuleCapabilityIndex,
    storage: &'a dyn StorageAllocator,
    owner: &'a OwnerRef,
    region: Option<&'a str>,
}

impl<'a> FlowPlanner<'a> {
    pub fn new(
        index: &'a ModuleCapabilityIndex,
        storage: &'a dyn StorageAllocator,
        owner: &'a OwnerRef,
    ) -> Self {
        Self {
            index,
            storage,
            owner,
            region: None,
        }
    }

    /// Region implicit copies are allocated in.
    pub fn with_region(mut self, region: Option<&'a str>) -> Self {
        self.region = region;
        self
    }

    /// Whether planning `request` goes through a copy, so that copy actions
    /// are needed. Requests that fail before the copy decision is made report
    /// false. Copy actions in `actions` are not consulted.
    pub fn needs_copy(
        &self,
        request: &AssetRequest,
        actions: &RequiredActions,
        decisions: &ConfigDecisions,
    ) -> bool {
        let usage = request.usage;
        if !request.metadata.has_valid_store()
            || (usage.read && has_deny(&actions.read))
            || (usage.write && has_deny(&actions.write))
        {
            return false;
        }
        if usage.copy || decisions.copy.deploy == DeployDecision::Required {
            return true;
        }
        usage.read
            && self
                .find_read(
                    &request.metadata.store.interface,
                    &request.interface,
                    &actions.read,
                    decisions,
                )
                .is_none()
    }

    /// Picks the steps for `request`: a write step when writing, then either a
    /// direct read or a copy into allocated storage followed by a read of the
    /// copy. Denials and configuration bans are checked before any module
    /// search.
    pub async fn plan(
        &self,
        request: &AssetRequest,
        actions: &RequiredActions,
        decisions: &ConfigDecisions,
    ) -> Result<AssetPlan, PlanningError> {
        let store = &request.metadata.store;
        if !request.metadata.has_valid_store() {
            return Err(PlanningError::InvalidDataStore {
                store: store.name.clone(),
                interface: store.interface.to_string(),
            });
        }

        let usage = request.usage;
        if usage.read && has_deny(&actions.read) {
            return Err(PlanningError::Denied(ErrorReason::ReadAccessDenied));
        }
        if usage.write && has_deny(&actions.write) {
            return Err(PlanningError::Denied(ErrorReason::WriteNotAllowed));
        }
        for (flow, needed) in [(FlowType::Read, usage.read), (FlowType::Write, usage.write)] {
            if needed && decisions.flow(flow).is_forbidden() {
                return Err(PlanningError::module_not_found(
                    flow,
                    "deployment is forbidden by configuration",
                ));
            }
        }

        let mut steps = Vec::new();
        if usage.write {
            steps.push(self.write_step(request, &actions.write, decisions)?);
        }

        let force_copy = usage.copy || decisions.copy.deploy == DeployDecision::Required;
        if !force_copy {
            if !usage.read {
                return Ok(AssetPlan {
                    asset_id: request.asset_id.clone(),
                    steps,
                    storage: None,
                });
            }
            if let Some(read) = self.find_read(&store.interface, &request.interface, &actions.read, decisions) {
                tracing::debug!(
                    asset = %request.asset_id,
                    module = %read.module.name,
                    "direct read path found"
                );
                steps.insert(0, read_step(request, read, store.clone(), &actions.read, decisions));
                return Ok(AssetPlan {
                    asset_id: request.asset_id.clone(),
                    steps,
                    storage: None,
                });
            }
        }

        if decisions.copy.is_forbidden() {
            let flow = if usage.copy { FlowType::Copy } else { FlowType::Read };
            return Err(PlanningError::module_not_found(
                flow,
                format!(
                    "no direct path for {} and copy is forbidden by configuration",
                    store.interface
                ),
            ));
        }
        if has_deny(&actions.copy) {
            return Err(PlanningError::Denied(ErrorReason::CopyNotAllowed));
        }

        let selection = self.select_copy(request, actions, decisions)?;
        let region = self
            .region
            .ok_or_else(|| PlanningError::NoStorageRegion(request.asset_id.clone()))?;
        let allocated = self
            .storage
            .allocate(region, self.owner, &request.asset_id)
            .await?;
        tracing::debug!(
            asset = %request.asset_id,
            module = %selection.copy.module.name,
            storage = %allocated.name,
            region = %region,
            "implicit copy planned"
        );

        let destination = DataStore {
            name: allocated.name.clone(),
            interface: selection.sink.clone(),
            connection: allocated.connection.clone(),
            credential_ref: allocated.secret_ref.clone(),
        };

        let mut copy_transformations = without_deny(&actions.copy);
        copy_transformations.extend(selection.pushed.iter().cloned());

        let mut planned = vec![PlannedStep {
            module: selection.copy.module.name.clone(),
            scope: selection.copy.capability.scope,
            arguments: StepArguments::Copy(CopyArgs {
                asset_id: request.asset_id.clone(),
                source: store.clone(),
                destination: destination.clone(),
                transformations: copy_transformations,
            }),
            placement: match &request.metadata.geography {
                Some(region) => Placement::DataResident {
                    region: region.clone(),
                },
                None => Placement::Any,
            },
            allowed_clusters: decisions.copy.clusters.clone(),
            api: None,
        }];
        if let Some(read) = selection.read {
            planned.push(read_step(request, read, destination, &selection.remaining, decisions));
        }
        planned.extend(steps);

        Ok(AssetPlan {
            asset_id: request.asset_id.clone(),
            steps: planned,
            storage: Some(allocated),
        })
    }

    fn find_read(
        &self,
        source: &Interface,
        api: &Interface,
        actions: &[GovernanceAction],
        decisions: &ConfigDecisions,
    ) -> Option<CapabilityMatch<'a>> {
        let query = CapabilityQuery::new(FlowType::Read)
            .source(source)
            .api(api)
            .actions(action_ids(actions))
            .allowed_modules(decisions.read.modules.as_ref());
        self.index.find_matches(&query).into_iter().next()
    }

    fn write_step(
        &self,
        request: &AssetRequest,
        actions: &[GovernanceAction],
        decisions: &ConfigDecisions,
    ) -> Result<PlannedStep, PlanningError> {
        let store = &request.metadata.store;
        let query = CapabilityQuery::new(FlowType::Write)
            .sink(&store.interface)
            .api(&request.interface)
            .actions(action_ids(actions))
            .allowed_modules(decisions.write.modules.as_ref());
        let found = self.index.find_matches(&query).into_iter().next().ok_or_else(|| {
            PlanningError::module_not_found(
                FlowType::Write,
                format!(
                    "no write module accepts {} into {}",
                    request.interface, store.interface
                ),
            )
        })?;

        Ok(PlannedStep {
            module: found.module.name.clone(),
            scope: found.capability.scope,
            arguments: StepArguments::Write {
                assets: vec![WriteArgs {
                    asset_id: request.asset_id.clone(),
                    destination: store.clone(),
                    transformations: without_deny(actions),
                }],
            },
            placement: Placement::Workload,
            allowed_clusters: decisions.write.clusters.clone(),
            api: found.capability.api.clone(),
        })
    }

    fn select_copy(
        &self,
        request: &AssetRequest,
        actions: &RequiredActions,
        decisions: &ConfigDecisions,
    ) -> Result<CopySelection<'a>, PlanningError> {
        let native = &request.metadata.store.interface;

        if !request.usage.copy && !self.index.has_flow(FlowType::Copy) {
            return Err(PlanningError::module_not_found(
                FlowType::Read,
                format!(
                    "no read module serves {} as {} and no copy module is registered",
                    native, request.interface
                ),
            ));
        }

        let candidates: Vec<CapabilityMatch<'a>> = self
            .index
            .find_matches(
                &CapabilityQuery::new(FlowType::Copy)
                    .source(native)
                    .allowed_modules(decisions.copy.modules.as_ref()),
            )
            .into_iter()
            .filter(|c| c.interfaces.sink.is_some())
            .collect();
        if candidates.is_empty() {
            return Err(PlanningError::module_not_found(
                FlowType::Copy,
                format!("no copy module reads from {native}"),
            ));
        }

        let copy_ids = action_ids(&actions.copy);
        let covering: Vec<CapabilityMatch<'a>> = candidates
            .into_iter()
            .filter(|c| copy_ids.iter().all(|id| c.capability.supports_action(id)))
            .collect();
        if covering.is_empty() {
            return Err(PlanningError::module_not_found(
                FlowType::Copy,
                format!(
                    "no copy module from {} supports actions [{}]",
                    native,
                    copy_ids.iter().cloned().collect::<Vec<_>>().join(", ")
                ),
            ));
        }

        if !request.usage.read {
            let chosen = covering
                .iter()
                .find(|c| c.interfaces.sink.as_ref() == Some(&request.interface))
                .or_else(|| covering.first())
                .copied();
            if let Some(copy) = chosen
                && let Some(sink) = copy.interfaces.sink.as_ref()
            {
                return Ok(CopySelection {
                    copy,
                    sink,
                    pushed: Vec::new(),
                    remaining: Vec::new(),
                    read: None,
                });
            }
        }

        let read_actions = without_deny(&actions.read);
        for copy in covering {
            let Some(sink) = copy.interfaces.sink.as_ref() else {
                continue;
            };
            let (pushed, remaining): (Vec<GovernanceAction>, Vec<GovernanceAction>) = read_actions
                .iter()
                .cloned()
                .partition(|a| copy.capability.supports_action(a.identifier()));
            if let Some(read) = self.find_read(sink, &request.interface, &remaining, decisions) {
                return Ok(CopySelection {
                    copy,
                    sink,
                    pushed,
                    remaining,
                    read: Some(read),
                });
            }
        }

        Err(PlanningError::module_not_found(
            FlowType::Read,
            format!(
                "no read module serves {} after copying from {}",
                request.interface, native
            ),
        ))
    }
}

fn read_step(
    request: &AssetRequest,
    found: CapabilityMatch<'_>,
    source: DataStore,
    actions: &[GovernanceAction],
    decisions: &ConfigDecisions,
) -> PlannedStep {
    PlannedStep {
        module: found.module.name.clone(),
        scope: found.capability.scope,
        arguments: StepArguments::Read {
            assets: vec![ReadArgs {
                asset_id: request.asset_id.clone(),
                source,
                transformations: without_deny(actions),
            }],
        },
        placement: Placement::Workload,
        allowed_clusters: decisions.read.clusters.clone(),
        api: found.capability.api.clone(),
    }
}

fn has_deny(actions: &[GovernanceAction]) -> bool {
    actions.iter().any(GovernanceAction::is_deny)
}

fn without_deny(actions: &[GovernanceAction]) -> Vec<GovernanceAction> {
    actions.iter().filter(|a| !a.is_deny()).cloned().collect()
}

fn action_ids(actions: &[GovernanceAction]) -> BTreeSet<String> {
    actions
        .iter()
        .filter(|a| !a.is_deny())
        .map(|a| a.identifier().to_string())
        .collect()
}
