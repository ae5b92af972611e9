//! Application convergence.
//!
//! One pass reads the application, plans every requested asset, stores the
//! resulting execution plan and writes the observed state back. Per-asset
//! failures become asset conditions; anything else aborts the pass without
//! touching the status, and the controller retries it.

use crate::audit::Auditor;
use crate::catalog::{CatalogClient, CatalogError};
use crate::cluster::ClusterLister;
use crate::controller::{Action, Reconcile};
use crate::error::ReconcileError;
use crate::evaluator::{ConfigEvaluator, EvaluationInput};
use crate::plans::PlanResource;
use crate::registry::ModuleRegistry;
use crate::store::{Store, Versioned};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use weir_core::application::validate;
use weir_core::config::ControllerConfig;
use weir_core::{
    Application, ApplicationSpec, AssetCondition, AssetRequest, AssetState, CatalogRegistration,
    Cluster, DataContext, EndpointSpec, ErrorReason, ExecutionPlan, GovernanceAction, Phase,
    Resource, ResourceKey, ResourceReference, StepArguments, Usage, WeirConfig,
};
use weir_planner::{
    AssetPlan, AssignError, ClusterAssigner, FlowPlanner, ModuleCapabilityIndex, OwnerRef,
    PlanBuilder, PlanningError, RequiredActions, StorageAllocator, StorageError, StoreRef,
};
use weir_policy::{AccessOperation, OperationType, PolicyClient, PolicyRequest};

/// External services a pass talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogClient>,
    pub policy: Arc<dyn PolicyClient>,
    pub storage: Arc<dyn StorageAllocator>,
    pub clusters: Arc<dyn ClusterLister>,
    pub registry: Arc<dyn ModuleRegistry>,
    pub evaluator: Arc<dyn ConfigEvaluator>,
}

pub struct ApplicationReconciler {
    apps: Arc<dyn Store<Application>>,
    plans: Arc<dyn Store<PlanResource>>,
    collaborators: Collaborators,
    auditor: Auditor,
    controller: ControllerConfig,
    region: Option<String>,
    timeout: Duration,
}

impl ApplicationReconciler {
    pub fn new(
        apps: Arc<dyn Store<Application>>,
        plans: Arc<dyn Store<PlanResource>>,
        collaborators: Collaborators,
        auditor: Auditor,
        config: &WeirConfig,
    ) -> Self {
        Self {
            apps,
            plans,
            collaborators,
            auditor,
            controller: config.controller.clone(),
            region: config.storage.preferred_region().map(str::to_string),
            timeout: config.connectors.timeout(),
        }
    }

    async fn timed<F: Future>(
        &self,
        operation: &'static str,
        fut: F,
    ) -> Result<F::Output, ReconcileError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ReconcileError::Timeout {
                operation,
                after: self.timeout,
            })
    }

    async fn converge(&self, current: Versioned<Application>) -> Result<Action, ReconcileError> {
        let Versioned {
            mut version,
            value: mut original,
        } = current;

        if original.metadata.deletion_requested {
            return self.finalize(version, original).await;
        }

        if !original.metadata.has_finalizer(&self.controller.finalizer) {
            let mut value = original.clone();
            value.metadata.add_finalizer(&self.controller.finalizer);
            let stored = self.apps.update(version, value).await?;
            version = stored.version;
            original = stored.value;
        }

        let mut app = original.clone();
        let action = self.converge_spec(&mut app).await?;
        if app.status != original.status {
            tracing::debug!(phase = ?app.status.phase, ready = app.status.ready, "status changed");
            self.apps.update(version, app).await?;
        }
        Ok(action)
    }

    async fn converge_spec(&self, app: &mut Application) -> Result<Action, ReconcileError> {
        let key = app.key();
        let generation = app.metadata.generation;

        if let Err(errors) = validate(&app.spec) {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            tracing::warn!(error = %message, "invalid application");
            self.delete_plan(&key).await?;
            self.prune_storage(app, &BTreeMap::new()).await?;
            let status = &mut app.status;
            status.valid_application = Some(false);
            status.validated_generation = Some(generation);
            status.error_message = Some(message);
            status.asset_states.clear();
            status.generated = None;
            status.ready = false;
            status.phase = Phase::PartialError;
            status.observed_generation = generation;
            return Ok(Action::Done);
        }
        app.status.valid_application = Some(true);
        app.status.validated_generation = Some(generation);

        if app.spec.data.is_empty() {
            self.delete_plan(&key).await?;
            self.prune_storage(app, &BTreeMap::new()).await?;
            let status = &mut app.status;
            status.asset_states.clear();
            status.generated = None;
            status.error_message = None;
            status.ready = true;
            status.phase = Phase::Ready;
            status.observed_generation = generation;
            return Ok(Action::Done);
        }

        let existing = self.plans.get(&key).await?;
        let fresh = existing.is_some()
            && app
                .status
                .generated
                .as_ref()
                .is_some_and(|g| g.app_version == generation);
        let retry = app
            .status
            .asset_states
            .values()
            .any(|s| s.condition.is_error());

        // Every asset failed terminally for this generation.
        if app.status.observed_generation == generation && app.status.generated.is_none() && !retry {
            return Ok(Action::Done);
        }

        let plan = match existing {
            Some(plan) if fresh && !retry => plan,
            _ => match self.plan_pass(app).await? {
                Some(plan) => plan,
                None => return Ok(self.finish_unplanned(app)),
            },
        };
        self.check_readiness(app, &plan).await
    }

    /// Plans every asset and stores the resulting plan. Returns None when no
    /// plan could be produced.
    async fn plan_pass(
        &self,
        app: &mut Application,
    ) -> Result<Option<Versioned<PlanResource>>, ReconcileError> {
        let key = app.key();
        let generation = app.metadata.generation;

        let modules = self.timed("list modules", self.collaborators.registry.list()).await??;
        let index = ModuleCapabilityIndex::new(modules);
        let clusters = self.timed("list clusters", self.collaborators.clusters.list()).await??;
        tracing::debug!(modules = index.modules().len(), clusters = clusters.len(), "planning");

        let workload = match self.workload_cluster(&app.spec, &clusters) {
            Ok(workload) => workload,
            Err(e) => {
                self.fail_application(app, &e).await?;
                return Ok(None);
            }
        };

        let owner = owner_ref(app);
        let planner = FlowPlanner::new(&index, self.collaborators.storage.as_ref(), &owner)
            .with_region(self.region.as_deref());
        let mut builder = PlanBuilder::new(&app.metadata.name, &index);
        let mut conditions: BTreeMap<String, AssetCondition> = BTreeMap::new();
        let mut allocated: BTreeMap<String, StoreRef> = BTreeMap::new();

        // Denials are terminal for the generation that produced them.
        let settled = app.status.observed_generation == generation;
        for ctx in &app.spec.data {
            let id = &ctx.dataset_id;
            if settled && let Some(denied) = app.status.condition(id).filter(|c| c.is_deny()) {
                tracing::debug!(asset = %id, "denied for this generation, not replanned");
                conditions.insert(id.clone(), denied.clone());
                continue;
            }
            match self.plan_asset(&app.spec, ctx, workload, &planner).await? {
                Ok(plan) => {
                    tracing::debug!(asset = %id, steps = plan.steps.len(), "asset planned");
                    if let Some(store) = &plan.storage {
                        allocated.insert(id.clone(), store.clone());
                    }
                    builder.add(plan);
                    conditions.insert(id.clone(), AssetCondition::Pending);
                }
                Err(condition) => {
                    let message = condition.message().unwrap_or_default();
                    if app.status.condition(id) != Some(&condition) {
                        if condition.is_deny() {
                            self.auditor.asset_denied(&key, id, message);
                        } else {
                            self.auditor.asset_errored(&key, id, message);
                        }
                    }
                    tracing::info!(asset = %id, condition = %message, "asset not planned");
                    conditions.insert(id.clone(), condition);
                }
            }
        }

        let flow = builder.finish();
        let endpoints = flow.endpoints();

        if flow.steps.is_empty() {
            self.delete_plan(&key).await?;
            self.prune_storage(app, &allocated).await?;
            self.record_planned(app, conditions, &allocated, &endpoints, None);
            return Ok(None);
        }

        let assignment = match ClusterAssigner::new(workload, &clusters).assign(flow.steps.clone()) {
            Ok(assignment) => assignment,
            Err(e) => {
                tracing::warn!(error = %e, "cluster assignment failed");
                for condition in conditions.values_mut().filter(|c| **c == AssetCondition::Pending) {
                    *condition = AssetCondition::error(Some(e.reason()), e.to_string());
                }
                self.delete_plan(&key).await?;
                self.prune_storage(app, &BTreeMap::new()).await?;
                self.record_planned(app, conditions, &BTreeMap::new(), &BTreeMap::new(), None);
                app.status.error_message = Some(e.to_string());
                return Ok(None);
            }
        };

        let clusters_used = assignment.len();
        let execution = flow.into_execution_plan(app.metadata.uid.clone(), assignment);
        let assets = execution.assets.clone();
        let (stored, changed) = self.upsert_plan(&key, execution).await?;
        if changed {
            tracing::info!(assets = assets.len(), clusters = clusters_used, "plan generated");
            self.auditor.plan_generated(&key, &assets, clusters_used);
        }

        self.prune_storage(app, &allocated).await?;
        for (asset, store) in &allocated {
            let known = app
                .status
                .provisioned_storage
                .get(asset)
                .is_some_and(|p| p.dataset_ref == store.name);
            if !known {
                self.auditor.storage_allocated(&key, asset, &store.name, &store.region);
            }
        }

        let reference = ResourceReference {
            kind: PlanResource::KIND.to_string(),
            name: stored.value.metadata.name.clone(),
            namespace: stored.value.metadata.namespace.clone(),
            app_version: generation,
        };
        self.record_planned(app, conditions, &allocated, &endpoints, Some(reference));
        Ok(Some(stored))
    }

    async fn plan_asset(
        &self,
        spec: &ApplicationSpec,
        ctx: &DataContext,
        workload: Option<&Cluster>,
        planner: &FlowPlanner<'_>,
    ) -> Result<Result<AssetPlan, AssetCondition>, ReconcileError> {
        let id = &ctx.dataset_id;
        let lookup = self
            .timed(
                "catalog lookup",
                self.collaborators
                    .catalog
                    .get_asset_info(id, spec.secret_ref.as_deref()),
            )
            .await?;
        let metadata = match lookup {
            Ok(metadata) => metadata,
            Err(CatalogError::NotFound(_)) => {
                return Ok(Err(AssetCondition::deny(ErrorReason::InvalidAssetId)));
            }
            Err(e) => return Err(e.into()),
        };

        let copy = &ctx.requirements.copy;
        let request = AssetRequest {
            asset_id: id.clone(),
            interface: ctx.requirements.interface.clone(),
            usage: Usage {
                read: spec.has_workload(),
                write: ctx.requirements.write,
                copy: copy.required || copy.catalog.is_some(),
            },
            register_in_catalog: copy.catalog.as_ref().map(|c| c.catalog_id.clone()),
            metadata,
        };

        let mut actions = self.required_actions(spec, &request, workload).await?;
        let input = EvaluationInput {
            app_info: &spec.app_info,
            workload,
            request: &request,
            actions: &actions,
        };
        let decisions = self
            .timed("evaluate config", self.collaborators.evaluator.evaluate(&input))
            .await??;
        if planner.needs_copy(&request, &actions, &decisions) {
            actions.copy = self.copy_actions(spec, &request).await?;
        }

        match self
            .timed("plan asset", planner.plan(&request, &actions, &decisions))
            .await?
        {
            Ok(plan) => Ok(Ok(plan)),
            Err(PlanningError::Storage(e)) => Err(e.into()),
            Err(e) => Ok(Err(condition_for(&e))),
        }
    }

    /// Read and write actions. Copy actions are looked up separately, once a
    /// copy is known to be planned.
    async fn required_actions(
        &self,
        spec: &ApplicationSpec,
        request: &AssetRequest,
        workload: Option<&Cluster>,
    ) -> Result<RequiredActions, ReconcileError> {
        let lookup = |kind: OperationType, destination: &str| {
            policy_request(spec, request, kind, destination)
        };
        let policy = &self.collaborators.policy;
        let mut actions = RequiredActions::default();

        if request.usage.read {
            let destination = workload.map(|c| c.region.as_str()).unwrap_or_default();
            let query = lookup(OperationType::Read, destination);
            actions.read = self.timed("policy lookup", policy.required_actions(&query)).await??;
        }
        if request.usage.write {
            let destination = request.metadata.geography.as_deref().unwrap_or_default();
            let query = lookup(OperationType::Write, destination);
            actions.write = self.timed("policy lookup", policy.required_actions(&query)).await??;
        }
        Ok(actions)
    }

    /// Actions for copying into the preferred region. Without a configured
    /// region the copy cannot be planned, so nothing is looked up.
    async fn copy_actions(
        &self,
        spec: &ApplicationSpec,
        request: &AssetRequest,
    ) -> Result<Vec<GovernanceAction>, ReconcileError> {
        let Some(region) = self.region.as_deref() else {
            return Ok(Vec::new());
        };
        let query = policy_request(spec, request, OperationType::Copy, region);
        Ok(self
            .timed("policy lookup", self.collaborators.policy.required_actions(&query))
            .await??)
    }

    fn workload_cluster<'c>(
        &self,
        spec: &ApplicationSpec,
        clusters: &'c [Cluster],
    ) -> Result<Option<&'c Cluster>, AssignError> {
        if !spec.has_workload() {
            return Ok(None);
        }
        let name = match (&spec.selector.cluster_name, &self.controller.local_cluster) {
            (Some(name), _) | (None, Some(name)) => name,
            (None, None) if clusters.len() == 1 => return Ok(clusters.first()),
            (None, None) => {
                return Err(AssignError::InvalidClusterConfiguration(
                    "the workload cluster is not named and more than one cluster is available"
                        .to_string(),
                ));
            }
        };
        clusters
            .iter()
            .find(|c| &c.name == name)
            .map(Some)
            .ok_or_else(|| {
                AssignError::InvalidClusterConfiguration(format!(
                    "workload cluster '{name}' is not available"
                ))
            })
    }

    async fn fail_application(
        &self,
        app: &mut Application,
        error: &AssignError,
    ) -> Result<(), ReconcileError> {
        tracing::warn!(error = %error, "cannot resolve workload cluster");
        self.delete_plan(&app.key()).await?;
        self.prune_storage(app, &BTreeMap::new()).await?;
        let conditions = app
            .spec
            .data
            .iter()
            .map(|ctx| {
                let condition = AssetCondition::error(Some(error.reason()), error.to_string());
                (ctx.dataset_id.clone(), condition)
            })
            .collect();
        self.record_planned(app, conditions, &BTreeMap::new(), &BTreeMap::new(), None);
        app.status.error_message = Some(error.to_string());
        Ok(())
    }

    /// Replaces asset states, storage and plan reference with the outcome of
    /// a planning pass.
    fn record_planned(
        &self,
        app: &mut Application,
        conditions: BTreeMap<String, AssetCondition>,
        allocated: &BTreeMap<String, StoreRef>,
        endpoints: &BTreeMap<String, EndpointSpec>,
        generated: Option<ResourceReference>,
    ) {
        let status = &mut app.status;
        let previous = std::mem::take(&mut status.asset_states);
        status.asset_states = conditions
            .into_iter()
            .map(|(id, condition)| {
                let planned = condition == AssetCondition::Pending;
                let state = AssetState {
                    endpoint: endpoints.get(&id).filter(|_| planned).cloned(),
                    cataloged_asset: previous.get(&id).and_then(|s| s.cataloged_asset.clone()),
                    condition,
                };
                (id, state)
            })
            .collect();

        let mut provisioned = BTreeMap::new();
        for (asset, store) in allocated {
            let mut entry = store.to_provisioned();
            entry.persistent |= status
                .provisioned_storage
                .get(asset)
                .is_some_and(|p| p.dataset_ref == store.name && p.persistent);
            provisioned.insert(asset.clone(), entry);
        }
        // Persistent stores outlive the plan that created them.
        for (asset, entry) in &status.provisioned_storage {
            if entry.persistent && !provisioned.contains_key(asset) {
                provisioned.insert(asset.clone(), entry.clone());
            }
        }
        status.provisioned_storage = provisioned;
        status.generated = generated;
        status.error_message = None;
    }

    fn finish_unplanned(&self, app: &mut Application) -> Action {
        let status = &mut app.status;
        status.ready = false;
        status.phase = phase_of(status, false);
        status.observed_generation = app.metadata.generation;
        if status.asset_states.values().any(|s| s.condition.is_error()) {
            Action::RequeueAfter(self.controller.requeue_after())
        } else {
            tracing::info!(phase = ?status.phase, "no plan produced");
            Action::Done
        }
    }

    async fn check_readiness(
        &self,
        app: &mut Application,
        plan: &Versioned<PlanResource>,
    ) -> Result<Action, ReconcileError> {
        let key = app.key();
        let plan_ready = plan.value.is_ready();
        let plan_error = plan.value.current_error().map(str::to_string);
        let mut storage_pending = false;
        let mut registration_failed = false;

        let data = app.spec.data.clone();
        for ctx in &data {
            let id = &ctx.dataset_id;
            let planned = app
                .status
                .condition(id)
                .is_some_and(|c| *c == AssetCondition::Pending || c.is_ready());
            if !planned {
                continue;
            }
            if let Some(error) = &plan_error {
                let condition = AssetCondition::error(None, format!("deployment failed: {error}"));
                app.status.set_condition(id, condition);
                continue;
            }

            if let Some(provisioned) = app.status.provisioned_storage.get(id) {
                let name = provisioned.dataset_ref.clone();
                let storage = self
                    .timed("storage status", self.collaborators.storage.status(&name))
                    .await??;
                if let Some(error) = storage.error {
                    app.status.set_condition(id, AssetCondition::error(None, error));
                    continue;
                }
                if !storage.provisioned {
                    storage_pending = true;
                    app.status.set_condition(id, AssetCondition::Pending);
                    continue;
                }
            }
            if !plan_ready {
                app.status.set_condition(id, AssetCondition::Pending);
                continue;
            }

            if let Some(registration) = &ctx.requirements.copy.catalog
                && app
                    .status
                    .asset_states
                    .get(id)
                    .is_none_or(|s| s.cataloged_asset.is_none())
            {
                match self.register(app, &plan.value.spec, id, registration).await {
                    Ok(cataloged) => {
                        tracing::info!(asset = %id, cataloged = %cataloged, "copy registered in catalog");
                        self.auditor.asset_registered(&key, id, &cataloged);
                        if let Some(state) = app.status.asset_states.get_mut(id) {
                            state.cataloged_asset = Some(cataloged);
                        }
                    }
                    Err(message) => {
                        tracing::warn!(asset = %id, error = %message, "catalog registration failed");
                        registration_failed = true;
                        app.status.set_condition(id, AssetCondition::error(None, message));
                        continue;
                    }
                }
            }
            app.status.set_condition(id, AssetCondition::Ready);
        }

        let status = &mut app.status;
        status.ready = !status.asset_states.is_empty()
            && status.asset_states.values().all(|s| s.condition.is_ready());
        status.phase = phase_of(status, storage_pending);
        status.observed_generation = app.metadata.generation;

        let pending = status
            .asset_states
            .values()
            .any(|s| s.condition == AssetCondition::Pending);
        let errored = status.asset_states.values().any(|s| s.condition.is_error());
        let action = if status.ready {
            Action::Done
        } else if storage_pending {
            Action::RequeueAfter(self.controller.storage_requeue_after())
        } else if registration_failed {
            Action::RequeueAfter(self.controller.error_backoff())
        } else if pending || errored {
            Action::RequeueAfter(self.controller.requeue_after())
        } else {
            Action::Done
        };
        Ok(action)
    }

    /// Marks the copy of `asset` persistent and registers it. Failures are
    /// reported as a message and retried on a later pass.
    async fn register(
        &self,
        app: &mut Application,
        plan: &ExecutionPlan,
        asset: &str,
        registration: &CatalogRegistration,
    ) -> Result<String, String> {
        let store = plan
            .steps_for_asset(asset)
            .find_map(|step| match &step.arguments {
                StepArguments::Copy(args) => Some(args.destination.clone()),
                _ => None,
            })
            .ok_or_else(|| format!("asset '{asset}' has no copy to register"))?;

        self.timed(
            "storage persist",
            self.collaborators.storage.set_persistent(&store.name, true),
        )
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;
        if let Some(entry) = app.status.provisioned_storage.get_mut(asset) {
            entry.persistent = true;
        }

        self.timed(
            "catalog registration",
            self.collaborators
                .catalog
                .register_asset(&registration.catalog_id, asset, &store),
        )
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
    }

    /// Releases every non-persistent store of `app` that `keep` does not reference.
    async fn prune_storage(
        &self,
        app: &mut Application,
        keep: &BTreeMap<String, StoreRef>,
    ) -> Result<(), ReconcileError> {
        let key = app.key();
        let owner = owner_ref(app);
        let owned = self
            .timed("list storage", self.collaborators.storage.owned_by(&owner))
            .await??;
        let kept: HashSet<&str> = keep.values().map(|s| s.name.as_str()).collect();

        for store in owned {
            if store.persistent || kept.contains(store.name.as_str()) {
                continue;
            }
            self.release(&key, &store.name).await?;
        }
        app.status
            .provisioned_storage
            .retain(|asset, entry| entry.persistent || keep.contains_key(asset));
        Ok(())
    }

    async fn release(&self, key: &ResourceKey, name: &str) -> Result<(), ReconcileError> {
        match self
            .timed("storage delete", self.collaborators.storage.delete(name))
            .await?
        {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(store = %name, "storage released");
        self.auditor.storage_released(key, name);
        Ok(())
    }

    async fn upsert_plan(
        &self,
        key: &ResourceKey,
        spec: ExecutionPlan,
    ) -> Result<(Versioned<PlanResource>, bool), ReconcileError> {
        match self.plans.get(key).await? {
            Some(existing) if existing.value.spec == spec => Ok((existing, false)),
            Some(existing) => {
                let mut value = existing.value;
                value.spec = spec;
                Ok((self.plans.update(existing.version, value).await?, true))
            }
            None => {
                let plan = PlanResource::for_application(key, spec);
                Ok((self.plans.create(plan).await?, true))
            }
        }
    }

    async fn delete_plan(&self, key: &ResourceKey) -> Result<(), ReconcileError> {
        if self.plans.get(key).await?.is_none() {
            return Ok(());
        }
        match self.plans.delete(key).await {
            Ok(()) => {
                tracing::info!("plan deleted");
                self.auditor.plan_deleted(key);
                Ok(())
            }
            Err(crate::store::StoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn finalize(
        &self,
        version: u64,
        mut app: Application,
    ) -> Result<Action, ReconcileError> {
        if !app.metadata.has_finalizer(&self.controller.finalizer) {
            return Ok(Action::Done);
        }
        let key = app.key();
        tracing::info!("finalizing application");
        app.status.phase = Phase::Deleting;

        self.delete_plan(&key).await?;
        self.prune_storage(&mut app, &BTreeMap::new()).await?;

        app.metadata.remove_finalizer(&self.controller.finalizer);
        self.apps.update(version, app).await?;
        self.auditor.application_deleted(&key);
        Ok(Action::Done)
    }
}

#[async_trait]
impl Reconcile for ApplicationReconciler {
    async fn reconcile(&self, key: &ResourceKey) -> Result<Action, ReconcileError> {
        let Some(current) = self.apps.get(key).await? else {
            tracing::debug!(app = %key, "application no longer exists");
            return Ok(Action::Done);
        };
        let span = tracing::info_span!(
            "reconcile",
            app = %key,
            uuid = %current.value.metadata.uid,
            generation = current.value.metadata.generation
        );
        self.converge(current).instrument(span).await
    }
}

fn policy_request(
    spec: &ApplicationSpec,
    request: &AssetRequest,
    kind: OperationType,
    destination: &str,
) -> PolicyRequest {
    PolicyRequest::new(&request.asset_id, AccessOperation::new(kind, destination))
        .with_context(spec.app_info.clone())
        .with_credentials(spec.secret_ref.clone())
}

fn owner_ref(app: &Application) -> OwnerRef {
    OwnerRef {
        namespace: app.metadata.namespace.clone(),
        name: app.metadata.name.clone(),
        uid: app.metadata.uid.clone(),
    }
}

fn condition_for(error: &PlanningError) -> AssetCondition {
    match error.reason() {
        Some(reason) => AssetCondition::from_reason(reason, error.detail().as_deref()),
        None => AssetCondition::error(None, error.to_string()),
    }
}

fn phase_of(status: &weir_core::ApplicationStatus, storage_pending: bool) -> Phase {
    let conditions: Vec<&AssetCondition> = status.asset_states.values().map(|s| &s.condition).collect();
    if conditions.iter().all(|c| c.is_ready()) {
        Phase::Ready
    } else if conditions.iter().any(|c| **c == AssetCondition::Pending) {
        if storage_pending {
            Phase::Provisioning
        } else {
            Phase::Deployed
        }
    } else if conditions.iter().all(|c| c.is_deny()) {
        Phase::Denied
    } else {
        Phase::PartialError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_core::ApplicationStatus;

    fn status(conditions: &[AssetCondition]) -> ApplicationStatus {
        let mut status = ApplicationStatus::default();
        for (n, condition) in conditions.iter().enumerate() {
            status.set_condition(&format!("asset-{n}"), condition.clone());
        }
        status
    }

    #[test]
    fn phase_reflects_asset_conditions() {
        let deny = AssetCondition::deny(ErrorReason::ReadAccessDenied);
        let error = AssetCondition::error(None, "boom");

        assert_eq!(phase_of(&status(&[AssetCondition::Ready]), false), Phase::Ready);
        assert_eq!(
            phase_of(&status(&[AssetCondition::Ready, AssetCondition::Pending]), true),
            Phase::Provisioning
        );
        assert_eq!(
            phase_of(&status(&[deny.clone(), AssetCondition::Pending]), false),
            Phase::Deployed
        );
        assert_eq!(phase_of(&status(&[deny.clone(), deny.clone()]), false), Phase::Denied);
        assert_eq!(phase_of(&status(&[deny, error]), false), Phase::PartialError);
    }

    #[test]
    fn planning_errors_map_to_conditions() {
        let denied = condition_for(&PlanningError::Denied(ErrorReason::CopyNotAllowed));
        assert_eq!(denied, AssetCondition::deny(ErrorReason::CopyNotAllowed));

        let missing = condition_for(&PlanningError::module_not_found(
            weir_core::FlowType::Read,
            "nothing reads jdbc-db2/table",
        ));
        assert!(missing.is_error());
        assert_eq!(
            missing.message(),
            Some("ModuleNotFound: read (nothing reads jdbc-db2/table)")
        );

        let region = condition_for(&PlanningError::NoStorageRegion("db2/x".to_string()));
        assert_eq!(region.reason(), None);
    }
}
