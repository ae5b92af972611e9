//! End-to-end reconcile scenarios against the fixture world.
//!
//! Passes are driven by hand (application pass, then plan pass) so that every
//! intermediate state is deterministic. One test runs the full manager.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use weir_core::{
    Application, ApplicationSpec, AssetCondition, CatalogRegistration, CopyRequirements,
    DataContext, DataRequirements, ErrorReason, FlowType, Interface, ObjectMeta, Phase, Resource,
    ResourceKey, WeirConfig, WorkloadSelector,
};
use weir_policy::{OperationType, PolicyClient, PolicyDecisions, PolicyError, PolicyRequest};
use weir_runtime::fixtures::{self, Fixtures};
use weir_runtime::{
    Action, ApplicationReconciler, AuditEventType, Auditor, MemoryAuditSink, MemoryDeployer,
    MemoryStore, Manager, PlanReconciler, PlanResource, Reconcile, Store,
};

// ============================================================================
// Fixtures
// ============================================================================

fn request(id: &str) -> DataContext {
    DataContext {
        dataset_id: id.to_string(),
        requirements: DataRequirements {
            interface: Interface::new("fybrik-arrow-flight", "arrow"),
            copy: CopyRequirements::default(),
            write: false,
        },
    }
}

fn notebook(data: Vec<DataContext>) -> Application {
    Application::new(
        ObjectMeta::new("default", "notebook"),
        ApplicationSpec {
            selector: WorkloadSelector {
                cluster_name: None,
                match_labels: BTreeMap::from([("app".to_string(), "notebook".to_string())]),
            },
            data,
            ..ApplicationSpec::default()
        },
    )
}

struct World {
    config: WeirConfig,
    fixtures: Fixtures,
    apps: Arc<MemoryStore<Application>>,
    plans: Arc<MemoryStore<PlanResource>>,
    deployer: Arc<MemoryDeployer>,
    audit: Arc<MemoryAuditSink>,
    applications: ApplicationReconciler,
    deployments: PlanReconciler,
}

impl World {
    fn new() -> Self {
        Self::with_policy(|policy| policy)
    }

    /// A world whose policy client is replaced by `wrap` applied to the fixture one.
    fn with_policy(wrap: impl FnOnce(Arc<dyn PolicyClient>) -> Arc<dyn PolicyClient>) -> Self {
        let config = fixtures::config();
        let fixtures = Fixtures::new(&config).expect("fixtures build");
        let mut collaborators = fixtures.collaborators();
        collaborators.policy = wrap(collaborators.policy);
        let apps: Arc<MemoryStore<Application>> = Arc::new(MemoryStore::new());
        let plans: Arc<MemoryStore<PlanResource>> = Arc::new(MemoryStore::new());
        let deployer = Arc::new(MemoryDeployer::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let applications = ApplicationReconciler::new(
            apps.clone(),
            plans.clone(),
            collaborators,
            Auditor::new(config.audit.clone(), audit.clone()),
            &config,
        );
        let deployments = PlanReconciler::new(plans.clone(), deployer.clone(), &config);
        Self {
            config,
            fixtures,
            apps,
            plans,
            deployer,
            audit,
            applications,
            deployments,
        }
    }

    async fn submit(&self, app: Application) -> ResourceKey {
        self.apps.create(app).await.expect("application created").value.key()
    }

    /// Alternates application and plan passes until both sides settle.
    async fn converge(&self, key: &ResourceKey) {
        for _ in 0..5 {
            self.applications.reconcile(key).await.expect("application pass");
            self.deployments.reconcile(key).await.expect("plan pass");
        }
    }

    async fn app(&self, key: &ResourceKey) -> Application {
        self.apps
            .get(key)
            .await
            .expect("store readable")
            .expect("application exists")
            .value
    }

    async fn plan(&self, key: &ResourceKey) -> Option<PlanResource> {
        self.plans.get(key).await.expect("store readable").map(|p| p.value)
    }
}

// ============================================================================
// Ready paths
// ============================================================================

#[tokio::test]
async fn direct_read_becomes_ready() {
    let world = World::new();
    let key = world.submit(notebook(vec![request("s3/allow-dataset")])).await;
    world.converge(&key).await;

    let app = world.app(&key).await;
    assert!(app.status.ready);
    assert_eq!(app.status.phase, Phase::Ready);
    assert_eq!(app.status.observed_generation, app.metadata.generation);
    assert_eq!(app.status.valid_application, Some(true));
    assert!(app.metadata.has_finalizer(&world.config.controller.finalizer));

    let state = &app.status.asset_states["s3/allow-dataset"];
    assert_eq!(state.condition, AssetCondition::Ready);
    assert_eq!(
        state.endpoint.as_ref().map(|e| e.hostname.as_str()),
        Some("notebook-arrow-flight-module")
    );

    let generated = app.status.generated.expect("plan referenced");
    assert_eq!(generated.kind, "Plan");
    assert_eq!(generated.app_version, app.metadata.generation);

    let plan = world.plan(&key).await.expect("plan stored");
    assert!(plan.is_ready());
    assert_eq!(plan.spec.app_uuid, app.metadata.uid);
    let clusters: Vec<&str> = plan.spec.units.keys().map(String::as_str).collect();
    assert_eq!(clusters, vec![fixtures::LOCAL_CLUSTER]);
    assert_eq!(
        plan.spec.units[fixtures::LOCAL_CLUSTER].entrypoint,
        "notebook-arrow-flight-module"
    );
    assert_eq!(world.deployer.deployed(&key).await.len(), 1);
    assert_eq!(world.audit.count(AuditEventType::PlanGenerated), 1);
    assert!(world.fixtures.storage.names().await.is_empty());
}

#[tokio::test]
async fn shared_read_serves_copied_and_direct_assets() {
    let world = World::new();
    let key = world
        .submit(notebook(vec![request("db2/allow-dataset"), request("s3/allow-dataset")]))
        .await;
    world.converge(&key).await;

    let app = world.app(&key).await;
    assert!(app.status.ready);

    let plan = world.plan(&key).await.expect("plan stored");
    let unit = &plan.spec.units[fixtures::LOCAL_CLUSTER];
    let names: Vec<&str> = unit.flow.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "notebook-db2-allow-dataset-implicit-copy-db2-to-s3",
            "notebook-arrow-flight-module",
        ]
    );
    assert_eq!(
        unit.flow.steps[1].arguments.asset_ids(),
        vec!["db2/allow-dataset", "s3/allow-dataset"]
    );
    assert_eq!(unit.templates.len(), 2);

    // Only the copied asset needed storage.
    let storage: Vec<&str> = app.status.provisioned_storage.keys().map(String::as_str).collect();
    assert_eq!(storage, vec!["db2/allow-dataset"]);
    let provisioned = &app.status.provisioned_storage["db2/allow-dataset"];
    assert_eq!(provisioned.dataset_ref, "weir-notebook-1");
    assert_eq!(provisioned.region, fixtures::LOCAL_REGION);
    assert!(!provisioned.persistent);
    assert_eq!(world.audit.count(AuditEventType::StorageAllocated), 1);

    let endpoints: Vec<&str> = app
        .status
        .asset_states
        .values()
        .filter_map(|s| s.endpoint.as_ref().map(|e| e.hostname.as_str()))
        .collect();
    assert_eq!(
        endpoints,
        vec!["notebook-arrow-flight-module", "notebook-arrow-flight-module"]
    );
}

#[tokio::test]
async fn empty_request_is_ready_without_a_plan() {
    let world = World::new();
    let key = world.submit(notebook(Vec::new())).await;
    world.converge(&key).await;

    let app = world.app(&key).await;
    assert!(app.status.ready);
    assert_eq!(app.status.phase, Phase::Ready);
    assert!(app.status.generated.is_none());
    assert!(world.plan(&key).await.is_none());
}

#[tokio::test]
async fn spec_changes_regenerate_the_plan() {
    let world = World::new();
    let key = world.submit(notebook(vec![request("s3/allow-dataset")])).await;
    world.converge(&key).await;

    let current = world.apps.get(&key).await.expect("readable").expect("exists");
    let mut changed = current.value.clone();
    changed.spec.data.push(request("db2/allow-dataset"));
    world.apps.update(current.version, changed).await.expect("spec updated");
    world.converge(&key).await;

    let app = world.app(&key).await;
    assert_eq!(app.metadata.generation, 2);
    assert!(app.status.ready);
    assert_eq!(app.status.generated.as_ref().map(|g| g.app_version), Some(2));

    let plan = world.plan(&key).await.expect("plan stored");
    assert_eq!(plan.spec.assets.len(), 2);
    assert_eq!(plan.metadata.generation, 2);
    assert_eq!(world.audit.count(AuditEventType::PlanGenerated), 2);
}

#[tokio::test]
async fn earlier_deployment_errors_do_not_fail_a_new_plan() {
    let world = World::new();
    let key = world.submit(notebook(vec![request("s3/allow-dataset")])).await;
    world.converge(&key).await;

    let stored = world.plans.get(&key).await.expect("readable").expect("plan exists");
    let mut failed = stored.value.clone();
    failed.status.ready = false;
    failed.status.error = Some("thegreendragon: chart not found".to_string());
    world.plans.update(stored.version, failed).await.expect("status written");

    let current = world.apps.get(&key).await.expect("readable").expect("exists");
    let mut changed = current.value.clone();
    changed.spec.data.push(request("db2/allow-dataset"));
    world.apps.update(current.version, changed).await.expect("spec updated");
    world.applications.reconcile(&key).await.expect("application pass");

    let app = world.app(&key).await;
    for id in ["s3/allow-dataset", "db2/allow-dataset"] {
        assert_eq!(app.status.condition(id), Some(&AssetCondition::Pending), "{id}");
    }

    world.converge(&key).await;
    assert!(world.app(&key).await.status.ready);
}

// ============================================================================
// Denials and planning failures
// ============================================================================

#[tokio::test]
async fn denied_asset_is_terminal() {
    let world = World::new();
    let key = world.submit(notebook(vec![request("s3/deny-dataset")])).await;
    world.converge(&key).await;

    let app = world.app(&key).await;
    let condition = app.status.condition("s3/deny-dataset").expect("condition set");
    assert!(condition.is_deny());
    assert_eq!(condition.reason(), Some(&ErrorReason::ReadAccessDenied));
    assert!(condition.message().is_some_and(|m| m.contains("ReadAccessDenied")));
    assert_eq!(app.status.phase, Phase::Denied);
    assert!(!app.status.ready);
    assert!(app.status.generated.is_none());
    assert!(world.plan(&key).await.is_none());

    // Nothing left to do for this generation.
    assert_eq!(world.applications.reconcile(&key).await.expect("pass"), Action::Done);
    assert_eq!(world.audit.count(AuditEventType::AssetDenied), 1);
}

#[tokio::test]
async fn copy_denial_only_matters_when_copying() {
    let world = World::new();
    let key = world
        .submit(notebook(vec![request("s3/deny-on-copy"), request("db2/deny-on-copy")]))
        .await;
    world.converge(&key).await;

    let app = world.app(&key).await;
    assert_eq!(app.status.condition("s3/deny-on-copy"), Some(&AssetCondition::Ready));
    assert_eq!(
        app.status.condition("db2/deny-on-copy"),
        Some(&AssetCondition::deny(ErrorReason::CopyNotAllowed))
    );
    assert_eq!(app.status.phase, Phase::PartialError);
    assert!(!app.status.ready);

    let plan = world.plan(&key).await.expect("partial plan stored");
    assert_eq!(plan.spec.assets, vec!["s3/deny-on-copy".to_string()]);
    assert!(world.fixtures.storage.names().await.is_empty());
}

#[tokio::test]
async fn missing_copy_modules_report_read_and_recover() {
    let world = World::new();
    for name in ["implicit-copy-db2-to-s3", "implicit-copy-kafka-to-s3-stream", "implicit-copy-s3"] {
        assert!(world.fixtures.registry.unregister(name).await);
    }
    let key = world.submit(notebook(vec![request("db2/allow-dataset")])).await;
    world.converge(&key).await;

    let app = world.app(&key).await;
    let condition = app.status.condition("db2/allow-dataset").expect("condition set");
    assert!(condition.is_error());
    assert_eq!(condition.reason(), Some(&ErrorReason::ModuleNotFound(FlowType::Read)));
    assert!(condition.message().is_some_and(|m| m.starts_with("ModuleNotFound: read")));
    assert_eq!(app.status.phase, Phase::PartialError);
    assert_eq!(
        world.applications.reconcile(&key).await.expect("pass"),
        Action::RequeueAfter(world.config.controller.requeue_after())
    );
    // The condition did not change, so it was audited once.
    assert_eq!(world.audit.count(AuditEventType::AssetErrored), 1);

    for module in fixtures::modules() {
        world.fixtures.registry.register(module).await;
    }
    world.converge(&key).await;
    assert!(world.app(&key).await.status.ready);
}

/// Counts the decision requests accepted by `counted` before delegating.
struct CountingPolicy {
    inner: Arc<dyn PolicyClient>,
    counted: fn(&PolicyRequest) -> bool,
    calls: Arc<AtomicUsize>,
}

impl CountingPolicy {
    fn wrap(
        counted: fn(&PolicyRequest) -> bool,
        calls: &Arc<AtomicUsize>,
    ) -> impl FnOnce(Arc<dyn PolicyClient>) -> Arc<dyn PolicyClient> {
        let calls = calls.clone();
        move |inner: Arc<dyn PolicyClient>| -> Arc<dyn PolicyClient> {
            Arc::new(CountingPolicy { inner, counted, calls })
        }
    }
}

#[async_trait]
impl PolicyClient for CountingPolicy {
    fn name(&self) -> &str {
        "counting"
    }

    async fn get_decisions(&self, request: &PolicyRequest) -> Result<PolicyDecisions, PolicyError> {
        if (self.counted)(request) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.get_decisions(request).await
    }
}

#[tokio::test]
async fn denied_assets_are_not_replanned_while_others_retry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let world = World::with_policy(CountingPolicy::wrap(
        |request| request.dataset_id == "s3/deny-dataset",
        &calls,
    ));
    for name in ["implicit-copy-db2-to-s3", "implicit-copy-kafka-to-s3-stream", "implicit-copy-s3"] {
        assert!(world.fixtures.registry.unregister(name).await);
    }
    let key = world
        .submit(notebook(vec![request("s3/deny-dataset"), request("db2/allow-dataset")]))
        .await;

    world.applications.reconcile(&key).await.expect("first pass");
    let app = world.app(&key).await;
    assert!(app.status.condition("s3/deny-dataset").is_some_and(|c| c.is_deny()));
    assert!(app.status.condition("db2/allow-dataset").is_some_and(|c| c.is_error()));
    let after_first = calls.load(Ordering::SeqCst);
    assert!(after_first > 0);

    world.converge(&key).await;
    assert_eq!(calls.load(Ordering::SeqCst), after_first);
    let app = world.app(&key).await;
    assert_eq!(app.metadata.generation, 1);
    let denied = app.status.condition("s3/deny-dataset").expect("condition kept");
    assert_eq!(denied.reason(), Some(&ErrorReason::ReadAccessDenied));
    assert_eq!(world.audit.count(AuditEventType::AssetDenied), 1);

    // The errored asset recovers once copies can be planned; the denial stays.
    for module in fixtures::modules() {
        world.fixtures.registry.register(module).await;
    }
    world.converge(&key).await;
    let app = world.app(&key).await;
    assert!(app.status.condition("db2/allow-dataset").is_some_and(|c| c.is_ready()));
    assert!(app.status.condition("s3/deny-dataset").is_some_and(|c| c.is_deny()));
    assert_eq!(calls.load(Ordering::SeqCst), after_first);
}

#[tokio::test]
async fn copy_decisions_are_requested_only_for_copies() {
    let calls = Arc::new(AtomicUsize::new(0));
    let world = World::with_policy(CountingPolicy::wrap(
        |request| request.operation.kind == OperationType::Copy,
        &calls,
    ));
    let key = world.submit(notebook(vec![request("s3/allow-dataset")])).await;
    world.converge(&key).await;
    assert!(world.app(&key).await.status.ready);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let current = world.apps.get(&key).await.expect("readable").expect("exists");
    let mut changed = current.value.clone();
    changed.spec.data.push(request("db2/allow-dataset"));
    world.apps.update(current.version, changed).await.expect("spec updated");
    world.converge(&key).await;
    assert!(world.app(&key).await.status.ready);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn wrong_copy_module_reports_copy() {
    let world = World::new();
    assert!(world.fixtures.registry.unregister("implicit-copy-db2-to-s3").await);
    let key = world.submit(notebook(vec![request("db2/allow-dataset")])).await;
    world.converge(&key).await;

    let app = world.app(&key).await;
    let condition = app.status.condition("db2/allow-dataset").expect("condition set");
    assert_eq!(condition.reason(), Some(&ErrorReason::ModuleNotFound(FlowType::Copy)));
    assert!(condition.message().is_some_and(|m| m.starts_with("ModuleNotFound: copy")));
    assert!(world.plan(&key).await.is_none());
}

#[tokio::test]
async fn unknown_asset_is_denied() {
    let world = World::new();
    let key = world.submit(notebook(vec![request("nowhere/allow-dataset")])).await;
    world.converge(&key).await;

    let app = world.app(&key).await;
    assert_eq!(
        app.status.condition("nowhere/allow-dataset"),
        Some(&AssetCondition::deny(ErrorReason::InvalidAssetId))
    );
    assert_eq!(app.status.phase, Phase::Denied);
}

#[tokio::test]
async fn invalid_request_is_not_planned() {
    let world = World::new();
    let key = world
        .submit(notebook(vec![request("s3/allow-dataset"), request("s3/allow-dataset")]))
        .await;
    world.converge(&key).await;

    let app = world.app(&key).await;
    assert_eq!(app.status.valid_application, Some(false));
    assert_eq!(app.status.validated_generation, Some(app.metadata.generation));
    assert_eq!(app.status.phase, Phase::PartialError);
    assert!(
        app.status
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("more than once"))
    );
    assert!(world.plan(&key).await.is_none());
}

#[tokio::test]
async fn unknown_workload_cluster_fails_every_asset() {
    let world = World::new();
    let mut app = notebook(vec![request("s3/allow-dataset")]);
    app.spec.selector.cluster_name = Some("mordor".to_string());
    let key = world.submit(app).await;
    world.converge(&key).await;

    let app = world.app(&key).await;
    assert!(app.status.error_message.as_deref().is_some_and(|m| m.contains("mordor")));
    assert_eq!(
        app.status.condition("s3/allow-dataset").and_then(AssetCondition::reason),
        Some(&ErrorReason::InvalidClusterConfiguration)
    );
    assert!(world.plan(&key).await.is_none());
}

// ============================================================================
// Storage lifecycle
// ============================================================================

#[tokio::test]
async fn pending_storage_holds_readiness() {
    let world = World::new();
    world.fixtures.storage.set_provisioned(false);
    let key = world.submit(notebook(vec![request("db2/allow-dataset")])).await;
    world.converge(&key).await;

    let app = world.app(&key).await;
    assert_eq!(app.status.phase, Phase::Provisioning);
    assert_eq!(app.status.condition("db2/allow-dataset"), Some(&AssetCondition::Pending));
    assert_eq!(
        world.applications.reconcile(&key).await.expect("pass"),
        Action::RequeueAfter(world.config.controller.storage_requeue_after())
    );

    world.fixtures.storage.set_provisioned(true);
    world.converge(&key).await;
    assert!(world.app(&key).await.status.ready);
}

#[tokio::test]
async fn registered_copy_survives_deletion() {
    let world = World::new();
    let mut ctx = request("s3/allow-dataset");
    ctx.requirements.copy.catalog = Some(CatalogRegistration {
        catalog_id: "s3-copies".to_string(),
    });
    let key = world.submit(notebook(vec![ctx])).await;
    world.converge(&key).await;

    let app = world.app(&key).await;
    assert!(app.status.ready);
    let state = &app.status.asset_states["s3/allow-dataset"];
    assert_eq!(state.cataloged_asset.as_deref(), Some("s3-copies/weir-notebook-1-copy-1"));
    assert!(world.fixtures.catalog.contains("s3-copies/weir-notebook-1-copy-1").await);
    assert!(app.status.provisioned_storage["s3/allow-dataset"].persistent);
    assert_eq!(world.audit.count(AuditEventType::AssetRegistered), 1);

    world.apps.delete(&key).await.expect("deletion requested");
    world.converge(&key).await;

    assert!(world.apps.get(&key).await.expect("readable").is_none());
    assert!(world.plan(&key).await.is_none());
    assert!(world.deployer.deployed(&key).await.is_empty());
    let kept = world.fixtures.storage.get("weir-notebook-1").await.expect("store kept");
    assert!(kept.persistent);
    assert_eq!(world.audit.count(AuditEventType::StorageReleased), 0);
    assert_eq!(world.audit.count(AuditEventType::ApplicationDeleted), 1);
}

#[tokio::test]
async fn deletion_releases_implicit_copies() {
    let world = World::new();
    let key = world.submit(notebook(vec![request("db2/allow-dataset")])).await;
    world.converge(&key).await;
    assert_eq!(world.fixtures.storage.names().await, vec!["weir-notebook-1".to_string()]);

    world.apps.delete(&key).await.expect("deletion requested");
    world.converge(&key).await;

    assert!(world.apps.get(&key).await.expect("readable").is_none());
    assert!(world.fixtures.storage.names().await.is_empty());
    assert_eq!(world.audit.count(AuditEventType::StorageReleased), 1);
    assert_eq!(world.audit.count(AuditEventType::PlanDeleted), 1);
}

#[tokio::test]
async fn dropped_assets_release_their_storage() {
    let world = World::new();
    let key = world
        .submit(notebook(vec![request("db2/allow-dataset"), request("s3/allow-dataset")]))
        .await;
    world.converge(&key).await;

    let current = world.apps.get(&key).await.expect("readable").expect("exists");
    let mut changed = current.value.clone();
    changed.spec.data.retain(|d| d.dataset_id != "db2/allow-dataset");
    world.apps.update(current.version, changed).await.expect("spec updated");
    world.converge(&key).await;

    let app = world.app(&key).await;
    assert!(app.status.ready);
    assert!(app.status.provisioned_storage.is_empty());
    assert!(world.fixtures.storage.names().await.is_empty());
}

// ============================================================================
// Manager
// ============================================================================

#[tokio::test]
async fn manager_converges_and_cleans_up() {
    let config = fixtures::config();
    let fixtures = Fixtures::new(&config).expect("fixtures build");
    let deployer = Arc::new(MemoryDeployer::new());
    let manager = Arc::new(Manager::new(
        config,
        fixtures.collaborators(),
        deployer.clone(),
        Arc::new(MemoryAuditSink::new()),
    ));

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let running = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .run(async {
                    let _ = stopped.await;
                })
                .await
        })
    };

    let apps = manager.applications();
    let key = apps
        .create(notebook(vec![request("db2/allow-dataset"), request("s3/allow-dataset")]))
        .await
        .expect("created")
        .value
        .key();

    let ready = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(app) = apps.get(&key).await.expect("readable")
                && app.value.status.ready
            {
                return app.value;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("application converged");
    assert_eq!(ready.status.phase, Phase::Ready);
    assert_eq!(deployer.deployed(&key).await.len(), 1);

    apps.delete(&key).await.expect("deletion requested");
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let gone = apps.get(&key).await.expect("readable").is_none();
            if gone && deployer.deployed(&key).await.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("application cleaned up");
    assert!(fixtures.storage.names().await.is_empty());

    stop.send(()).expect("manager listening");
    running.await.expect("manager task").expect("manager ran");
}
