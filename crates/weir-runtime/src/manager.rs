//! Wires the stores, both reconcilers and their controllers together.

use crate::audit::{AuditSink, Auditor};
use crate::controller::Controller;
use crate::deployer::Deployer;
use crate::plan_reconciler::PlanReconciler;
use crate::plans::{PlanResource, owner_of};
use crate::reconciler::{ApplicationReconciler, Collaborators};
use crate::store::{MemoryStore, Store, StoreError, WatchEvent};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use weir_core::{Application, Resource, WeirConfig};

pub struct Manager {
    config: WeirConfig,
    apps: Arc<MemoryStore<Application>>,
    plans: Arc<MemoryStore<PlanResource>>,
    applications: Arc<ApplicationReconciler>,
    deployments: Arc<PlanReconciler>,
}

impl Manager {
    pub fn new(
        config: WeirConfig,
        collaborators: Collaborators,
        deployer: Arc<dyn Deployer>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let apps = Arc::new(MemoryStore::<Application>::new());
        let plans = Arc::new(MemoryStore::<PlanResource>::new());
        let auditor = Auditor::new(config.audit.clone(), audit);
        let applications = Arc::new(ApplicationReconciler::new(
            apps.clone(),
            plans.clone(),
            collaborators,
            auditor,
            &config,
        ));
        let deployments = Arc::new(PlanReconciler::new(plans.clone(), deployer, &config));
        Self {
            config,
            apps,
            plans,
            applications,
            deployments,
        }
    }

    pub fn applications(&self) -> Arc<MemoryStore<Application>> {
        self.apps.clone()
    }

    pub fn plans(&self) -> Arc<MemoryStore<PlanResource>> {
        self.plans.clone()
    }

    pub fn application_reconciler(&self) -> Arc<ApplicationReconciler> {
        self.applications.clone()
    }

    pub fn plan_reconciler(&self) -> Arc<PlanReconciler> {
        self.deployments.clone()
    }

    /// Runs both controllers until `shutdown` resolves, then lets the passes
    /// in flight finish.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<(), StoreError> {
        let controller = &self.config.controller;
        let (stop, stopped) = watch::channel(false);

        let apps = Controller::new(
            "application",
            self.applications.clone(),
            controller.max_concurrent_reconciles,
            controller.error_backoff(),
        );
        apps.watch(self.apps.watch(), |event| match event {
            WatchEvent::Applied { key, .. } => Some(key.clone()),
            WatchEvent::Deleted { .. } => None,
        });
        // Plan status changes wake the owning application.
        apps.watch(self.plans.watch(), |event| owner_of(event.labels()));

        let deployments = Controller::new(
            "plan",
            self.deployments.clone(),
            controller.max_concurrent_reconciles,
            controller.error_backoff(),
        );
        deployments.watch(self.plans.watch(), |event| Some(event.key().clone()));

        // Subscribed first, so nothing created meanwhile is missed.
        let app_queue = apps.handle();
        for app in self.apps.list().await? {
            app_queue.enqueue(app.value.key());
        }
        let plan_queue = deployments.handle();
        for plan in self.plans.list().await? {
            plan_queue.enqueue(plan.value.key());
        }

        let apps_task = tokio::spawn(apps.run(stopped.clone()));
        let plans_task = tokio::spawn(deployments.run(stopped));
        tracing::info!("manager started");

        shutdown.await;
        tracing::info!("manager stopping");
        let _ = stop.send(true);
        for (name, task) in [("application", apps_task), ("plan", plans_task)] {
            if let Err(e) = task.await {
                tracing::error!(controller = name, error = %e, "controller task failed");
            }
        }
        Ok(())
    }
}
