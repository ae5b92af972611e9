//! Weir convergence runtime.
//!
//! Applications and the plans generated for them live in versioned stores.
//! Two reconcilers drive them towards their desired state:
//!
//! - [`ApplicationReconciler`] validates a request, plans every asset against
//!   the registered modules, stores the execution plan, allocates storage for
//!   implicit copies and writes the observed state back
//! - [`PlanReconciler`] deploys the units of a plan and reports readiness
//!
//! Each runs under a [`Controller`], a bounded worker pool that never runs
//! two passes for the same key at once. [`Manager`] wires everything up.
//!
//! Collaborators (catalog, policy, storage, cluster inventory, module
//! registry, deployment) sit behind traits. In-memory implementations are
//! provided, and [`fixtures`] seeds them with a small consistent world.

pub mod audit;
pub mod catalog;
pub mod cluster;
pub mod controller;
pub mod deployer;
pub mod error;
pub mod evaluator;
pub mod fixtures;
pub mod manager;
pub mod plan_reconciler;
pub mod plans;
pub mod reconciler;
pub mod registry;
pub mod storage;
pub mod store;

pub use audit::{
    AuditEvent, AuditEventType, AuditSink, Auditor, MemoryAuditSink, NullAuditSink,
    TracingAuditSink,
};
pub use catalog::{CatalogClient, CatalogError, MemoryCatalog};
pub use cluster::{ClusterLister, StaticClusterLister};
pub use controller::{Action, Controller, QueueHandle, Reconcile};
pub use deployer::{Deployer, MemoryDeployer};
pub use error::ReconcileError;
pub use evaluator::{ConfigEvaluator, DefaultConfigEvaluator, EvaluationInput, StaticConfigEvaluator};
pub use manager::Manager;
pub use plan_reconciler::PlanReconciler;
pub use plans::PlanResource;
pub use reconciler::{ApplicationReconciler, Collaborators};
pub use registry::{MemoryModuleRegistry, ModuleRegistry};
pub use storage::MemoryStorageAllocator;
pub use store::{MemoryStore, Store, StoreError, Versioned, WatchEvent};
