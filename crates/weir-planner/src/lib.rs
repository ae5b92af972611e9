//! Weir data-path planning.
//!
//! - [`ModuleCapabilityIndex`] finds modules whose capabilities satisfy a query
//! - [`FlowPlanner`] builds the steps serving one asset, planning implicit
//!   copies into allocated storage when no direct path exists
//! - [`PlanBuilder`] names the steps and consolidates shared ones
//! - [`ClusterAssigner`] partitions the steps into per-cluster units

pub mod assign;
pub mod builder;
pub mod decisions;
pub mod error;
pub mod flow;
pub mod index;
pub mod storage;

pub use assign::ClusterAssigner;
pub use builder::{PlanBuilder, PlannedFlow};
pub use decisions::{ConfigDecisions, DeployDecision, FlowDecision};
pub use error::{AssignError, PlanningError, StorageError};
pub use flow::{AssetPlan, FlowPlanner, PlannedStep, RequiredActions};
pub use index::{CapabilityMatch, CapabilityQuery, ModuleCapabilityIndex};
pub use storage::{OwnerRef, StorageAllocator, StorageStatus, StoreRef};
