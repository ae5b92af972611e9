//! Pass-level failures.
//!
//! A pass that fails with any of these leaves the resource status untouched
//! and is retried after the controller's error backoff. Per-asset failures
//! never surface here; they become asset conditions.

use crate::catalog::CatalogError;
use crate::store::StoreError;
use std::time::Duration;
use weir_core::ErrorClass;
use weir_planner::StorageError;
use weir_policy::PolicyError;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("collaborator failure: {0:#}")]
    Collaborator(#[from] anyhow::Error),
}

impl ReconcileError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Transient
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::Store(StoreError::Conflict { .. }))
    }
}
