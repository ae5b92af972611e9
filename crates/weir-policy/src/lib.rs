//! Weir policy decisions.
//!
//! Policy engines answer, per dataset and operation, which governance actions
//! must be enforced. The reserved "Deny" action blocks an operation outright.
//! Decisions from several engines are merged and compacted into one entry
//! per (dataset, operation type, destination) group before they are consumed.

pub mod client;
pub mod decisions;
pub mod error;
pub mod merge;
pub mod mock;
pub mod multi;

pub use client::{AllowAllPolicyClient, PolicyClient, PolicyRequest};
pub use decisions::{
    AccessOperation, ComponentVersion, DatasetDecision, OperationDecision, OperationType,
    PolicyDecisions, UsedPolicy, contains_deny,
};
pub use error::PolicyError;
pub use merge::{compact, merge, merge_compact};
pub use mock::{Handler, Matcher, MockPolicyClient, Rule};
pub use multi::MultiPolicyClient;
