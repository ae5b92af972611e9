//! Merging decisions from several engines and compacting them into one
//! entry per (dataset, operation) group.
//!
//! Both functions are pure. Grouping keeps the insertion order of the first
//! occurrence of each key, so identical input always yields identical output.

use crate::decisions::{AccessOperation, DatasetDecision, OperationDecision, PolicyDecisions};
use std::collections::HashMap;
use std::hash::Hash;

/// Concatenates every list of every input, in input order.
pub fn merge<I>(sets: I) -> PolicyDecisions
where
    I: IntoIterator<Item = PolicyDecisions>,
{
    sets.into_iter()
        .fold(PolicyDecisions::default(), |mut acc, set| {
            acc.component_versions.extend(set.component_versions);
            acc.general_decisions.extend(set.general_decisions);
            acc.dataset_decisions.extend(set.dataset_decisions);
            acc
        })
}

/// Groups dataset decisions by dataset id, then every decision list by
/// (operation type, destination), flattening actions and used policies.
pub fn compact(decisions: PolicyDecisions) -> PolicyDecisions {
    let datasets = group_by_first_occurrence(decisions.dataset_decisions, |d| d.dataset_id.clone())
        .into_iter()
        .map(|(dataset_id, group)| DatasetDecision {
            dataset_id,
            decisions: compact_operations(group.into_iter().flat_map(|d| d.decisions)),
        })
        .collect();

    PolicyDecisions {
        component_versions: decisions.component_versions,
        general_decisions: compact_operations(decisions.general_decisions),
        dataset_decisions: datasets,
    }
}

/// Merges then compacts.
pub fn merge_compact<I>(sets: I) -> PolicyDecisions
where
    I: IntoIterator<Item = PolicyDecisions>,
{
    compact(merge(sets))
}

fn compact_operations<I>(decisions: I) -> Vec<OperationDecision>
where
    I: IntoIterator<Item = OperationDecision>,
{
    group_by_first_occurrence(decisions, |d| d.operation.clone())
        .into_iter()
        .map(|(operation, group): (AccessOperation, Vec<OperationDecision>)| {
            let mut merged = OperationDecision {
                operation,
                enforcement_actions: Vec::new(),
                used_policies: Vec::new(),
            };
            for decision in group {
                merged.enforcement_actions.extend(decision.enforcement_actions);
                merged.used_policies.extend(decision.used_policies);
            }
            merged
        })
        .collect()
}

/// Empty input yields an empty result rather than a single empty group.
fn group_by_first_occurrence<K, V, I, F>(items: I, key: F) -> Vec<(K, Vec<V>)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = V>,
    F: Fn(&V) -> K,
{
    let mut groups: Vec<(K, Vec<V>)> = Vec::new();
    let mut index: HashMap<K, usize> = HashMap::new();

    for item in items {
        let k = key(&item);
        match index.get(&k) {
            Some(&pos) => groups[pos].1.push(item),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![item]));
            }
        }
    }
    groups
}
