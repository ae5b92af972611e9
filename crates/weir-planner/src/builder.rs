//! Consolidation of per-asset plans into one named flow.
//!
//! Steps from workload- or cluster-scoped capabilities that serve the same
//! interface and expose the same API are merged into a single shared step
//! carrying the arguments of every asset it serves. Asset-scoped steps stay
//! one per asset. Assets are consumed in request order, so names and step
//! order are stable for identical input.

use crate::flow::{AssetPlan, PlannedStep};
use crate::index::ModuleCapabilityIndex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use weir_core::{
    ComponentTemplate, DataFlow, EndpointSpec, ExecutionPlan, ExecutionUnit, FlowStep, FlowType,
    Interface, Placement, StepArguments,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SharedKey {
    module: String,
    flow: FlowType,
    interface: Interface,
    api: Option<Interface>,
    placement: Placement,
    clusters: Option<BTreeSet<String>>,
}

impl SharedKey {
    fn of(step: &PlannedStep) -> Option<Self> {
        if !step.scope.is_shared() {
            return None;
        }
        let interface = match &step.arguments {
            StepArguments::Read { assets } => assets.first()?.source.interface.clone(),
            StepArguments::Write { assets } => assets.first()?.destination.interface.clone(),
            StepArguments::Copy(_) => return None,
        };
        Some(Self {
            module: step.module.clone(),
            flow: step.flow(),
            interface,
            api: step.api.as_ref().map(|a| a.interface.clone()),
            placement: step.placement.clone(),
            clusters: step.allowed_clusters.clone(),
        })
    }
}

/// Collects the asset plans of one application into a single flow.
///
/// Steps that run once per workload or cluster are shared between assets that
/// use the same module, capability, source interface and API. Every other step
/// is kept per asset and named after it.
pub struct PlanBuilder<'a> {
    app_name: String,
    index: &'a ModuleCapabilityIndex,
    steps: Vec<FlowStep>,
    shared: HashMap<SharedKey, usize>,
    names: HashSet<String>,
    assets: Vec<String>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(app_name: impl Into<String>, index: &'a ModuleCapabilityIndex) -> Self {
        Self {
            app_name: app_name.into(),
            index,
            steps: Vec::new(),
            shared: HashMap::new(),
            names: HashSet::new(),
            assets: Vec::new(),
        }
    }

    /// Appends the steps of `plan`, merging shareable steps into an existing
    /// one. Plans without steps do not register their asset.
    pub fn add(&mut self, plan: AssetPlan) {
        if plan.steps.is_empty() {
            return;
        }
        self.assets.push(plan.asset_id.clone());
        let start = self.steps.len();

        for step in plan.steps {
            let key = SharedKey::of(&step);
            if let Some(pos) = key.as_ref().and_then(|k| self.shared.get(k).copied())
                && absorb(&mut self.steps[pos].arguments, &step.arguments)
            {
                // A shared step must follow the steps of this asset that feed it.
                if pos < start && self.steps.len() > start {
                    self.move_to_end(pos);
                }
                continue;
            }

            let base = match &key {
                Some(_) => format!("{}-{}", self.app_name, step.module),
                None => format!("{}-{}-{}", self.app_name, slug(&plan.asset_id), step.module),
            };
            let name = self.unique_name(base);
            if let Some(key) = key {
                self.shared.insert(key, self.steps.len());
            }

            let mut api = step.api;
            if let Some(api) = api.as_mut() {
                api.endpoint.hostname = name.clone();
            }
            self.steps.push(FlowStep {
                name,
                template: step.module,
                scope: step.scope,
                arguments: step.arguments,
                placement: step.placement,
                allowed_clusters: step.allowed_clusters,
                api,
            });
        }
    }

    /// Resolves templates and dependencies of the collected steps.
    pub fn finish(self) -> PlannedFlow {
        let mut templates = BTreeMap::new();
        let mut dependencies = BTreeMap::new();
        for step in &self.steps {
            let mut pending = vec![step.template.clone()];
            while let Some(name) = pending.pop() {
                if templates.contains_key(&name) {
                    continue;
                }
                let Some(module) = self.index.get(&name) else {
                    continue;
                };
                let deps: Vec<String> = module.module_dependencies().map(str::to_string).collect();
                pending.extend(deps.iter().cloned());
                dependencies.insert(name.clone(), deps);
                templates.insert(
                    name.clone(),
                    ComponentTemplate {
                        name,
                        kind: "Module".to_string(),
                        chart: module.chart.clone(),
                    },
                );
            }
        }

        PlannedFlow {
            name: self.app_name,
            steps: self.steps,
            templates,
            dependencies,
            assets: self.assets,
        }
    }

    fn move_to_end(&mut self, pos: usize) {
        let last = self.steps.len() - 1;
        self.steps[pos..].rotate_left(1);
        for index in self.shared.values_mut() {
            if *index == pos {
                *index = last;
            } else if *index > pos {
                *index -= 1;
            }
        }
    }

    fn unique_name(&mut self, base: String) -> String {
        let mut name = base.clone();
        let mut n = 2;
        while self.names.contains(&name) {
            name = format!("{base}-{n}");
            n += 1;
        }
        self.names.insert(name.clone());
        name
    }
}

/// Moves per-asset arguments of `other` into a shared step.
fn absorb(shared: &mut StepArguments, other: &StepArguments) -> bool {
    match (shared, other) {
        (StepArguments::Read { assets }, StepArguments::Read { assets: more }) => {
            assets.extend(more.iter().cloned());
            true
        }
        (StepArguments::Write { assets }, StepArguments::Write { assets: more }) => {
            assets.extend(more.iter().cloned());
            true
        }
        _ => false,
    }
}

/// Lowercase, with every run of characters outside [a-z0-9] replaced by '-'.
fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// Named, consolidated steps of one application, not yet assigned to clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFlow {
    pub name: String,
    pub steps: Vec<FlowStep>,
    pub templates: BTreeMap<String, ComponentTemplate>,
    dependencies: BTreeMap<String, Vec<String>>,
    /// Assets with at least one step, in request order.
    pub assets: Vec<String>,
}

impl PlannedFlow {
    /// Workload-facing endpoint of each readable asset.
    pub fn endpoints(&self) -> BTreeMap<String, EndpointSpec> {
        let mut endpoints = BTreeMap::new();
        for step in self.steps.iter().filter(|s| s.flow() == FlowType::Read) {
            let Some(api) = &step.api else { continue };
            for asset in step.arguments.asset_ids() {
                endpoints.insert(asset.to_string(), api.endpoint.clone());
            }
        }
        endpoints
    }

    /// Builds one execution unit per assigned cluster.
    pub fn into_execution_plan(
        self,
        app_uuid: impl Into<String>,
        assignment: BTreeMap<String, Vec<FlowStep>>,
    ) -> ExecutionPlan {
        let units = assignment
            .into_iter()
            .map(|(cluster, steps)| {
                let entrypoint = steps
                    .iter()
                    .find(|s| s.flow() == FlowType::Read)
                    .or_else(|| steps.first())
                    .map(|s| s.name.clone())
                    .unwrap_or_default();
                let templates = self.templates_for(&steps);
                let unit = ExecutionUnit {
                    cluster: cluster.clone(),
                    entrypoint,
                    flow: DataFlow {
                        name: self.name.clone(),
                        steps,
                    },
                    templates,
                };
                (cluster, unit)
            })
            .collect();

        ExecutionPlan {
            app_uuid: app_uuid.into(),
            assets: self.assets,
            units,
        }
    }

    fn templates_for(&self, steps: &[FlowStep]) -> BTreeMap<String, ComponentTemplate> {
        let mut out = BTreeMap::new();
        let mut pending: Vec<&str> = steps.iter().map(|s| s.template.as_str()).collect();
        while let Some(name) = pending.pop() {
            if out.contains_key(name) {
                continue;
            }
            if let Some(template) = self.templates.get(name) {
                out.insert(name.to_string(), template.clone());
            }
            if let Some(deps) = self.dependencies.get(name) {
                pending.extend(deps.iter().map(String::as_str));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_normalizes_dataset_ids() {
        assert_eq!(slug("db2/allow-dataset"), "db2-allow-dataset");
        assert_eq!(slug("S3__Bucket//x"), "s3-bucket-x");
        assert_eq!(slug("/trailing/"), "trailing");
    }
}
