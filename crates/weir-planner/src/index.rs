//! Lookup of registered modules by the capabilities they advertise.

use std::collections::{BTreeSet, HashSet};
use weir_core::{FlowType, Interface, Module, ModuleCapability, ModuleInOut};

/// Requirements a capability must satisfy.
#[derive(Debug, Clone)]
pub struct CapabilityQuery<'a> {
    pub flow: FlowType,
    pub source: Option<&'a Interface>,
    pub sink: Option<&'a Interface>,
    /// Action identifiers the capability must support.
    pub actions: BTreeSet<String>,
    /// Interface the workload consumes. Capabilities exposing an API must match it.
    pub api: Option<&'a Interface>,
    /// Module names allowed by configuration. `None` means unrestricted.
    pub allowed_modules: Option<&'a BTreeSet<String>>,
}

impl<'a> CapabilityQuery<'a> {
    pub fn new(flow: FlowType) -> Self {
        Self {
            flow,
            source: None,
            sink: None,
            actions: BTreeSet::new(),
            api: None,
            allowed_modules: None,
        }
    }

    pub fn source(mut self, source: &'a Interface) -> Self {
        self.source = Some(source);
        self
    }

    pub fn sink(mut self, sink: &'a Interface) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn api(mut self, api: &'a Interface) -> Self {
        self.api = Some(api);
        self
    }

    pub fn allowed_modules(mut self, allowed: Option<&'a BTreeSet<String>>) -> Self {
        self.allowed_modules = allowed;
        self
    }
}

/// A capability (and the interface pair) that satisfied a query.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityMatch<'a> {
    pub module: &'a Module,
    pub capability: &'a ModuleCapability,
    pub interfaces: &'a ModuleInOut,
}

/// Modules in registration order. Registration order is the tie-break when
/// several modules satisfy the same query.
#[derive(Debug, Clone, Default)]
pub struct ModuleCapabilityIndex {
    modules: Vec<Module>,
}

impl ModuleCapabilityIndex {
    /// Builds the index, dropping modules whose declared module dependencies
    /// are not registered (transitively).
    pub fn new(modules: impl IntoIterator<Item = Module>) -> Self {
        let mut modules: Vec<Module> = modules.into_iter().collect();
        loop {
            let names: HashSet<String> = modules.iter().map(|m| m.name.clone()).collect();
            let before = modules.len();
            modules.retain(|m| {
                let missing: Vec<&str> = m
                    .module_dependencies()
                    .filter(|d| !names.contains(*d))
                    .collect();
                if !missing.is_empty() {
                    tracing::debug!(
                        module = %m.name,
                        missing = ?missing,
                        "module skipped: dependencies not registered"
                    );
                }
                missing.is_empty()
            });
            if modules.len() == before {
                break;
            }
        }
        Self { modules }
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Whether any registered module offers the flow at all.
    pub fn has_flow(&self, flow: FlowType) -> bool {
        self.modules.iter().any(|m| m.has_capability(flow))
    }

    /// Every satisfying (module, capability, interface pair), in registration order.
    pub fn find_matches(&self, query: &CapabilityQuery<'_>) -> Vec<CapabilityMatch<'_>> {
        let mut matches = Vec::new();
        for module in &self.modules {
            if query
                .allowed_modules
                .is_some_and(|allowed| !allowed.contains(&module.name))
            {
                continue;
            }
            for capability in module.capabilities_of(query.flow) {
                if !query.actions.iter().all(|a| capability.supports_action(a)) {
                    continue;
                }
                if let (Some(wanted), Some(api)) = (query.api, capability.api.as_ref())
                    && api.interface != *wanted
                {
                    continue;
                }
                for interfaces in &capability.supported_interfaces {
                    if side_matches(query.source, interfaces.source.as_ref())
                        && side_matches(query.sink, interfaces.sink.as_ref())
                    {
                        matches.push(CapabilityMatch {
                            module,
                            capability,
                            interfaces,
                        });
                    }
                }
            }
        }
        matches
    }

    /// Candidate modules for a query, deduplicated, in registration order.
    pub fn find_candidates(&self, query: &CapabilityQuery<'_>) -> Vec<&Module> {
        let mut seen = HashSet::new();
        self.find_matches(query)
            .into_iter()
            .map(|m| m.module)
            .filter(|m| seen.insert(m.name.as_str()))
            .collect()
    }
}

fn side_matches(required: Option<&Interface>, offered: Option<&Interface>) -> bool {
    match required {
        Some(required) => offered == Some(required),
        None => true,
    }
}
