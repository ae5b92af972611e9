//! Module registry boundary.

use async_trait::async_trait;
use tokio::sync::RwLock;
use weir_core::Module;

#[async_trait]
pub trait ModuleRegistry: Send + Sync {
    /// Registered modules, in registration order.
    async fn list(&self) -> anyhow::Result<Vec<Module>>;
}

#[derive(Default)]
pub struct MemoryModuleRegistry {
    modules: RwLock<Vec<Module>>,
}

impl MemoryModuleRegistry {
    pub fn new(modules: Vec<Module>) -> Self {
        Self {
            modules: RwLock::new(modules),
        }
    }

    /// Adds a module, replacing any module of the same name in place.
    pub async fn register(&self, module: Module) {
        let mut modules = self.modules.write().await;
        match modules.iter_mut().find(|m| m.name == module.name) {
            Some(existing) => *existing = module,
            None => modules.push(module),
        }
    }

    pub async fn unregister(&self, name: &str) -> bool {
        let mut modules = self.modules.write().await;
        let before = modules.len();
        modules.retain(|m| m.name != name);
        before != modules.len()
    }
}

#[async_trait]
impl ModuleRegistry for MemoryModuleRegistry {
    async fn list(&self) -> anyhow::Result<Vec<Module>> {
        Ok(self.modules.read().await.clone())
    }
}
