//! Versioned resource store with change notifications.
//!
//! Every write is checked against the version the writer last read; a stale
//! write is rejected with [`StoreError::Conflict`] and the writer is expected
//! to re-read and retry. Deleting a resource that still carries finalizers
//! only marks it as deleting. It is removed once the last finalizer is
//! cleared by an update.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::{RwLock, broadcast};
use weir_core::{Resource, ResourceKey};

const WATCH_CAPACITY: usize = 256;

/// A stored value together with the version it was written at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Applied {
        key: ResourceKey,
        labels: BTreeMap<String, String>,
    },
    Deleted {
        key: ResourceKey,
        labels: BTreeMap<String, String>,
    },
}

impl WatchEvent {
    pub fn key(&self) -> &ResourceKey {
        match self {
            WatchEvent::Applied { key, .. } | WatchEvent::Deleted { key, .. } => key,
        }
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        match self {
            WatchEvent::Applied { labels, .. } | WatchEvent::Deleted { labels, .. } => labels,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: ResourceKey },

    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: &'static str, key: ResourceKey },

    #[error("{kind} '{key}' was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        kind: &'static str,
        key: ResourceKey,
        expected: u64,
        found: u64,
    },
}

#[async_trait]
pub trait Store<T: Resource>: Send + Sync {
    async fn get(&self, key: &ResourceKey) -> Result<Option<Versioned<T>>, StoreError>;

    async fn list(&self) -> Result<Vec<Versioned<T>>, StoreError>;

    /// Stores a new resource. The store assigns its uid and generation 1.
    async fn create(&self, value: T) -> Result<Versioned<T>, StoreError>;

    /// Replaces a resource if it is still at `expected_version`. The
    /// generation advances when the spec changed.
    async fn update(&self, expected_version: u64, value: T) -> Result<Versioned<T>, StoreError>;

    /// Removes a resource, or marks it as deleting while finalizers remain.
    async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError>;

    fn watch(&self) -> broadcast::Receiver<WatchEvent>;
}

struct Entries<T> {
    next_version: u64,
    items: BTreeMap<ResourceKey, Versioned<T>>,
}

impl<T> Entries<T> {
    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }
}

pub struct MemoryStore<T> {
    entries: RwLock<Entries<T>>,
    events: broadcast::Sender<WatchEvent>,
}

impl<T: Resource> MemoryStore<T> {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            entries: RwLock::new(Entries {
                next_version: 0,
                items: BTreeMap::new(),
            }),
            events,
        }
    }

    fn notify(&self, event: WatchEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn applied(value: &T) -> WatchEvent {
        WatchEvent::Applied {
            key: value.key(),
            labels: value.meta().labels.clone(),
        }
    }

    fn deleted(value: &T) -> WatchEvent {
        WatchEvent::Deleted {
            key: value.key(),
            labels: value.meta().labels.clone(),
        }
    }
}

impl<T: Resource> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Resource> Store<T> for MemoryStore<T> {
    async fn get(&self, key: &ResourceKey) -> Result<Option<Versioned<T>>, StoreError> {
        Ok(self.entries.read().await.items.get(key).cloned())
    }

    async fn list(&self) -> Result<Vec<Versioned<T>>, StoreError> {
        Ok(self.entries.read().await.items.values().cloned().collect())
    }

    async fn create(&self, mut value: T) -> Result<Versioned<T>, StoreError> {
        let key = value.key();
        let mut entries = self.entries.write().await;
        if entries.items.contains_key(&key) {
            return Err(StoreError::AlreadyExists { kind: T::KIND, key });
        }

        let meta = value.meta_mut();
        meta.uid = uuid::Uuid::new_v4().to_string();
        meta.generation = 1;
        meta.deletion_requested = false;

        let stored = Versioned {
            version: entries.bump(),
            value,
        };
        entries.items.insert(key, stored.clone());
        drop(entries);

        tracing::debug!(kind = T::KIND, key = %stored.value.key(), "resource created");
        self.notify(Self::applied(&stored.value));
        Ok(stored)
    }

    async fn update(&self, expected_version: u64, mut value: T) -> Result<Versioned<T>, StoreError> {
        let key = value.key();
        let mut entries = self.entries.write().await;
        let Some(current) = entries.items.get(&key) else {
            return Err(StoreError::NotFound { kind: T::KIND, key });
        };
        if current.version != expected_version {
            return Err(StoreError::Conflict {
                kind: T::KIND,
                key,
                expected: expected_version,
                found: current.version,
            });
        }

        // Identity and lifecycle fields are owned by the store.
        let previous = current.value.meta().clone();
        let spec_changed = !current.value.spec_eq(&value);
        let meta = value.meta_mut();
        meta.uid = previous.uid;
        meta.deletion_requested = previous.deletion_requested;
        meta.generation = if spec_changed {
            previous.generation + 1
        } else {
            previous.generation
        };

        if value.meta().deletion_requested && value.meta().finalizers.is_empty() {
            entries.items.remove(&key);
            let version = entries.bump();
            drop(entries);
            tracing::debug!(kind = T::KIND, key = %key, "resource finalized and removed");
            self.notify(Self::deleted(&value));
            return Ok(Versioned { version, value });
        }

        let stored = Versioned {
            version: entries.bump(),
            value,
        };
        entries.items.insert(key, stored.clone());
        drop(entries);

        self.notify(Self::applied(&stored.value));
        Ok(stored)
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let Some(current) = entries.items.get(key).cloned() else {
            return Err(StoreError::NotFound {
                kind: T::KIND,
                key: key.clone(),
            });
        };

        if current.value.meta().finalizers.is_empty() {
            entries.items.remove(key);
            drop(entries);
            tracing::debug!(kind = T::KIND, key = %key, "resource deleted");
            self.notify(Self::deleted(&current.value));
            return Ok(());
        }

        if current.value.meta().deletion_requested {
            return Ok(());
        }
        let mut value = current.value;
        value.meta_mut().deletion_requested = true;
        let version = entries.bump();
        entries.items.insert(key.clone(), Versioned { version, value: value.clone() });
        drop(entries);

        tracing::debug!(kind = T::KIND, key = %key, "deletion requested, waiting for finalizers");
        self.notify(Self::applied(&value));
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weir_core::{Application, ApplicationSpec, ObjectMeta};

    fn app(name: &str) -> Application {
        Application::new(ObjectMeta::new("default", name), ApplicationSpec::default())
    }

    #[tokio::test]
    async fn create_assigns_identity() {
        let store = MemoryStore::new();
        let created = store.create(app("notebook")).await.expect("created");
        assert_eq!(created.value.metadata.generation, 1);
        assert!(!created.value.metadata.uid.is_empty());

        let err = store.create(app("notebook")).await.expect_err("duplicate");
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn stale_updates_conflict() {
        let store = MemoryStore::new();
        let created = store.create(app("notebook")).await.expect("created");

        let mut changed = created.value.clone();
        changed.spec.secret_ref = Some("creds".to_string());
        let updated = store.update(created.version, changed).await.expect("updated");
        assert_eq!(updated.value.metadata.generation, 2);

        let err = store
            .update(created.version, created.value.clone())
            .await
            .expect_err("stale version");
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn status_only_updates_keep_generation() {
        let store = MemoryStore::new();
        let created = store.create(app("notebook")).await.expect("created");

        let mut value = created.value.clone();
        value.status.ready = true;
        let updated = store.update(created.version, value).await.expect("updated");
        assert_eq!(updated.value.metadata.generation, 1);
        assert!(updated.version > created.version);
    }

    #[tokio::test]
    async fn finalizers_defer_removal() {
        let store = MemoryStore::new();
        let mut value = app("notebook");
        value.metadata.add_finalizer("weir.io/test");
        let created = store.create(value).await.expect("created");
        let mut events = store.watch();

        store.delete(&created.value.key()).await.expect("delete requested");
        let pending = store
            .get(&created.value.key())
            .await
            .expect("get")
            .expect("still present");
        assert!(pending.value.metadata.deletion_requested);
        assert!(matches!(events.recv().await, Ok(WatchEvent::Applied { .. })));

        let mut value = pending.value.clone();
        value.metadata.remove_finalizer("weir.io/test");
        store.update(pending.version, value).await.expect("finalized");
        assert!(store.get(&created.value.key()).await.expect("get").is_none());
        assert!(matches!(events.recv().await, Ok(WatchEvent::Deleted { .. })));
    }
}
