//! Bounded worker pool driving a reconciler from a key queue.
//!
//! At most one pass per key is in flight. A key enqueued while its pass is
//! running is marked dirty and re-run once that pass finishes, so bursts of
//! notifications collapse into a single follow-up pass.

use crate::error::ReconcileError;
use crate::store::WatchEvent;
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, broadcast, mpsc, watch};
use tokio::task::JoinSet;
use weir_core::ResourceKey;

/// What to do with a key after a successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Wait for the next change notification.
    Done,
    RequeueAfter(Duration),
}

#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    async fn reconcile(&self, key: &ResourceKey) -> Result<Action, ReconcileError>;
}

/// Sender side of a controller's queue.
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::UnboundedSender<ResourceKey>,
}

impl QueueHandle {
    pub fn enqueue(&self, key: ResourceKey) {
        // A closed queue means the controller stopped.
        let _ = self.tx.send(key);
    }

    pub fn enqueue_after(&self, key: ResourceKey, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(key);
        });
    }
}

pub struct Controller<R> {
    name: &'static str,
    reconciler: Arc<R>,
    max_concurrent: usize,
    error_backoff: Duration,
    handle: QueueHandle,
    rx: mpsc::UnboundedReceiver<ResourceKey>,
}

type PassResult = (ResourceKey, Result<Action, ReconcileError>);

impl<R: Reconcile> Controller<R> {
    pub fn new(
        name: &'static str,
        reconciler: Arc<R>,
        max_concurrent: usize,
        error_backoff: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name,
            reconciler,
            max_concurrent: max_concurrent.max(1),
            error_backoff,
            handle: QueueHandle { tx },
            rx,
        }
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// Forwards store notifications into the queue, mapped to the keys this
    /// controller reconciles.
    pub fn watch<F>(&self, mut events: broadcast::Receiver<WatchEvent>, map: F)
    where
        F: Fn(&WatchEvent) -> Option<ResourceKey> + Send + 'static,
    {
        let handle = self.handle();
        let name = self.name;
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Some(key) = map(&event) {
                            handle.enqueue(key);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(controller = name, missed, "watch lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if handle.tx.is_closed() {
                    break;
                }
            }
        });
    }

    /// Runs passes until `shutdown` flips to true, then waits for the
    /// passes in flight.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks: JoinSet<PassResult> = JoinSet::new();
        let mut in_flight: HashSet<ResourceKey> = HashSet::new();
        let mut dirty: HashSet<ResourceKey> = HashSet::new();

        tracing::info!(controller = self.name, workers = self.max_concurrent, "controller started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(key) = self.rx.recv() => {
                    if in_flight.contains(&key) {
                        dirty.insert(key);
                    } else {
                        self.spawn(&mut tasks, &permits, &mut in_flight, key);
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    let (key, result) = match joined {
                        Ok(done) => done,
                        Err(e) => {
                            tracing::error!(controller = self.name, error = %e, "reconcile task aborted");
                            continue;
                        }
                    };
                    in_flight.remove(&key);
                    self.after_pass(&key, result);
                    if dirty.remove(&key) {
                        self.spawn(&mut tasks, &permits, &mut in_flight, key);
                    }
                }
            }
        }

        tracing::info!(controller = self.name, in_flight = tasks.len(), "controller stopping");
        while let Some(joined) = tasks.join_next().await {
            if let Ok((key, Err(e))) = joined {
                tracing::warn!(controller = self.name, key = %key, error = %e, "pass failed during shutdown");
            }
        }
    }

    fn spawn(
        &self,
        tasks: &mut JoinSet<PassResult>,
        permits: &Arc<Semaphore>,
        in_flight: &mut HashSet<ResourceKey>,
        key: ResourceKey,
    ) {
        in_flight.insert(key.clone());
        let reconciler = Arc::clone(&self.reconciler);
        let permits = Arc::clone(permits);
        let name = self.name;
        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return (key, Ok(Action::Done));
            };
            let pass = AssertUnwindSafe(reconciler.reconcile(&key)).catch_unwind().await;
            let result = pass.unwrap_or_else(|_| {
                tracing::error!(controller = name, key = %key, "reconcile pass panicked");
                Ok(Action::RequeueAfter(Duration::from_secs(1)))
            });
            (key, result)
        });
    }

    fn after_pass(&self, key: &ResourceKey, result: Result<Action, ReconcileError>) {
        match result {
            Ok(Action::Done) => {
                tracing::debug!(controller = self.name, key = %key, "pass complete");
            }
            Ok(Action::RequeueAfter(delay)) => {
                tracing::debug!(controller = self.name, key = %key, ?delay, "requeue");
                self.handle.enqueue_after(key.clone(), delay);
            }
            Err(e) if e.is_conflict() => {
                tracing::debug!(controller = self.name, key = %key, "conflict, retrying");
                self.handle.enqueue(key.clone());
            }
            Err(e) => {
                tracing::warn!(
                    controller = self.name,
                    key = %key,
                    error = %e,
                    backoff = ?self.error_backoff,
                    "pass failed"
                );
                self.handle.enqueue_after(key.clone(), self.error_backoff);
            }
        }
    }
}
