//! `weir run`: the controller manager over a batch of applications.

use super::{describe, load_application};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use weir_core::{Application, Phase, Resource, ResourceKey, WeirConfig};
use weir_runtime::fixtures::Fixtures;
use weir_runtime::{Manager, MemoryDeployer, MemoryStore, Store, TracingAuditSink};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub async fn run(config: WeirConfig, files: &[PathBuf], timeout: Duration) -> Result<()> {
    let apps = files
        .iter()
        .map(|file| load_application(file))
        .collect::<Result<Vec<_>>>()?;

    let fixtures = Fixtures::new(&config)?;
    let manager = Arc::new(Manager::new(
        config,
        fixtures.collaborators(),
        Arc::new(MemoryDeployer::new()),
        Arc::new(TracingAuditSink),
    ));
    let store = manager.applications();

    let (stop, stopped) = oneshot::channel::<()>();
    let controllers = tokio::spawn({
        let manager = manager.clone();
        async move {
            manager
                .run(async {
                    let _ = stopped.await;
                })
                .await
        }
    });

    let mut keys = Vec::with_capacity(apps.len());
    for app in apps {
        let key = store
            .create(app)
            .await
            .context("failed to submit application")?
            .value
            .key();
        tracing::info!(app = %key, "submitted");
        keys.push(key);
    }

    tokio::select! {
        settled = tokio::time::timeout(timeout, wait_settled(&store, &keys)) => {
            if settled.is_err() {
                tracing::warn!(timeout_secs = timeout.as_secs(), "applications did not settle in time");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
        }
    }

    let _ = stop.send(());
    controllers.await.context("controller task panicked")??;

    for key in &keys {
        if let Some(stored) = store.get(key).await? {
            print_summary(&stored.value);
        }
    }
    Ok(())
}

async fn wait_settled(store: &MemoryStore<Application>, keys: &[ResourceKey]) {
    loop {
        let mut all = true;
        for key in keys {
            match store.get(key).await {
                Ok(Some(stored)) if is_settled(&stored.value) => {}
                _ => {
                    all = false;
                    break;
                }
            }
        }
        if all {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Whether the controllers have nothing further to do for `app`.
fn is_settled(app: &Application) -> bool {
    let status = &app.status;
    status.observed_generation == app.metadata.generation
        && matches!(
            status.phase,
            Phase::Ready | Phase::Denied | Phase::PartialError
        )
}

fn print_summary(app: &Application) {
    let status = &app.status;
    println!("{}  phase={:?} ready={}", app.key(), status.phase, status.ready);
    if let Some(message) = &status.error_message {
        println!("    error: {message}");
    }
    for (asset, state) in &status.asset_states {
        match &state.endpoint {
            Some(endpoint) => println!("    {asset}: {} ({})", describe(&state.condition), endpoint.url()),
            None => println!("    {asset}: {}", describe(&state.condition)),
        }
    }
}
