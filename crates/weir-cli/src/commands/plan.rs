//! `weir plan`: one-shot planning of a single application.
//!
//! The application is reconciled against the fixture collaborators, with the
//! plan loop deploying into memory, until both loops settle or the pass
//! limit is reached.

use super::{OutputFormat, load_application, render};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use weir_core::{Application, ApplicationStatus, ExecutionPlan, Resource, WeirConfig};
use weir_runtime::fixtures::Fixtures;
use weir_runtime::{
    Action, ApplicationReconciler, Auditor, MemoryDeployer, MemoryStore, PlanReconciler,
    PlanResource, Reconcile, Store, TracingAuditSink,
};

pub struct PlanOutcome {
    pub application: Application,
    pub plan: Option<ExecutionPlan>,
    pub passes: usize,
}

#[derive(Serialize)]
struct Report<'a> {
    application: String,
    passes: usize,
    status: &'a ApplicationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<&'a ExecutionPlan>,
}

pub async fn plan_once(
    config: &WeirConfig,
    app: Application,
    max_passes: usize,
) -> Result<PlanOutcome> {
    let fixtures = Fixtures::new(config)?;
    let apps = Arc::new(MemoryStore::<Application>::new());
    let plans = Arc::new(MemoryStore::<PlanResource>::new());
    let applications = ApplicationReconciler::new(
        apps.clone(),
        plans.clone(),
        fixtures.collaborators(),
        Auditor::new(config.audit.clone(), Arc::new(TracingAuditSink)),
        config,
    );
    let deployments = PlanReconciler::new(plans.clone(), Arc::new(MemoryDeployer::new()), config);

    let key = apps.create(app).await?.value.key();
    let mut passes = 0;
    while passes < max_passes {
        passes += 1;
        let app_action = applications.reconcile(&key).await?;
        let plan_action = deployments.reconcile(&key).await?;
        tracing::debug!(pass = passes, ?app_action, ?plan_action, "one-shot pass");
        if app_action == Action::Done && plan_action == Action::Done {
            break;
        }
    }

    let application = apps
        .get(&key)
        .await?
        .map(|stored| stored.value)
        .context("application disappeared while planning")?;
    let plan = plans.get(&key).await?.map(|stored| stored.value.spec);
    Ok(PlanOutcome {
        application,
        plan,
        passes,
    })
}

pub async fn run(
    config: &WeirConfig,
    file: &Path,
    format: OutputFormat,
    max_passes: usize,
) -> Result<()> {
    let app = load_application(file)?;
    let outcome = plan_once(config, app, max_passes).await?;
    let report = Report {
        application: outcome.application.key().to_string(),
        passes: outcome.passes,
        status: &outcome.application.status,
        plan: outcome.plan.as_ref(),
    };
    println!("{}", render(&report, format)?);
    Ok(())
}
