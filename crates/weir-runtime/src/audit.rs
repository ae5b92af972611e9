//! Audit trail of user-facing reconcile outcomes.
//!
//! Events are recorded through an [`AuditSink`]. The [`Auditor`] wraps a sink
//! with the configured toggles and offers one helper per event type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use weir_core::config::AuditConfig;
use weir_core::ResourceKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    PlanGenerated,
    PlanDeleted,
    AssetDenied,
    AssetErrored,
    StorageAllocated,
    StorageReleased,
    AssetRegistered,
    ApplicationDeleted,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlanGenerated => write!(f, "PLAN_GENERATED"),
            Self::PlanDeleted => write!(f, "PLAN_DELETED"),
            Self::AssetDenied => write!(f, "ASSET_DENIED"),
            Self::AssetErrored => write!(f, "ASSET_ERRORED"),
            Self::StorageAllocated => write!(f, "STORAGE_ALLOCATED"),
            Self::StorageReleased => write!(f, "STORAGE_RELEASED"),
            Self::AssetRegistered => write!(f, "ASSET_REGISTERED"),
            Self::ApplicationDeleted => write!(f, "APPLICATION_DELETED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// `namespace/name` of the application.
    pub application: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl AuditEvent {
    pub fn builder(event_type: AuditEventType, application: &ResourceKey) -> AuditEventBuilder {
        AuditEventBuilder {
            event: AuditEvent {
                event_id: Uuid::new_v4(),
                occurred_at: Utc::now(),
                event_type,
                application: application.to_string(),
                asset: None,
                message: None,
                meta: serde_json::Value::Null,
            },
        }
    }
}

pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    pub fn asset(mut self, asset: impl Into<String>) -> Self {
        self.event.asset = Some(asset.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.event.message = Some(message.into());
        self
    }

    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.event.meta = meta;
        self
    }

    pub fn build(self) -> AuditEvent {
        self.event
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Emits events as structured log lines on the `weir::audit` target.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "weir::audit",
            event_id = %event.event_id,
            event_type = %event.event_type,
            application = %event.application,
            asset = event.asset.as_deref().unwrap_or_default(),
            message = event.message.as_deref().unwrap_or_default(),
            meta = %event.meta,
            "audit"
        );
    }
}

/// Keeps events in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, event_type: AuditEventType) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

pub struct Auditor {
    config: AuditConfig,
    sink: Arc<dyn AuditSink>,
}

impl Auditor {
    pub fn new(config: AuditConfig, sink: Arc<dyn AuditSink>) -> Self {
        Self { config, sink }
    }

    pub fn disabled() -> Self {
        Self {
            config: AuditConfig {
                enabled: false,
                ..AuditConfig::default()
            },
            sink: Arc::new(NullAuditSink),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn log(&self, event: AuditEvent) {
        if !self.config.enabled {
            return;
        }
        let filtered = match event.event_type {
            AuditEventType::AssetDenied => !self.config.log_denials,
            AuditEventType::StorageAllocated | AuditEventType::StorageReleased => {
                !self.config.log_storage
            }
            _ => false,
        };
        if !filtered {
            self.sink.record(event);
        }
    }

    pub fn plan_generated(&self, app: &ResourceKey, assets: &[String], clusters: usize) {
        self.log(
            AuditEvent::builder(AuditEventType::PlanGenerated, app)
                .meta(serde_json::json!({ "assets": assets, "clusters": clusters }))
                .build(),
        );
    }

    pub fn plan_deleted(&self, app: &ResourceKey) {
        self.log(AuditEvent::builder(AuditEventType::PlanDeleted, app).build());
    }

    pub fn asset_denied(&self, app: &ResourceKey, asset: &str, message: &str) {
        self.log(
            AuditEvent::builder(AuditEventType::AssetDenied, app)
                .asset(asset)
                .message(message)
                .build(),
        );
    }

    pub fn asset_errored(&self, app: &ResourceKey, asset: &str, message: &str) {
        self.log(
            AuditEvent::builder(AuditEventType::AssetErrored, app)
                .asset(asset)
                .message(message)
                .build(),
        );
    }

    pub fn storage_allocated(&self, app: &ResourceKey, asset: &str, store: &str, region: &str) {
        self.log(
            AuditEvent::builder(AuditEventType::StorageAllocated, app)
                .asset(asset)
                .meta(serde_json::json!({ "store": store, "region": region }))
                .build(),
        );
    }

    pub fn storage_released(&self, app: &ResourceKey, store: &str) {
        self.log(
            AuditEvent::builder(AuditEventType::StorageReleased, app)
                .meta(serde_json::json!({ "store": store }))
                .build(),
        );
    }

    pub fn asset_registered(&self, app: &ResourceKey, asset: &str, cataloged: &str) {
        self.log(
            AuditEvent::builder(AuditEventType::AssetRegistered, app)
                .asset(asset)
                .meta(serde_json::json!({ "catalogedAsset": cataloged }))
                .build(),
        );
    }

    pub fn application_deleted(&self, app: &ResourceKey) {
        self.log(AuditEvent::builder(AuditEventType::ApplicationDeleted, app).build());
    }
}
