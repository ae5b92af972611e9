//! Subcommands of the `weir` binary.

pub mod modules;
pub mod plan;
pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use weir_core::{Application, AssetCondition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).context("failed to render YAML"),
        OutputFormat::Json => {
            serde_json::to_string_pretty(value).context("failed to render JSON")
        }
    }
}

/// Reads an application resource from a YAML (or JSON) file.
pub fn load_application(path: &Path) -> Result<Application> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse application {}", path.display()))
}

/// One-line rendering of an asset condition.
pub fn describe(condition: &AssetCondition) -> String {
    match condition {
        AssetCondition::Pending => "Pending".to_string(),
        AssetCondition::Ready => "Ready".to_string(),
        AssetCondition::Deny { message, .. } => format!("Deny: {message}"),
        AssetCondition::Error { message, .. } => format!("Error: {message}"),
    }
}
