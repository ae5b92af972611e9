mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::OutputFormat;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use weir_core::WeirConfig;
use weir_runtime::fixtures;

#[derive(Parser, Debug)]
#[command(name = "weir", version, about = "Governed data-path planning for data-access applications")]
struct Cli {
    /// Configuration file (YAML). Without one, the built-in fixture
    /// configuration is used.
    #[arg(long, global = true, env = "WEIR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check application files for structural problems without planning them
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Plan one application against the in-memory fixture world and print
    /// its status and execution plan
    Plan {
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,

        /// Upper bound on reconcile passes
        #[arg(long, default_value_t = 20)]
        max_passes: usize,
    },

    /// Run the controllers over the given applications until every one of
    /// them settles, then print a summary
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },

    /// List the registered modules and their capabilities
    Modules,
}

fn load_config(path: Option<&Path>) -> Result<WeirConfig> {
    match path {
        Some(path) => WeirConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(fixtures::config()),
    }
}

fn init_tracing(config: &WeirConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.observability.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config);

    match cli.cmd {
        Command::Validate { files } => commands::validate::run(&files)?,
        Command::Plan {
            file,
            format,
            max_passes,
        } => commands::plan::run(&config, &file, format, max_passes).await?,
        Command::Run {
            files,
            timeout_secs,
        } => commands::run::run(config, &files, Duration::from_secs(timeout_secs)).await?,
        Command::Modules => commands::modules::run(),
    }

    Ok(())
}
