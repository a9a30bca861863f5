//! CLI binary for running and validating Pipewright pipelines.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pipewright_pipeline::{
    default_registry, validate, EventLog, ExecutorConfig, PipelineDefinition, PipelineExecutor, RunOptions,
    Severity, StaticConfigs,
};
use pipewright_providers::{CredentialSource, EnvCredentials, ProviderRegistry, Providers};
use pipewright_types::Payload;

#[derive(Parser)]
#[command(name = "pipewright", version, about = "Graph runner for content-producing agent pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline definition and print the run result as JSON
    Run {
        /// Path to the pipeline .json file
        pipeline: PathBuf,

        /// JSON object used as the initial payload
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Provider registry file (default: built-in providers)
        #[arg(long)]
        providers: Option<PathBuf>,

        /// Per-agent configuration file: `{ "Writer": { "engine": "..." } }`
        #[arg(long)]
        agents: Option<PathBuf>,

        /// Root directory for run artifacts
        #[arg(long, default_value = "artifacts")]
        artifacts_dir: PathBuf,

        /// Append structured events to this JSONL file
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Use this run id instead of a generated one
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Validate a pipeline definition
    Validate {
        /// Path to the pipeline .json file
        pipeline: PathBuf,
    },

    /// List configured providers and whether their credentials are present
    Providers {
        /// Provider registry file (default: built-in providers)
        #[arg(long)]
        providers: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            pipeline,
            input,
            providers,
            agents,
            artifacts_dir,
            log_file,
            run_id,
        } => {
            let completed = cmd_run(
                &pipeline,
                input.as_deref(),
                providers.as_deref(),
                agents.as_deref(),
                artifacts_dir,
                log_file.as_deref(),
                run_id,
            )
            .await?;
            if !completed {
                std::process::exit(1);
            }
        }
        Commands::Validate { pipeline } => {
            cmd_validate(&pipeline)?;
        }
        Commands::Providers { providers } => {
            cmd_providers(providers.as_deref())?;
        }
    }

    Ok(())
}

fn load_pipeline(path: &Path) -> anyhow::Result<PipelineDefinition> {
    PipelineDefinition::from_path(path).with_context(|| format!("loading pipeline {}", path.display()))
}

fn load_registry(path: Option<&Path>) -> anyhow::Result<ProviderRegistry> {
    match path {
        Some(p) => ProviderRegistry::from_path(p).with_context(|| format!("loading providers {}", p.display())),
        None => Ok(ProviderRegistry::builtin()),
    }
}

fn load_input(path: Option<&Path>) -> anyhow::Result<Payload> {
    let Some(path) = path else {
        return Ok(Payload::new());
    };
    let data = std::fs::read_to_string(path).with_context(|| format!("reading input {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&data)?;
    Payload::from_value(value).with_context(|| format!("input {} must be a JSON object", path.display()))
}

fn cmd_validate(path: &Path) -> anyhow::Result<()> {
    let def = load_pipeline(path)?;
    let agents = default_registry();
    let diagnostics = validate(&def, Some(&agents));

    if diagnostics.is_empty() {
        println!("Pipeline is valid");
        return Ok(());
    }

    let mut has_error = false;
    for diag in &diagnostics {
        let severity = match diag.severity {
            Severity::Error => {
                has_error = true;
                "ERROR"
            }
            Severity::Warning => "WARN",
        };
        println!("[{}] {}: {}", severity, diag.rule, diag.message);
    }

    if has_error {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_providers(path: Option<&Path>) -> anyhow::Result<()> {
    let registry = load_registry(path)?;
    let credentials = EnvCredentials;

    for descriptor in registry.iter() {
        let credential = match descriptor.credential_ref.as_deref() {
            Some(name) if credentials.lookup(name).is_some() => format!("{name} (set)"),
            Some(name) => format!("{name} (missing, mock mode)"),
            None => "none".to_string(),
        };
        println!(
            "  {} [{}] models={} credential={}",
            descriptor.id,
            descriptor.kind.as_str(),
            descriptor.models.join(","),
            credential
        );
    }
    Ok(())
}

/// Returns whether the run completed.
async fn cmd_run(
    path: &Path,
    input: Option<&Path>,
    providers: Option<&Path>,
    agents: Option<&Path>,
    artifacts_dir: PathBuf,
    log_file: Option<&Path>,
    run_id: Option<String>,
) -> anyhow::Result<bool> {
    let def = load_pipeline(path)?;
    let input = load_input(input)?;
    let registry = load_registry(providers)?;

    let configs = match agents {
        Some(p) => StaticConfigs::from_path(p).with_context(|| format!("loading agent configs {}", p.display()))?,
        None => StaticConfigs::new(),
    };
    let event_log = match log_file {
        Some(p) => EventLog::with_file(p).with_context(|| format!("opening log file {}", p.display()))?,
        None => EventLog::new(),
    };

    let agent_registry = default_registry();
    for diag in validate(&def, Some(&agent_registry)) {
        if diag.severity == Severity::Warning {
            tracing::warn!(rule = %diag.rule, "{}", diag.message);
        }
    }

    tracing::info!(pipeline = %def.id, nodes = def.nodes.len(), "Running pipeline");

    let executor = PipelineExecutor::new(
        agent_registry,
        Arc::new(Providers::from_env(registry)),
        ExecutorConfig {
            artifacts_root: artifacts_dir,
            ..Default::default()
        },
    )
    .with_configs(Arc::new(configs))
    .with_event_log(Arc::new(event_log));

    let options = RunOptions {
        run_id,
        ..Default::default()
    };
    let result = executor.run(&def, input, options).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result.is_completed())
}
