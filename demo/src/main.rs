//! Prior-authorization pipeline demo CLI.
//!
//! Usage:
//!   cargo run -p demo -- run --auto-approve
//!   cargo run -p demo -- run --transcript "..." --config pipeline.toml
//!   cargo run -p demo -- runs --approve
//!   cargo run -p demo -- bootstrap-policies --documents policy_docs
//!   cargo run -p demo -- parse-policy policy_docs/uhc-lumbar-mri-2026.txt

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use priorauth_adapters::{build_orchestrator, fixtures::SAMPLE_TRANSCRIPT};
use priorauth_contracts::{
    error::{PriorAuthError, PriorAuthResult},
    workflow::WorkflowTraceStep,
};
use priorauth_core::{config::PipelineConfig, orchestrator::RunOptions};
use priorauth_policy::{catalog, parse_policy_document};
use priorauth_runs::{spawn_run, RunEventKind, RunStore, RunSubscription};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Voice-to-submission prior authorization pipeline.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Prior-authorization pipeline demo",
    long_about = "Runs the prior-authorization pipeline: transcript intake, coding,\n\
                  policy retrieval, medical necessity, human review, and submission."
)]
struct Cli {
    /// Pipeline TOML. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Policy catalog path, overriding `policy_store.path`.
    #[arg(long, global = true)]
    policies: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one transcript through the pipeline and print the trace and result.
    Run {
        #[arg(long, default_value = SAMPLE_TRANSCRIPT)]
        transcript: String,
        /// Approve submission without a reviewer decision.
        #[arg(long)]
        auto_approve: bool,
    },
    /// Queue a run in the registry, stream its events, then list summaries.
    Runs {
        #[arg(long, default_value = SAMPLE_TRANSCRIPT)]
        transcript: String,
        #[arg(long)]
        auto_approve: bool,
        /// Approve and re-run when the run stops at human review.
        #[arg(long)]
        approve: bool,
    },
    /// Write the built-in policy catalog, and optionally one text document
    /// per policy for knowledge-base ingestion.
    BootstrapPolicies {
        #[arg(long, default_value = "policies/policies.json")]
        output: PathBuf,
        #[arg(long)]
        documents: Option<PathBuf>,
        #[arg(long)]
        overwrite: bool,
    },
    /// Parse a knowledge-base policy document and print the record.
    ParsePolicy { file: PathBuf },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for per-step logs.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref(), cli.policies).and_then(|config| match cli.command {
        Command::Run {
            transcript,
            auto_approve,
        } => run_once(&config, &transcript, auto_approve),
        Command::Runs {
            transcript,
            auto_approve,
            approve,
        } => run_registry(&config, &transcript, auto_approve, approve),
        Command::BootstrapPolicies {
            output,
            documents,
            overwrite,
        } => bootstrap_policies(&output, documents.as_deref(), overwrite),
        Command::ParsePolicy { file } => parse_policy(&file),
    });

    if let Err(e) = result {
        eprintln!("demo error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>, policies: Option<PathBuf>) -> PriorAuthResult<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(policies) = policies {
        config.policy_store.path = policies;
    }
    Ok(config)
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn run_once(config: &PipelineConfig, transcript: &str, auto_approve: bool) -> PriorAuthResult<()> {
    catalog::bootstrap(&config.policy_store.path, false)?;
    let orchestrator = build_orchestrator(config)?;
    let options = RunOptions {
        auto_approve,
        ..RunOptions::default()
    };
    let result = orchestrator.run(transcript, &options, None)?;

    println!("\n=== Workflow Trace ===");
    for step in &result.trace {
        print_step(step);
    }
    println!("\n=== Structured Output ===");
    print_json(&result)
}

fn run_registry(config: &PipelineConfig, transcript: &str, auto_approve: bool, approve: bool) -> PriorAuthResult<()> {
    catalog::bootstrap(&config.policy_store.path, false)?;
    let store = Arc::new(RunStore::from_config(&config.runs));
    let orchestrator = Arc::new(build_orchestrator(config)?);

    let record = store.create_run(transcript, auto_approve, None)?;
    let run_id = record.run_id;
    info!(run_id = %run_id, "run created");

    let events = store.subscribe(&run_id)?;
    let worker = spawn_run(Arc::clone(&store), Arc::clone(&orchestrator), run_id.clone())?;
    stream(events);
    join(worker)?;

    if approve && store.get(&run_id)?.awaiting_approval() {
        println!("\n=== Reviewer approval ===");
        store.prepare_approval(&run_id)?;
        let events = store.subscribe(&run_id)?;
        let worker = spawn_run(Arc::clone(&store), orchestrator, run_id.clone())?;
        stream(events);
        join(worker)?;
    }

    println!("\n=== Run Summaries ===");
    print_json(&store.summaries(RunStore::DEFAULT_MAX_RUNS)?)
}

fn bootstrap_policies(output: &Path, documents: Option<&Path>, overwrite: bool) -> PriorAuthResult<()> {
    let written = catalog::bootstrap(output, overwrite)?;
    println!("policy catalog: {}", written.display());
    if let Some(directory) = documents {
        for path in catalog::write_policy_documents(directory, overwrite)? {
            println!("policy document: {}", path.display());
        }
    }
    Ok(())
}

fn parse_policy(file: &Path) -> PriorAuthResult<()> {
    let text = std::fs::read_to_string(file).map_err(|e| PriorAuthError::PolicyStore {
        reason: format!("failed to read '{}': {}", file.display(), e),
    })?;
    print_json(&parse_policy_document(&text)?)
}

// ── Output ────────────────────────────────────────────────────────────────────

fn stream(events: RunSubscription) {
    for event in events {
        match (event.kind, &event.step) {
            (RunEventKind::Trace, Some(step)) => print_step(step),
            (RunEventKind::Heartbeat, _) => println!("... waiting on run {}", event.run_id),
            (kind, _) => {
                let status = event.run.as_ref().map(|r| format!("{:?}", r.status)).unwrap_or_default();
                println!("<{:?}> {} {}", kind, event.run_id, status);
            }
        }
    }
}

fn join(worker: std::thread::JoinHandle<()>) -> PriorAuthResult<()> {
    worker.join().map_err(|_| PriorAuthError::RunRegistry {
        reason: "run worker panicked".to_string(),
    })
}

fn print_step(step: &WorkflowTraceStep) {
    println!(
        "[{}] {} :: {} :: {}",
        step.timestamp.to_rfc3339(),
        step.stage,
        step.status,
        step.detail
    );
}

fn print_json<T: Serialize>(value: &T) -> PriorAuthResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| PriorAuthError::ConfigError {
        reason: format!("failed to render JSON output: {}", e),
    })?;
    println!("{}", json);
    Ok(())
}
