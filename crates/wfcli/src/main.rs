// crates/wfcli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wfcore::{RunEvent, Value};
use wfruntime::{DirectorKind, RuntimeConfig, WorkflowDefinition, WorkflowRuntime};

#[derive(Parser)]
#[command(name = "wf")]
#[command(about = "Workflow Engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow definition
    Run {
        /// Path to workflow JSON file
        file: PathBuf,

        /// Override the director named by the definition
        #[arg(short, long, value_enum)]
        director: Option<DirectorArg>,

        /// Number of times to run the workflow
        #[arg(short, long, default_value_t = 1)]
        runs: u64,

        /// Workflow inputs as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Elaborate and configure a workflow without running it
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available actor types
    Actors,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectorArg {
    PublishSubscribe,
    DataDriven,
    MtDataDriven,
    DemandDriven,
}

impl From<DirectorArg> for DirectorKind {
    fn from(arg: DirectorArg) -> Self {
        match arg {
            DirectorArg::PublishSubscribe => DirectorKind::PublishSubscribe,
            DirectorArg::DataDriven => DirectorKind::DataDriven,
            DirectorArg::MtDataDriven => DirectorKind::MtDataDriven,
            DirectorArg::DemandDriven => DirectorKind::DemandDriven,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

fn runtime() -> WorkflowRuntime {
    WorkflowRuntime::with_registry(Arc::new(wfactors::standard_registry()), RuntimeConfig::default())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            director,
            runs,
            input,
            verbose,
        } => {
            init_logging(verbose);
            run_workflow(file, director.map(DirectorKind::from), runs, input).await?;
        }

        Commands::Validate { file } => {
            init_logging(false);
            validate_workflow(file)?;
        }

        Commands::Actors => {
            list_actors();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

async fn run_workflow(
    file: PathBuf,
    director: Option<DirectorKind>,
    runs: u64,
    input: Option<String>,
) -> Result<()> {
    println!("Loading workflow from: {}", file.display());

    let mut definition = WorkflowDefinition::from_file(&file)
        .with_context(|| format!("failed to load {}", file.display()))?;
    if let Some(kind) = director {
        definition.set_director_kind(kind);
    }

    let runtime = runtime();
    println!("Workflow: {}", definition.name);
    println!("   Nodes: {}", definition.nodes.len());
    println!("   Director: {:?}", definition.director_kind(runtime.config()));
    println!();

    let mut workflow = runtime.build(&definition)?;
    if let Some(input) = input {
        let json: serde_json::Value = serde_json::from_str(&input)?;
        let serde_json::Value::Object(fields) = json else {
            return Err(anyhow::anyhow!("Input must be a JSON object"));
        };
        for (label, value) in fields {
            workflow.set_input(label, Value::from_json(value));
        }
    }

    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                RunEvent::RunStarted { workflow, run, .. } => {
                    println!("Run {} of {} started", run, workflow);
                }
                RunEvent::StepCompleted {
                    node, step, success, ..
                } if !success => {
                    println!("  Step {} of node {} failed", step, node);
                }
                RunEvent::PacketSent { node, uri, data, .. } => {
                    println!("  {} -> {} = {}", node, uri, data);
                }
                RunEvent::RunCompleted {
                    success, duration_ms, ..
                } => {
                    if success {
                        println!("Run completed successfully in {}ms", duration_ms);
                    } else {
                        println!("Run failed after {}ms", duration_ms);
                    }
                }
                _ => {}
            }
        }
    });

    let result = runtime.execute(&mut workflow, runs).await;

    // Wait for events to finish printing
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();
    result?;

    println!();
    println!("Published data:");
    let store = workflow.store();
    for key in store.keys() {
        if let Some(value) = store.peek(&key) {
            println!("   {}: {}", key, value);
        }
    }

    if !workflow.outputs().is_empty() {
        println!();
        println!("Outputs:");
        for (label, value) in workflow.outputs() {
            println!("   {}: {}", label, value);
        }
    }

    Ok(())
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("Validating workflow: {}", file.display());

    let definition = WorkflowDefinition::from_file(&file)?;
    let runtime = runtime();
    let mut workflow = runtime.build(&definition)?;
    workflow.elaborate()?;
    workflow.configure()?;

    println!("Workflow is valid:");
    println!("   Name: {}", workflow.name());
    println!("   Nodes: {}", workflow.graph().len());
    println!("   Edges: {}", workflow.graph().edges().len());
    Ok(())
}

fn list_actors() {
    println!("Available Actor Types:");
    println!();

    let registry = wfactors::standard_registry();
    for actor_type in registry.list_actor_types() {
        if let Some(metadata) = registry.get_metadata(&actor_type) {
            println!("  • {} ({})", actor_type, metadata.category);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", actor_type);
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let json = WorkflowDefinition::example().to_json_pretty()?;
    std::fs::write(&output, json)?;

    println!("Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  wf run {} --runs 2", output.display());
    Ok(())
}
