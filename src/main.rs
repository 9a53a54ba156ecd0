use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use synthflow_core::config::{AppConfig, LayoutDirection};
use synthflow_core::event::EventBus;
use synthflow_core::types::{FlowEvent, NodeStatus};
use synthflow_flow::layout::placements;
use synthflow_flow::{
    symphony_pipeline, ExecutionSimulator, FlowDefinition, FlowState, LayoutOptions, SharedFlow,
};

const DEFAULT_CONFIG: &str = "synthflow.toml";

#[derive(Parser)]
#[command(
    name = "synthflow",
    version,
    about = "Lay out and animate an AI music-composition pipeline"
)]
struct Cli {
    /// Path to config file (default: ./synthflow.toml, then ~/.synthflow/config.toml)
    #[arg(short, long, env = "SYNTHFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Layout direction, TB or LR (overrides config)
    #[arg(short, long)]
    direction: Option<LayoutDirection>,

    /// Time each node stays in progress, in milliseconds (overrides config)
    #[arg(long)]
    step_delay_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the terminal UI (default)
    Tui,
    /// Run the pipeline headless and print each transition
    Run,
    /// Print laid-out node positions as JSON
    Layout {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Show the effective configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The TUI owns the terminal, so keep stderr quiet there.
    let default_filter = match cli.command {
        None | Some(Commands::Tui) => "warn",
        _ => "synthflow=info,warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "synthflow", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(direction) = cli.direction {
        config.layout.direction = direction;
    }
    if let Some(ms) = cli.step_delay_ms {
        config.simulator.step_delay_ms = ms;
    }

    if let Some(Commands::Config) = &cli.command {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let definition = load_definition(&config)?;
    let event_bus = Arc::new(EventBus::default());

    match cli.command {
        Some(Commands::Layout { pretty }) => {
            let mut state = FlowState::from_definition(&definition);
            let stats = state.relayout(&LayoutOptions::from(&config.layout));
            let report = serde_json::json!({
                "direction": config.layout.direction,
                "ranks": stats.ranks,
                "crossings": stats.crossings,
                "reversed_edges": stats.reversed_edges,
                "nodes": placements(&state.nodes),
            });
            let out = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{}", out);
        }
        Some(Commands::Run) => {
            let mut state = FlowState::from_definition(&definition);
            state.relayout(&LayoutOptions::from(&config.layout));
            let delay = Duration::from_millis(config.simulator.step_delay_ms);
            run_headless(state.into_shared(), event_bus, delay).await?;
        }
        None | Some(Commands::Tui) => {
            let flow = FlowState::from_definition(&definition).into_shared();
            synthflow_tui::run_tui(&config, flow, event_bus).await?;
        }
        Some(Commands::Config) | Some(Commands::Completions { .. }) => {
            unreachable!("handled before the flow is loaded")
        }
    }

    Ok(())
}

/// Explicit paths must exist; otherwise fall back through the usual
/// locations to built-in defaults.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    if let Some(path) = explicit {
        return AppConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()));
    }

    let local = PathBuf::from(DEFAULT_CONFIG);
    if local.exists() {
        return Ok(AppConfig::load(&local)?);
    }

    if let Some(path) = dirs_home().map(|h| h.join(".synthflow").join("config.toml")) {
        if path.exists() {
            info!(path = %path.display(), "Loading config from home directory");
            return Ok(AppConfig::load(&path)?);
        }
    }

    info!("No config file found, using defaults");
    Ok(AppConfig::default())
}

fn load_definition(config: &AppConfig) -> anyhow::Result<FlowDefinition> {
    match config.definition_path() {
        Some(path) => {
            let def = FlowDefinition::load(&path)
                .with_context(|| format!("loading flow definition {}", path.display()))?;
            info!(path = %path.display(), nodes = def.nodes.len(), "Using custom flow");
            Ok(def)
        }
        None => Ok(symphony_pipeline()),
    }
}

/// Drive one run to completion, printing every transition. Ctrl-C stops it.
async fn run_headless(
    flow: SharedFlow,
    event_bus: Arc<EventBus>,
    step_delay: Duration,
) -> anyhow::Result<()> {
    let mut rx = event_bus.subscribe();
    let mut simulator = ExecutionSimulator::new(flow.clone(), event_bus, step_delay);
    simulator.start();

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        print_event(&flow, &event);
                        if event.is_terminal() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event stream lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping run");
                if !simulator.stop() {
                    break;
                }
            }
        }
    }

    let state = flow.snapshot();
    println!(
        "{}/{} nodes completed",
        state.count_status(NodeStatus::Completed),
        state.nodes.len()
    );
    Ok(())
}

fn print_event(flow: &SharedFlow, event: &FlowEvent) {
    match event {
        FlowEvent::RunStarted {
            run_id,
            total_steps,
        } => println!("run {} started: {} steps", run_id.short(), total_steps),
        FlowEvent::StepStarted { step, node_id, .. } => {
            let label = flow
                .lock()
                .node(node_id)
                .map(|n| n.label.clone())
                .unwrap_or_default();
            println!("[{:>3}] {} {:<20} {}", step + 1, "…", node_id, label);
        }
        FlowEvent::StepCompleted { step, node_id, .. } => {
            println!("[{:>3}] {} {}", step + 1, "✔", node_id);
        }
        FlowEvent::RunFinished { run_id, .. } => println!("run {} finished", run_id.short()),
        FlowEvent::RunStopped { run_id, step } => {
            println!("run {} stopped at step {}", run_id.short(), step + 1)
        }
        FlowEvent::StartIgnored { run_id } => {
            println!("run {} already in progress", run_id.short())
        }
    }
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
