mod logging;
mod repl;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hearth_core::HearthConfig;
use hearth_limbic::{spawn_maintenance, MaintenanceConfig};
use hearth_reasoning::{Brain, ChannelNotifier};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file (missing file means defaults)
    #[arg(short, long, env = "HEARTH_CONFIG", default_value = "hearth.toml")]
    config: PathBuf,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Write logs to a daily-rolling file in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive conversation (the default)
    Chat,
    /// Print the current limbic state and trust tier
    State,
    /// Search memories
    Recall {
        query: String,
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// Run a tool: `hearth tool write_file '{"path": "notes/a.md", "content": "hi"}'`
    Tool {
        name: String,
        /// JSON object of arguments
        #[arg(default_value = "{}")]
        args: String,
    },
    /// Restore a repository to a snapshot with a compensating commit
    Rollback { repo: PathBuf, commit_ref: String },
    /// List safety-net snapshots
    Snapshots,
    /// Show the tool audit trail
    Audit,
    /// Show the most recent pipeline traces
    Traces {
        #[arg(short, long, default_value_t = 5)]
        count: usize,
    },
    /// Irreversibly delete every stored memory
    Wipe {
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let _log_guard = logging::init(&args.log_level, args.log_json, args.log_dir.as_deref())?;

    let config = HearthConfig::load_or_default(&args.config);
    tracing::info!("Data directory: {}", config.data_dir.display());
    let brain = open_brain(&config).await?;

    match args.command.unwrap_or(Command::Chat) {
        Command::Chat => {
            let (notifier, mut notifications) = ChannelNotifier::new(16);
            let brain = Arc::new(brain.with_notifier(Arc::new(notifier)));
            let maintenance = spawn_maintenance(
                brain.limbic().clone(),
                MaintenanceConfig::from_secs(config.limbic.maintenance_interval_secs),
            );
            let printer = tokio::spawn(async move {
                while let Some(message) = notifications.recv().await {
                    println!("\n[hearth] {message}\n");
                }
            });

            let result = repl::run(brain.clone()).await;
            brain.drain_background().await;
            maintenance.abort();
            printer.abort();
            result?;
        }
        Command::State => {
            let state = brain.limbic_state().await;
            println!("{}", serde_json::to_string_pretty(&state)?);
            println!("tier: {}", state.tier());
        }
        Command::Recall { query, limit } => {
            let hits = brain.retrieve(&query, limit).await;
            if hits.is_empty() {
                println!("(nothing found)");
            }
            for hit in hits {
                println!("{:.3}  {}  {}", hit.score, hit.id, hit.text);
            }
        }
        Command::Tool { name, args } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("Tool arguments must be a JSON object")?;
            let result = brain.execute_tool(&name, args).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Rollback { repo, commit_ref } => {
            let result = brain.rollback(&repo, &commit_ref).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Snapshots => {
            for snapshot in brain.snapshots().await? {
                println!(
                    "{}  {}  {}  action={}",
                    snapshot.timestamp.to_rfc3339(),
                    snapshot.commit_ref,
                    snapshot.repo.display(),
                    snapshot.action_id
                );
            }
        }
        Command::Audit => {
            for entry in brain.audit_entries().await? {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
        Command::Traces { count } => {
            for trace in brain.recent_traces(count).await? {
                println!("{}", serde_json::to_string_pretty(&trace)?);
            }
        }
        Command::Wipe { yes } => {
            if !yes {
                anyhow::bail!("Refusing to wipe memories without --yes");
            }
            brain.wipe_memory().await?;
            println!("All memories deleted.");
        }
    }

    Ok(())
}

#[cfg(not(feature = "fastembed"))]
async fn open_brain(config: &HearthConfig) -> Result<Brain> {
    Brain::open(config).await
}

/// Same as the default, with the local embedding model in place of the
/// hashing embedder.
#[cfg(feature = "fastembed")]
async fn open_brain(config: &HearthConfig) -> Result<Brain> {
    use hearth_limbic::{DecayConfig, LimbicDynamics, LimbicStore, LimbicSystem};
    use hearth_memory::{FastEmbedder, MemoryStore, SqliteVectorIndex};

    let dynamics = LimbicDynamics::new(DecayConfig::from(&config.limbic));
    let limbic = Arc::new(LimbicSystem::open(LimbicStore::new(config.state_path()), dynamics).await);
    let index = SqliteVectorIndex::open(config.memory_db_path(), &config.memory.collection).await?;
    let embedder = tokio::task::spawn_blocking(FastEmbedder::new).await??;
    let memory = MemoryStore::new(Arc::new(embedder), Arc::new(index));
    let llm = hearth_reasoning::create_client(&config.llm)?;
    Ok(Brain::assemble(
        config,
        limbic,
        memory,
        llm,
        Arc::new(hearth_os::GitCli::new()),
    ))
}
