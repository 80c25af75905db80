use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use perfbench_domain::metrics::{PERCENTILE_METRICS, SUMMARY_METRICS};
use perfbench_domain::{EndpointId, OwnerId, TaskId, TaskState};
use perfbench_runner::CreateTaskRequest;
use perfbench_sweeper::OutcomeSweeper;
use perfbench_task_store::TaskFilter;

mod config;
mod context;
mod output;
mod worker;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "perfbench", version, about = "Isolated LLM performance benchmark runner")]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one benchmark and write its outcome file (spawned by `run`).
    Worker {
        #[arg(long)]
        task_id: TaskId,
        #[arg(long)]
        outcome: PathBuf,
    },
    /// Create a task, launch it, and wait for it to finish.
    Run {
        #[arg(long, default_value_t = OwnerId::new(1))]
        owner: OwnerId,
        #[arg(long)]
        endpoint: EndpointId,
        /// Dataset id; -1 selects the built-in dataset.
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        dataset: i64,
        #[arg(long, default_value_t = 1)]
        concurrency: u32,
        #[arg(long, default_value_t = 10)]
        requests: u32,
        #[arg(long)]
        min_prompt_length: Option<u32>,
        #[arg(long)]
        max_prompt_length: Option<u32>,
        #[arg(long)]
        max_tokens: Option<u32>,
        /// JSON object merged into every request body.
        #[arg(long)]
        extra_args: Option<String>,
        /// Run the worker as a task in this process instead of a child process.
        #[arg(long)]
        in_process: bool,
        #[arg(long)]
        json: bool,
    },
    Show {
        #[arg(long, default_value_t = OwnerId::new(1))]
        owner: OwnerId,
        id: TaskId,
        #[arg(long)]
        json: bool,
    },
    List {
        #[arg(long, default_value_t = OwnerId::new(1))]
        owner: OwnerId,
        #[arg(long)]
        state: Option<TaskState>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        per_page: u32,
        #[arg(long)]
        json: bool,
    },
    /// Delete a task record. A running worker is left alone.
    Delete {
        #[arg(long, default_value_t = OwnerId::new(1))]
        owner: OwnerId,
        id: TaskId,
    },
    /// Remove orphaned outcome files and engine working directories.
    Sweep {
        /// Keep sweeping on the configured interval until interrupted.
        #[arg(long)]
        watch: bool,
    },
    /// Describe every metric the benchmark reports.
    Metrics {
        #[arg(long)]
        json: bool,
    },
    /// Extract metric tables from a saved benchmark console log.
    Parse {
        log: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stderr keeps the worker's stdout free
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    match cli.command {
        // Loads its own config so setup failures still reach the outcome file.
        Commands::Worker { task_id, outcome } => {
            worker::run(config_path, task_id, &outcome, tokio::io::stdin()).await
        }
        command => run_command(command, &AppConfig::load(config_path)?, config_path).await,
    }
}

async fn run_command(command: Commands, config: &AppConfig, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Worker { .. } => bail!("worker runs only as a spawned child"),
        Commands::Run {
            owner,
            endpoint,
            dataset,
            concurrency,
            requests,
            min_prompt_length,
            max_prompt_length,
            max_tokens,
            extra_args,
            in_process,
            json,
        } => {
            let req = CreateTaskRequest {
                owner_id: owner,
                endpoint_id: endpoint,
                dataset_id: dataset,
                concurrency,
                total_requests: requests,
                min_prompt_length,
                max_prompt_length,
                max_tokens,
                extra_args,
            };
            run_benchmark(config, config_path, req, in_process, json).await
        }
        Commands::Show { owner, id, json } => {
            let store = context::open_store(config).await?;
            let task = store
                .get(id)
                .await?
                .filter(|t| t.owner_id == owner)
                .with_context(|| format!("task {id} not found"))?;
            if json {
                output::print_json(&task)
            } else {
                output::print_task(&task);
                Ok(())
            }
        }
        Commands::List {
            owner,
            state,
            search,
            page,
            per_page,
            json,
        } => {
            let store = context::open_store(config).await?;
            let filter = TaskFilter {
                state,
                search,
                page,
                per_page,
                ..TaskFilter::for_owner(owner)
            };
            let page = store.list(&filter).await?;
            if json {
                output::print_json(&json!({ "tasks": page.tasks, "total": page.total }))
            } else {
                output::print_page(&page);
                Ok(())
            }
        }
        Commands::Delete { owner, id } => {
            let store = context::open_store(config).await?;
            if !store.delete(id, owner).await? {
                bail!("task {id} not found");
            }
            println!("deleted task {id}");
            Ok(())
        }
        Commands::Sweep { watch } => sweep(config, watch).await,
        Commands::Metrics { json } => {
            if json {
                output::print_json(&json!({
                    "summary": SUMMARY_METRICS,
                    "percentiles": PERCENTILE_METRICS,
                }))
            } else {
                output::print_metrics("summary", SUMMARY_METRICS);
                println!();
                output::print_metrics("percentiles", PERCENTILE_METRICS);
                Ok(())
            }
        }
        Commands::Parse { log, json } => {
            let text = std::fs::read_to_string(&log)
                .with_context(|| format!("reading {}", log.display()))?;
            let parsed = perfbench_domain::parse_benchmark_output(&text);
            if json {
                output::print_json(&json!({
                    "summary": parsed.summary,
                    "percentiles": parsed.percentiles,
                }))
            } else {
                output::print_tables(&parsed);
                Ok(())
            }
        }
    }
}

async fn run_benchmark(
    config: &AppConfig,
    config_path: Option<&Path>,
    req: CreateTaskRequest,
    in_process: bool,
    json: bool,
) -> Result<()> {
    let runner = config.runner.runner_config();
    let store = context::open_store(config).await?;
    let spawner = context::spawner(config, &runner, config_path, in_process)?;
    let launcher = context::launcher(config, &runner, Arc::clone(&store), spawner);

    let owner = req.owner_id;
    let task = launcher.submit(req).await?;
    tracing::info!(task_id = %task.id, "waiting for benchmark");
    launcher.supervisor().drain().await;

    let task = launcher
        .get_task(owner, task.id)
        .await?
        .with_context(|| format!("task {} vanished", task.id))?;
    if json {
        output::print_json(&task)?;
    } else {
        output::print_task(&task);
    }
    store.close().await?;
    if task.state == TaskState::Failed {
        bail!(
            "benchmark failed: {}",
            task.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn sweep(config: &AppConfig, watch: bool) -> Result<()> {
    let store = context::open_store(config).await?;
    let sweeper = OutcomeSweeper::new(store, config.runner.sweeper_config());
    if !watch {
        let report = sweeper.sweep().await?;
        println!(
            "scanned {}, removed {}, skipped {}, failed {}",
            report.scanned, report.removed, report.skipped, report.failed
        );
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });
    sweeper.run(shutdown).await;
    Ok(())
}
