use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use taskgate::scheduler::{SchedulerConfig, SchedulerRegistry};
use taskgate::{ClosureTask, Scheduler, SchedulerEvent, TaskHandle, TaskState};

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Commands, TaskSpec};
use config::Config;

fn setup_logging(level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskgate")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("taskgate.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG overrides the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Final state of one demo task, for `--json` output.
#[derive(Debug, Serialize)]
struct TaskReport {
    id: u64,
    priority: String,
    #[serde(flatten)]
    state: TaskState,
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let registry = SchedulerRegistry::from_configs(&config.queue_configs()).context("Failed to build queues")?;

    match &cli.command {
        Commands::Run {
            tasks,
            queue,
            max_concurrency,
            abort_after,
            json,
        } => {
            let scheduler = match max_concurrency {
                Some(limit) => {
                    let base = config.queue_configs().remove(queue).unwrap_or_default();
                    let queue_config = SchedulerConfig {
                        max_concurrency: *limit,
                        ..base
                    };
                    Scheduler::with_config(queue.as_str(), &queue_config)?
                }
                None => registry.get(queue)?,
            };
            handle_run_command(&scheduler, tasks, *abort_after, *json, config).await
        }
        Commands::Queues => handle_queues_command(&registry),
    }
}

async fn handle_run_command(
    scheduler: &Scheduler,
    tasks: &[TaskSpec],
    abort_after: Option<u64>,
    json: bool,
    config: &Config,
) -> Result<()> {
    info!(
        "Running {} task(s) on queue '{}' (max concurrency {})",
        tasks.len(),
        scheduler.name(),
        scheduler.max_concurrency()
    );
    println!(
        "{} {} task(s) on {} (max concurrency {})",
        "Submitting".green(),
        tasks.len(),
        scheduler.name().cyan(),
        scheduler.max_concurrency()
    );

    let mut events = scheduler.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SchedulerEvent::Started => println!("{}", "Queue started".cyan()),
                SchedulerEvent::Completed => println!("{}", "Queue drained".cyan()),
            }
        }
    });

    let default_duration = Duration::from_millis(config.demo.default_duration_ms);
    let mut handles: Vec<TaskHandle> = Vec::with_capacity(tasks.len());
    for (index, entry) in tasks.iter().enumerate() {
        let task = ClosureTask::sleeping(entry.priority, entry.duration.unwrap_or(default_duration))
            .with_label(format!("demo-{}", index));
        let handle = scheduler.submit(Arc::new(task))?;
        println!(
            "  {} {} ({}) -> {}",
            "queued".dimmed(),
            handle.id(),
            entry.priority,
            describe(&handle.state())
        );
        handles.push(handle);
    }

    if let Some(ms) = abort_after {
        tokio::select! {
            _ = scheduler.idle() => {}
            _ = tokio::time::sleep(Duration::from_millis(ms)) => {
                let aborted = scheduler.abort_all().await;
                println!("{} {} task(s) after {}ms", "Aborted".red(), aborted, ms);
            }
        }
    }
    scheduler.idle().await;
    printer.abort();

    if json {
        let reports: Vec<TaskReport> = handles
            .iter()
            .map(|handle| TaskReport {
                id: handle.id().as_u64(),
                priority: handle.priority().to_string(),
                state: handle.state(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for handle in &handles {
            println!("  {} ({}) -> {}", handle.id(), handle.priority(), describe(&handle.state()));
        }
    }

    Ok(())
}

fn handle_queues_command(registry: &SchedulerRegistry) -> Result<()> {
    info!("Listing {} queue(s)", registry.len());
    for snapshot in registry.snapshots() {
        println!(
            "{} max_concurrency={} waiting={} running={}",
            snapshot.name.cyan(),
            snapshot.max_concurrency,
            snapshot.waiting,
            snapshot.running
        );
    }
    Ok(())
}

fn describe(state: &TaskState) -> ColoredString {
    match state {
        TaskState::Waiting => "waiting".yellow(),
        TaskState::Running => "running".green(),
        TaskState::Finished { outcome } => format!("finished: {:?}", outcome).normal(),
        TaskState::Cancelled => "cancelled".red(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging at the configured level
    setup_logging(config.log_level.as_deref().unwrap_or("info")).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
