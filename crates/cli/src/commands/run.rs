//! `taskloop run`: drive one task through the orchestrator.

use std::sync::Arc;

use taskloop_agent::Runtime;
use taskloop_core::event::DomainEvent;
use taskloop_core::task::Task;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::GlobalOpts;

pub struct RunArgs {
    pub kind: String,
    pub description: String,
    pub priority: i32,
    pub set: Vec<String>,
    pub max_iterations: Option<u32>,
}

pub async fn run(opts: &GlobalOpts, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = opts.load_config()?;
    if let Some(n) = args.max_iterations {
        config.orchestrator.max_iterations = n;
    }
    config.validate()?;

    let task = build_task(&args)?;
    let runtime = Runtime::from_config(config);
    runtime.prime().await;

    let progress = tokio::spawn(log_progress(runtime.orchestrator.event_bus().subscribe()));

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling task");
            ctrl_c.cancel();
        }
    });

    let result = runtime.orchestrator.execute(task, cancel).await;
    progress.abort();
    let result = result?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.success {
        Ok(())
    } else {
        Err(format!(
            "Task {} ended {:?} after {} iteration(s)",
            result.task_id, result.outcome, result.iterations
        )
        .into())
    }
}

/// Build the top-level task from command-line arguments.
///
/// `--set key=value` values are parsed as JSON when possible and kept as
/// plain strings otherwise.
pub fn build_task(args: &RunArgs) -> Result<Task, String> {
    let mut task = Task::new(&args.kind, &args.description).with_priority(args.priority);
    for pair in &args.set {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("Invalid --set '{pair}': expected KEY=VALUE"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Invalid --set '{pair}': empty key"));
        }
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        task = task.with_context(key, value);
    }
    Ok(task)
}

async fn log_progress(mut rx: broadcast::Receiver<Arc<DomainEvent>>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Progress log lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event.as_ref() {
            DomainEvent::TaskStarted { task_id, kind, .. } => {
                info!(task_id = %task_id, kind = %kind, "Task started");
            }
            DomainEvent::IterationStarted { iteration, .. } => {
                info!(iteration, "Iteration started");
            }
            DomainEvent::WorkerFinished {
                worker,
                success,
                duration_ms,
                ..
            } => {
                info!(worker = %worker, success, duration_ms, "Worker finished");
            }
            DomainEvent::ContextCompacted {
                evicted,
                bytes_after,
                ..
            } => {
                info!(evicted, bytes_after, "Context compacted");
            }
            DomainEvent::TaskFinished {
                outcome, iterations, ..
            } => {
                info!(?outcome, iterations, "Task finished");
            }
            DomainEvent::PhaseCompleted { .. } => {}
        }
    }
}
