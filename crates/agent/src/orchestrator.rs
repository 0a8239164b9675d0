//! The orchestrator: a bounded gather → act → verify loop.
//!
//! ```text
//! Idle → Gathering → [Compacting] → Acting → Verifying ─┬─▶ Complete
//!            ▲                                          │
//!            └──────── ContinueWithFeedback ◀───────────┘
//!                      (until max_iterations, then Failed)
//! ```
//!
//! Iterations are strictly sequential; only the workers inside one Acting
//! phase run concurrently. Feedback from a failed verification is written
//! into the task's context bag under [`FEEDBACK_KEY`] so the next iteration's
//! workers see it.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskloop_config::OrchestratorConfig;
use taskloop_context::ContextStore;
use taskloop_core::error::{Error, Result, WorkerError};
use taskloop_core::event::{DomainEvent, EventBus};
use taskloop_core::task::{
    FEEDBACK_KEY, GATHERED_CONTEXT_KEY, IterationRecord, Phase, Task, TaskOutcome, TaskResult,
    WorkerResult,
};
use taskloop_core::worker::WorkerRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatcher, Job};
use crate::iteration_log::IterationLog;
use crate::validation::{RuleSet, ValidationInput, ValidationRule};

enum Verdict {
    Complete(Vec<String>),
    Incomplete(String),
}

pub struct Orchestrator {
    workers: WorkerRegistry,
    store: Arc<ContextStore>,
    routing: BTreeMap<String, Vec<String>>,
    rules: RuleSet,
    dispatcher: Dispatcher,
    max_iterations: u32,
    enable_compaction: bool,
    event_bus: Arc<EventBus>,
    log: Arc<IterationLog>,
}

impl Orchestrator {
    pub fn new(workers: WorkerRegistry, store: Arc<ContextStore>, config: &OrchestratorConfig) -> Self {
        let timeout = (config.operation_timeout_secs > 0)
            .then(|| Duration::from_secs(config.operation_timeout_secs));
        Self {
            workers,
            store,
            routing: BTreeMap::new(),
            rules: RuleSet::new(),
            dispatcher: Dispatcher::new(config.max_parallel_workers, timeout),
            max_iterations: config.max_iterations.max(1),
            enable_compaction: config.enable_compaction,
            event_bus: Arc::new(EventBus::default()),
            log: Arc::new(IterationLog::new()),
        }
    }

    /// Task type → ordered worker names.
    pub fn with_routing(mut self, routing: BTreeMap<String, Vec<String>>) -> Self {
        self.routing = routing;
        self
    }

    pub fn with_rule_set(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Replace the validation rules for one task type.
    pub fn with_rules(mut self, kind: impl Into<String>, rules: Vec<Arc<dyn ValidationRule>>) -> Self {
        self.rules.set(kind, rules);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = bus;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn iteration_log(&self) -> &Arc<IterationLog> {
        &self.log
    }

    pub fn store(&self) -> &Arc<ContextStore> {
        &self.store
    }

    pub fn workers(&self) -> &WorkerRegistry {
        &self.workers
    }

    /// Workers a task type needs, in routing order. Unknown types fall back
    /// to every registered worker. Routed names that are not registered stay
    /// in the list; they surface as worker-not-found errors when dispatched.
    pub fn required_workers(&self, kind: &str) -> Vec<String> {
        match self.routing.get(kind) {
            Some(route) if !route.is_empty() => route.clone(),
            _ => self.workers.names(),
        }
    }

    /// Run a task to completion, exhaustion or cancellation.
    ///
    /// Returns `Err` only when nothing can run at all (no workers). Worker
    /// faults are logged, excluded from the iteration's results and listed in
    /// [`TaskResult::errors`].
    pub async fn execute(&self, task: Task, cancel: CancellationToken) -> Result<TaskResult> {
        if self.workers.is_empty() {
            return Err(Error::Config {
                message: "no workers registered".into(),
            });
        }

        let started = Instant::now();
        let mut task = task;
        let task_id = task.id.clone();

        info!(task_id = %task_id, kind = %task.kind, "Task started");
        self.event_bus.publish(DomainEvent::TaskStarted {
            task_id: task_id.clone(),
            kind: task.kind.clone(),
            timestamp: Utc::now(),
        });

        let mut outcome = TaskOutcome::Exhausted;
        let mut iterations = 0;
        let mut errors = Vec::new();
        let mut artifacts = Vec::new();
        let mut feedback: Option<String> = None;
        let mut sub_results: Vec<WorkerResult> = Vec::new();

        for iteration in 1..=self.max_iterations {
            if cancel.is_cancelled() {
                outcome = TaskOutcome::Cancelled;
                break;
            }
            iterations = iteration;
            debug!(task_id = %task_id, iteration, "Iteration started");
            self.event_bus.publish(DomainEvent::IterationStarted {
                task_id: task_id.clone(),
                iteration,
                timestamp: Utc::now(),
            });

            // Gathering
            let gathered = self.store.search_ids(&task.description).await;
            task.context
                .insert(GATHERED_CONTEXT_KEY.to_string(), serde_json::json!(gathered));
            let required = self.required_workers(&task.kind);
            self.record(
                &task_id,
                iteration,
                Phase::Gathering,
                serde_json::json!({
                    "query": task.description,
                    "feedback": task.feedback(),
                }),
                serde_json::json!({ "gathered": gathered, "required": required }),
            )
            .await;

            // Compaction check
            if self.enable_compaction && self.store.should_compact().await {
                let report = self.store.compact().await;
                if !report.reached_target {
                    warn!(
                        task_id = %task_id,
                        bytes_after = report.bytes_after,
                        target = report.target_bytes,
                        "Compaction did not reach target; continuing"
                    );
                }
                self.event_bus.publish(DomainEvent::ContextCompacted {
                    evicted: report.evicted.len(),
                    bytes_before: report.bytes_before,
                    bytes_after: report.bytes_after,
                    timestamp: Utc::now(),
                });
                self.record(
                    &task_id,
                    iteration,
                    Phase::Compacting,
                    serde_json::Value::Null,
                    serde_json::to_value(&report).unwrap_or_default(),
                )
                .await;
            }

            // Acting
            let mut jobs = Vec::with_capacity(required.len());
            for name in &required {
                match self.workers.get(name) {
                    Some(worker) => jobs.push(Job {
                        worker,
                        task: task.subtask(name, iteration),
                    }),
                    None => {
                        let e = WorkerError::NotFound(name.clone());
                        warn!(task_id = %task_id, iteration, worker = %name, "{e}");
                        errors.push(format!("iteration {iteration}: {e}"));
                    }
                }
            }
            let outcomes = self.dispatcher.run(jobs, &cancel).await;

            let mut results = Vec::with_capacity(outcomes.len());
            let mut was_cancelled = false;
            for job in outcomes {
                let success = job.result.as_ref().is_ok_and(|r| r.success);
                self.event_bus.publish(DomainEvent::WorkerFinished {
                    task_id: task_id.clone(),
                    worker: job.worker.clone(),
                    success,
                    duration_ms: job.elapsed.as_millis() as u64,
                    timestamp: Utc::now(),
                });
                match job.result {
                    Ok(result) => results.push(result),
                    Err(e) if e.is_cancelled() => was_cancelled = true,
                    Err(e) => {
                        warn!(task_id = %task_id, iteration, worker = %job.worker, "Worker failed: {e}");
                        errors.push(format!("iteration {iteration}: {e}"));
                    }
                }
            }
            self.record(
                &task_id,
                iteration,
                Phase::Acting,
                serde_json::json!({ "workers": required }),
                serde_json::to_value(&results).unwrap_or_default(),
            )
            .await;

            if was_cancelled || cancel.is_cancelled() {
                sub_results = results;
                outcome = TaskOutcome::Cancelled;
                break;
            }

            // Verifying
            let verdict = self.verify(&task, iteration, &required, &results);
            sub_results = results;
            match verdict {
                Verdict::Complete(collected) => {
                    self.record(
                        &task_id,
                        iteration,
                        Phase::Verifying,
                        serde_json::Value::Null,
                        serde_json::json!({ "complete": true, "artifacts": collected }),
                    )
                    .await;
                    artifacts = collected;
                    feedback = None;
                    outcome = TaskOutcome::Completed;
                    break;
                }
                Verdict::Incomplete(message) => {
                    self.record(
                        &task_id,
                        iteration,
                        Phase::Verifying,
                        serde_json::Value::Null,
                        serde_json::json!({ "complete": false, "feedback": message }),
                    )
                    .await;
                    debug!(task_id = %task_id, iteration, feedback = %message, "Iteration incomplete");
                    task.set_feedback(message.clone());
                    self.record(
                        &task_id,
                        iteration,
                        Phase::ContinueWithFeedback,
                        serde_json::Value::Null,
                        serde_json::json!({ FEEDBACK_KEY: message }),
                    )
                    .await;
                    feedback = Some(message);
                }
            }
        }

        let final_phase = match outcome {
            TaskOutcome::Completed => Phase::Complete,
            TaskOutcome::Exhausted => Phase::Failed,
            TaskOutcome::Cancelled => Phase::Cancelled,
        };
        self.record(
            &task_id,
            iterations,
            final_phase,
            serde_json::Value::Null,
            serde_json::json!({ "outcome": outcome }),
        )
        .await;

        info!(
            task_id = %task_id,
            outcome = ?outcome,
            iterations,
            artifacts = artifacts.len(),
            "Task finished"
        );
        self.event_bus.publish(DomainEvent::TaskFinished {
            task_id: task_id.clone(),
            outcome,
            iterations,
            timestamp: Utc::now(),
        });

        Ok(TaskResult {
            task_id,
            success: outcome == TaskOutcome::Completed,
            outcome,
            artifacts,
            iterations,
            duration: started.elapsed(),
            errors,
            feedback,
            sub_results,
        })
    }

    /// Rules first (short-circuiting); then every required worker must have
    /// succeeded and at least one artifact must exist.
    fn verify(
        &self,
        task: &Task,
        iteration: u32,
        required: &[String],
        results: &[WorkerResult],
    ) -> Verdict {
        let input = ValidationInput {
            task,
            iteration,
            required,
            results,
        };
        if let Some((rule, message)) = self.rules.evaluate(&input) {
            debug!(task_id = %task.id, iteration, rule = %rule, "Validation rule not satisfied");
            return Verdict::Incomplete(message);
        }

        let unsuccessful: Vec<String> = required
            .iter()
            .filter_map(|name| match results.iter().find(|r| &r.worker == name) {
                Some(r) if r.success => None,
                Some(r) => Some(format!("{name}: {}", r.output)),
                None => Some(format!("{name}: no result")),
            })
            .collect();
        if !unsuccessful.is_empty() {
            return Verdict::Incomplete(format!(
                "Workers did not succeed: {}",
                unsuccessful.join("; ")
            ));
        }

        let mut collected: Vec<String> = Vec::new();
        for artifact in results.iter().flat_map(|r| r.artifacts.iter()) {
            if !collected.contains(artifact) {
                collected.push(artifact.clone());
            }
        }
        if collected.is_empty() {
            return Verdict::Incomplete("No artifacts were produced".into());
        }
        Verdict::Complete(collected)
    }

    async fn record(
        &self,
        task_id: &str,
        iteration: u32,
        phase: Phase,
        input: serde_json::Value,
        output: serde_json::Value,
    ) {
        self.log
            .append(IterationRecord {
                task_id: task_id.to_string(),
                iteration,
                phase,
                input,
                output,
                timestamp: Utc::now(),
            })
            .await;
        self.event_bus.publish(DomainEvent::PhaseCompleted {
            task_id: task_id.to_string(),
            iteration,
            phase,
            timestamp: Utc::now(),
        });
    }
}
