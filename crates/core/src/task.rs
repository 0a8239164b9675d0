//! Task domain types: what callers submit and what the orchestrator returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Reserved context-bag key carrying the previous iteration's feedback.
pub const FEEDBACK_KEY: &str = "previous_feedback";

/// Context-bag key under which gathered resource ids are handed to workers.
pub const GATHERED_CONTEXT_KEY: &str = "gathered_context";

/// A unit of work submitted to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: String,

    /// Type tag used for worker routing and validation rule selection
    pub kind: String,

    /// Free-text description; also the gathering query
    pub description: String,

    /// Mutable key/value bag carrying feedback between iterations
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub priority: i32,

    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: kind.into(),
            description: description.into(),
            context: HashMap::new(),
            priority: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Derive an isolated sub-task for a delegated worker.
    ///
    /// The sub-task gets a new id derived from the parent and its own copy of
    /// the context bag; the parent is never touched.
    pub fn subtask(&self, worker: &str, iteration: u32) -> Task {
        Task {
            id: format!("{}:{}:{}", self.id, worker, iteration),
            kind: self.kind.clone(),
            description: self.description.clone(),
            context: self.context.clone(),
            priority: self.priority,
            created_at: Utc::now(),
        }
    }

    /// Feedback stashed by the previous iteration, if any.
    pub fn feedback(&self) -> Option<&str> {
        self.context.get(FEEDBACK_KEY).and_then(|v| v.as_str())
    }

    pub fn set_feedback(&mut self, feedback: impl Into<String>) {
        self.context
            .insert(FEEDBACK_KEY.to_string(), serde_json::Value::String(feedback.into()));
    }

    /// Resource ids gathered for this task, if the orchestrator provided any.
    pub fn gathered_context(&self) -> Vec<String> {
        self.context
            .get(GATHERED_CONTEXT_KEY)
            .and_then(|v| v.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The result a single worker reports for one delegated sub-task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub worker: String,
    pub task_id: String,
    pub success: bool,
    pub output: String,

    /// Identifiers of resources created or modified (or located, for search)
    #[serde(default)]
    pub artifacts: Vec<String>,

    /// Role-specific structured data (coverage, match counts, ...)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,

    /// Internal iterations the worker consumed
    #[serde(default)]
    pub attempts: u32,
}

impl WorkerResult {
    pub fn new(worker: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
            task_id: task_id.into(),
            success: false,
            output: String::new(),
            artifacts: Vec::new(),
            data: serde_json::Value::Null,
            attempts: 0,
        }
    }
}

/// Orchestrator loop phases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Gathering,
    Compacting,
    Acting,
    Verifying,
    ContinueWithFeedback,
    Complete,
    Failed,
    Cancelled,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Gathering => "gathering",
            Phase::Compacting => "compacting",
            Phase::Acting => "acting",
            Phase::Verifying => "verifying",
            Phase::ContinueWithFeedback => "continue_with_feedback",
            Phase::Complete => "complete",
            Phase::Failed => "failed",
            Phase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One append-only audit entry in the iteration log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub task_id: String,
    pub iteration: u32,
    pub phase: Phase,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// How a top-level run ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Validation passed and artifacts were produced
    Completed,
    /// `max_iterations` ran out without completion
    Exhausted,
    /// The caller's cancellation token fired
    Cancelled,
}

/// The final result of one `Orchestrator::execute` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    pub outcome: TaskOutcome,
    pub artifacts: Vec<String>,
    pub iterations: u32,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub errors: Vec<String>,
    /// Feedback text from the final incomplete iteration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub sub_results: Vec<WorkerResult>,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
