//! Shared test doubles for worker, dispatch and orchestrator tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskloop_core::error::{ToolError, WorkerError};
use taskloop_core::task::{Task, WorkerResult};
use taskloop_core::tool::{Tool, ToolResult};
use taskloop_core::worker::Worker;
use tokio_util::sync::CancellationToken;

/// Tracks how many probe workers are running at the same time.
#[derive(Clone, Default)]
pub struct ConcurrencyProbe {
    in_flight: Arc<AtomicUsize>,
    max_seen: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn worker(&self, name: impl Into<String>, delay: Duration) -> Arc<dyn Worker> {
        Arc::new(ProbeWorker {
            name: name.into(),
            delay,
            probe: self.clone(),
        })
    }

    pub fn max_seen(&self) -> usize {
        self.max_seen.load(Ordering::SeqCst)
    }
}

struct ProbeWorker {
    name: String,
    delay: Duration,
    probe: ConcurrencyProbe,
}

#[async_trait]
impl Worker for ProbeWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["probe".into()]
    }

    async fn execute(
        &self,
        task: Task,
        _cancel: CancellationToken,
    ) -> Result<WorkerResult, WorkerError> {
        let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut result = WorkerResult::new(&self.name, task.id);
        result.success = true;
        result.artifacts = vec![format!("{}.out", self.name)];
        result.attempts = 1;
        Ok(result)
    }
}

/// Always returns `WorkerError::Failed`.
pub struct FailingWorker {
    name: String,
}

impl FailingWorker {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Worker for FailingWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<String> {
        vec![]
    }

    async fn execute(
        &self,
        _task: Task,
        _cancel: CancellationToken,
    ) -> Result<WorkerResult, WorkerError> {
        Err(WorkerError::Failed {
            worker: self.name.clone(),
            reason: "scripted failure".into(),
        })
    }
}

/// Sleeps for a long time, ignoring cancellation itself.
pub struct SleepyWorker {
    name: String,
    delay: Duration,
}

impl SleepyWorker {
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

#[async_trait]
impl Worker for SleepyWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<String> {
        vec![]
    }

    async fn execute(
        &self,
        task: Task,
        _cancel: CancellationToken,
    ) -> Result<WorkerResult, WorkerError> {
        tokio::time::sleep(self.delay).await;
        let mut result = WorkerResult::new(&self.name, task.id);
        result.success = true;
        Ok(result)
    }
}

/// Worker with a fixed outcome that records every sub-task it receives.
pub struct ScriptedWorker {
    name: String,
    success: bool,
    artifacts: Vec<String>,
    data: serde_json::Value,
    pub seen: Arc<Mutex<Vec<Task>>>,
}

impl ScriptedWorker {
    pub fn succeeding(name: impl Into<String>, artifacts: &[&str]) -> Self {
        Self {
            name: name.into(),
            success: true,
            artifacts: artifacts.iter().map(|a| a.to_string()).collect(),
            data: serde_json::Value::Null,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unsuccessful(name: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::succeeding(name, &[])
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    async fn execute(
        &self,
        task: Task,
        _cancel: CancellationToken,
    ) -> Result<WorkerResult, WorkerError> {
        let mut result = WorkerResult::new(&self.name, &task.id);
        result.success = self.success;
        result.artifacts = self.artifacts.clone();
        result.data = self.data.clone();
        result.output = if self.success { "ok".into() } else { "scripted miss".into() };
        result.attempts = 1;
        self.seen.lock().unwrap().push(task);
        Ok(result)
    }
}

/// Tool that replays queued responses and records the arguments it got.
/// Once the queue is drained the last response repeats.
pub struct ScriptedTool {
    name: String,
    responses: Mutex<VecDeque<ToolResult>>,
    last: Mutex<Option<ToolResult>>,
    pub calls: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl ScriptedTool {
    pub fn new(name: impl Into<String>, responses: Vec<ToolResult>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(responses.into()),
            last: Mutex::new(None),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A generator response carrying `files` as `[{path, content}]`.
    pub fn files_response(files: &[(&str, &str)]) -> ToolResult {
        let files: Vec<serde_json::Value> = files
            .iter()
            .map(|(path, content)| serde_json::json!({ "path": path, "content": content }))
            .collect();
        ToolResult::ok("generated").with_data(serde_json::json!({ "files": files }))
    }
}

#[async_trait]
impl Tool for ScriptedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "scripted test tool"
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        self.calls.lock().unwrap().push(arguments);
        let next = self.responses.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(next) = next {
            *last = Some(next);
        }
        last.clone()
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: "no scripted response".into(),
            })
    }
}
