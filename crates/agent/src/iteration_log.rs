//! Append-only record of orchestrator iterations.

use taskloop_core::task::{IterationRecord, Phase};
use tokio::sync::Mutex;

/// Concurrent-safe, append-only log. Records are never edited or removed.
#[derive(Default)]
pub struct IterationLog {
    records: Mutex<Vec<IterationRecord>>,
}

impl IterationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, record: IterationRecord) {
        self.records.lock().await.push(record);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    pub async fn all(&self) -> Vec<IterationRecord> {
        self.records.lock().await.clone()
    }

    /// Records for one top-level task, in append order.
    pub async fn for_task(&self, task_id: &str) -> Vec<IterationRecord> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect()
    }

    /// Number of distinct iterations recorded for a task.
    pub async fn iterations_for(&self, task_id: &str) -> u32 {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.task_id == task_id)
            .map(|r| r.iteration)
            .max()
            .unwrap_or(0)
    }

    /// Most recent record of the given phase for a task.
    pub async fn last_phase(&self, task_id: &str, phase: Phase) -> Option<IterationRecord> {
        self.records
            .lock()
            .await
            .iter()
            .rev()
            .find(|r| r.task_id == task_id && r.phase == phase)
            .cloned()
    }
}
