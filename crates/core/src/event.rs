//! Domain event system: decoupled observation of orchestration progress.
//!
//! The orchestrator publishes events as a task moves through its loop.
//! Other components (CLI progress output, tests) subscribe without coupling
//! to the orchestrator's internals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::task::{Phase, TaskOutcome};

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A top-level task was submitted
    TaskStarted {
        task_id: String,
        kind: String,
        timestamp: DateTime<Utc>,
    },

    /// A loop iteration began
    IterationStarted {
        task_id: String,
        iteration: u32,
        timestamp: DateTime<Utc>,
    },

    /// A phase of an iteration finished
    PhaseCompleted {
        task_id: String,
        iteration: u32,
        phase: Phase,
        timestamp: DateTime<Utc>,
    },

    /// A delegated worker returned (successfully or not)
    WorkerFinished {
        task_id: String,
        worker: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The context store evicted entries
    ContextCompacted {
        evicted: usize,
        bytes_before: usize,
        bytes_after: usize,
        timestamp: DateTime<Utc>,
    },

    /// The loop exited
    TaskFinished {
        task_id: String,
        outcome: TaskOutcome,
        iterations: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
