//! Worker trait: independently invocable units of delegated work.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::task::{Task, WorkerResult};

/// The uniform capability contract every worker implements.
///
/// A worker that cannot accomplish its task reports `success = false` in its
/// [`WorkerResult`]; `Err` is reserved for faults (missing tools, cancellation).
#[async_trait]
pub trait Worker: Send + Sync {
    /// The unique name of this worker (e.g., "search", "code", "test").
    fn name(&self) -> &str;

    /// Capability tags advertised by this worker.
    fn capabilities(&self) -> Vec<String>;

    /// Execute one delegated sub-task.
    async fn execute(
        &self,
        task: Task,
        cancel: CancellationToken,
    ) -> Result<WorkerResult, WorkerError>;
}

/// A registry of workers keyed by name, populated at construction.
///
/// Registration order is preserved so "all registered workers" dispatches
/// deterministically.
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    workers: HashMap<String, Arc<dyn Worker>>,
    order: Vec<String>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker. Replaces any existing worker with the same name.
    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        let name = worker.name().to_string();
        if self.workers.insert(name.clone(), worker).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Worker>> {
        self.workers.get(name).cloned()
    }

    /// Registered worker names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Names of workers advertising the given capability tag.
    pub fn with_capability(&self, tag: &str) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| {
                self.workers
                    .get(*name)
                    .is_some_and(|w| w.capabilities().iter().any(|c| c == tag))
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedWorker(&'static str, &'static [&'static str]);

    #[async_trait]
    impl Worker for NamedWorker {
        fn name(&self) -> &str { self.0 }
        fn capabilities(&self) -> Vec<String> {
            self.1.iter().map(|s| s.to_string()).collect()
        }
        async fn execute(
            &self,
            task: Task,
            _cancel: CancellationToken,
        ) -> Result<WorkerResult, WorkerError> {
            let mut result = WorkerResult::new(self.0, task.id);
            result.success = true;
            Ok(result)
        }
    }

    #[test]
    fn registry_preserves_registration_order() {
        let mut registry = WorkerRegistry::new();
        registry.register(Arc::new(NamedWorker("search", &["search"])));
        registry.register(Arc::new(NamedWorker("code", &["code", "edit"])));
        registry.register(Arc::new(NamedWorker("search", &["search"])));
        assert_eq!(registry.names(), vec!["search", "code"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn registry_filters_by_capability() {
        let mut registry = WorkerRegistry::new();
        registry.register(Arc::new(NamedWorker("search", &["search"])));
        registry.register(Arc::new(NamedWorker("code", &["code", "edit"])));
        assert_eq!(registry.with_capability("edit"), vec!["code"]);
        assert!(registry.with_capability("deploy").is_empty());
    }

    #[tokio::test]
    async fn lookup_and_execute() {
        let mut registry = WorkerRegistry::new();
        registry.register(Arc::new(NamedWorker("code", &["code"])));
        let worker = registry.get("code").unwrap();
        let result = worker
            .execute(Task::new("code", "x"), CancellationToken::new())
            .await
            .unwrap();
        assert!(result.success);
        assert!(registry.get("missing").is_none());
    }
}
