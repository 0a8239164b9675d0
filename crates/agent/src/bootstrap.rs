//! Wire a ready-to-run orchestrator from [`AppConfig`].

use std::sync::Arc;

use taskloop_config::{AppConfig, WorkersConfig};
use taskloop_context::{ContextStore, IngestReport, ingest_dir};
use taskloop_core::tool::ToolRegistry;
use taskloop_core::worker::WorkerRegistry;
use tracing::info;

use crate::orchestrator::Orchestrator;
use crate::validation::RuleSet;
use crate::workers::{CodeWorker, SearchWorker, TestWorker};

/// Everything a CLI command needs, built once from configuration.
pub struct Runtime {
    pub config: AppConfig,
    pub store: Arc<ContextStore>,
    pub tools: Arc<ToolRegistry>,
    pub orchestrator: Orchestrator,
}

/// The three built-in workers, registered as `search`, `code`, `test`.
pub fn default_workers(
    tools: Arc<ToolRegistry>,
    store: Arc<ContextStore>,
    config: &WorkersConfig,
) -> WorkerRegistry {
    let mut registry = WorkerRegistry::new();
    registry.register(Arc::new(SearchWorker::new(
        tools.clone(),
        store.clone(),
        config.clone(),
    )));
    registry.register(Arc::new(CodeWorker::new(
        tools.clone(),
        store.clone(),
        config.clone(),
    )));
    registry.register(Arc::new(TestWorker::new(tools, store, config.clone())));
    registry
}

impl Runtime {
    pub fn from_config(config: AppConfig) -> Self {
        let store = Arc::new(
            ContextStore::new(config.context.clone())
                .with_compaction(config.orchestrator.enable_compaction),
        );
        let tools = Arc::new(taskloop_tools::default_registry(&config.tools));
        let workers = default_workers(tools.clone(), store.clone(), &config.workers);

        let orchestrator = Orchestrator::new(workers, store.clone(), &config.orchestrator)
            .with_routing(config.routing.clone())
            .with_rule_set(RuleSet::defaults(config.workers.coverage_threshold));

        Self {
            config,
            store,
            tools,
            orchestrator,
        }
    }

    /// Load the workspace into the context store.
    pub async fn prime(&self) -> IngestReport {
        let report = ingest_dir(
            &self.store,
            &self.config.tools.workspace_root,
            self.config.context.max_ingest_file_bytes,
        )
        .await;
        info!(
            root = %self.config.tools.workspace_root.display(),
            files = report.inserted,
            skipped = report.skipped,
            bytes = report.bytes,
            "Workspace primed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_registers_builtin_workers() {
        let runtime = Runtime::from_config(AppConfig::default());
        assert_eq!(
            runtime.orchestrator.workers().names(),
            vec!["search", "code", "test"]
        );
        assert_eq!(
            runtime.orchestrator.required_workers("bugfix"),
            vec!["search", "code", "test"]
        );
        assert_eq!(runtime.orchestrator.required_workers("search"), vec!["search"]);
        assert!(runtime.tools.contains("file_search"));
    }

    #[tokio::test]
    async fn prime_ingests_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wallet.rs"), "pub struct Wallet;").unwrap();

        let mut config = AppConfig::default();
        config.tools.workspace_root = dir.path().to_path_buf();
        let runtime = Runtime::from_config(config);

        let report = runtime.prime().await;
        assert_eq!(report.inserted, 1);
        assert_eq!(runtime.store.search_ids("wallet").await, vec!["wallet.rs"]);
    }
}
