//! Search worker: locate the files a task is about and prime the cache.
//!
//! 1. Derive a scope from the description (`[workers.search_scopes]`
//!    keyword → subdirectory, whole tree otherwise).
//! 2. Structural scan of file paths under that scope.
//! 3. Only if that finds nothing, a full-text scan.
//! 4. Load the top matches into the context store.
//!
//! Zero matches fails the task without an error.

use async_trait::async_trait;
use std::sync::Arc;

use taskloop_config::WorkersConfig;
use taskloop_context::ContextStore;
use taskloop_context::tokenize::query_tokens;
use taskloop_core::error::WorkerError;
use taskloop_core::task::{Task, WorkerResult};
use taskloop_core::tool::{ToolRegistry, ToolResult};
use taskloop_core::worker::Worker;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct SearchWorker {
    tools: Arc<ToolRegistry>,
    store: Arc<ContextStore>,
    config: WorkersConfig,
}

impl SearchWorker {
    pub fn new(tools: Arc<ToolRegistry>, store: Arc<ContextStore>, config: WorkersConfig) -> Self {
        Self {
            tools,
            store,
            config,
        }
    }

    /// First configured scope whose keyword appears among the terms.
    fn scope_for(&self, terms: &[String]) -> String {
        self.config
            .search_scopes
            .iter()
            .find(|(keyword, _)| terms.iter().any(|t| t == *keyword))
            .map(|(_, dir)| dir.clone())
            .unwrap_or_else(|| ".".to_string())
    }

    async fn scan(
        &self,
        scope: &str,
        terms: &[String],
        mode: &str,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, WorkerError> {
        let args = serde_json::json!({
            "scope": scope,
            "terms": terms,
            "mode": mode,
            "limit": self.config.search_max_files,
        });
        Ok(self.tools.execute("file_search", args, cancel).await?)
    }

    /// Scan `scope`, widening to the whole tree if the scope does not exist.
    async fn scan_scoped(
        &self,
        scope: &str,
        terms: &[String],
        mode: &str,
        cancel: &CancellationToken,
    ) -> Result<(String, Vec<String>), WorkerError> {
        let mut scope = scope.to_string();
        let mut result = self.scan(&scope, terms, mode, cancel).await?;
        if !result.success && scope != "." {
            debug!(scope = %scope, "Scope unavailable, searching whole tree");
            scope = ".".to_string();
            result = self.scan(&scope, terms, mode, cancel).await?;
        }
        Ok((scope, matches_of(&result)))
    }

    /// Read matches into the store; files already cached are left alone.
    async fn load_into_store(&self, paths: &[String], cancel: &CancellationToken) -> usize {
        let mut loaded = 0;
        for path in paths {
            if self.store.contains(path).await {
                continue;
            }
            let read = self
                .tools
                .execute("file_read", serde_json::json!({ "path": path }), cancel)
                .await;
            match read {
                Ok(r) if r.success => match self.store.insert(path.clone(), r.output).await {
                    Ok(()) => loaded += 1,
                    Err(e) => warn!(path = %path, "Not caching search hit: {e}"),
                },
                Ok(r) => debug!(path = %path, "file_read failed: {}", r.output),
                Err(e) => warn!(path = %path, "file_read error: {e}"),
            }
        }
        loaded
    }
}

fn matches_of(result: &ToolResult) -> Vec<String> {
    result
        .data
        .as_ref()
        .and_then(|d| d.get("matches"))
        .and_then(|m| m.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Worker for SearchWorker {
    fn name(&self) -> &str {
        "search"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["search".into(), "discovery".into()]
    }

    async fn execute(
        &self,
        task: Task,
        cancel: CancellationToken,
    ) -> Result<WorkerResult, WorkerError> {
        let mut result = WorkerResult::new(self.name(), &task.id);
        let terms = query_tokens(&task.description, self.store.config().min_query_token_len);
        if terms.is_empty() {
            result.output = "Task description has no searchable terms".into();
            return Ok(result);
        }

        let scope = self.scope_for(&terms);
        result.attempts = 1;
        let (mut scope, mut matches) = self
            .scan_scoped(&scope, &terms, "structural", &cancel)
            .await?;
        let mut mode = "structural";

        if matches.is_empty() {
            debug!(task_id = %task.id, "Structural scan empty, falling back to content scan");
            result.attempts = 2;
            (scope, matches) = self.scan_scoped(&scope, &terms, "content", &cancel).await?;
            mode = "content";
        }

        matches.truncate(self.config.search_max_files);
        if matches.is_empty() {
            result.output = format!("No files matched {:?} under '{scope}'", terms);
            return Ok(result);
        }

        let loaded = self.load_into_store(&matches, &cancel).await;
        info!(
            task_id = %task.id,
            scope = %scope,
            mode,
            matches = matches.len(),
            loaded,
            "Search complete"
        );

        result.success = true;
        result.output = format!("Found {} file(s) under '{scope}' ({mode} scan)", matches.len());
        result.data = serde_json::json!({
            "scope": scope,
            "mode": mode,
            "matches": matches,
            "loaded": loaded,
        });
        result.artifacts = matches;
        Ok(result)
    }
}
