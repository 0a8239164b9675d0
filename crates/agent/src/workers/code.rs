//! Code worker: generate source changes and reject unfinished output.
//!
//! Each internal attempt gathers related files from the context store,
//! invokes the `code_generate` tool with that context, and rejects the whole
//! generation if any file still carries an unresolved marker (`TODO`,
//! `FIXME`, ...). A rejected attempt is fed back into the next one. Accepted
//! files are written through `file_write` and cached.

use async_trait::async_trait;
use std::sync::Arc;

use taskloop_config::WorkersConfig;
use taskloop_context::ContextStore;
use taskloop_core::error::WorkerError;
use taskloop_core::task::{Task, WorkerResult};
use taskloop_core::tool::ToolRegistry;
use taskloop_core::worker::Worker;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{GeneratedFile, generated_files};

/// Relevance added to files that fed an accepted generation.
const USED_CONTEXT_BOOST: f64 = 1.0;

pub struct CodeWorker {
    tools: Arc<ToolRegistry>,
    store: Arc<ContextStore>,
    config: WorkersConfig,
}

impl CodeWorker {
    pub fn new(tools: Arc<ToolRegistry>, store: Arc<ContextStore>, config: WorkersConfig) -> Self {
        Self {
            tools,
            store,
            config,
        }
    }

    /// Ids gathered by the orchestrator first, then the store's own ranking.
    async fn related_files(&self, task: &Task) -> Vec<String> {
        let mut related = task.gathered_context();
        for id in self.store.search_ids(&task.description).await {
            if !related.contains(&id) {
                related.push(id);
            }
        }
        related.truncate(self.config.search_max_files);
        related
    }

    /// `(path, marker)` for every generated file holding an unresolved marker.
    fn unresolved(&self, files: &[GeneratedFile]) -> Vec<(String, String)> {
        files
            .iter()
            .filter_map(|f| {
                self.config
                    .unresolved_markers
                    .iter()
                    .find(|m| f.content.contains(m.as_str()))
                    .map(|m| (f.path.clone(), m.clone()))
            })
            .collect()
    }

    async fn write_files(
        &self,
        files: &[GeneratedFile],
        cancel: &CancellationToken,
    ) -> Result<Option<String>, WorkerError> {
        for file in files {
            let written = self
                .tools
                .execute(
                    "file_write",
                    serde_json::json!({ "path": file.path, "content": file.content }),
                    cancel,
                )
                .await?;
            if !written.success {
                return Ok(Some(format!("Could not write {}: {}", file.path, written.output)));
            }
            if let Err(e) = self.store.insert(file.path.clone(), file.content.clone()).await {
                warn!(path = %file.path, "Generated file not cached: {e}");
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Worker for CodeWorker {
    fn name(&self) -> &str {
        "code"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["code".into(), "generation".into()]
    }

    async fn execute(
        &self,
        task: Task,
        cancel: CancellationToken,
    ) -> Result<WorkerResult, WorkerError> {
        let mut result = WorkerResult::new(self.name(), &task.id);
        let mut feedback = task.feedback().map(str::to_string);
        let mut previous_attempt = serde_json::Value::Null;

        for attempt in 1..=self.config.code_max_attempts.max(1) {
            if cancel.is_cancelled() {
                return Err(WorkerError::Cancelled(self.name().to_string()));
            }
            result.attempts = attempt;

            // Gather
            let related = self.related_files(&task).await;
            let mut context = Vec::with_capacity(related.len());
            for id in &related {
                if let Some(resource) = self.store.get(id).await {
                    context.push(serde_json::json!({ "path": id, "content": resource.content }));
                }
            }

            // Act
            let args = serde_json::json!({
                "task_id": task.id,
                "kind": task.kind,
                "description": task.description,
                "attempt": attempt,
                "context": context,
                "previous_attempt": previous_attempt,
                "feedback": feedback,
            });
            let generated = self.tools.execute("code_generate", args, &cancel).await?;
            if !generated.success {
                feedback = Some(format!("Generator failed: {}", generated.output));
                previous_attempt = serde_json::Value::Null;
                continue;
            }

            // Verify
            let files = generated_files(&generated);
            if files.is_empty() {
                feedback = Some("Generator returned no files".into());
                continue;
            }
            let unresolved = self.unresolved(&files);
            if !unresolved.is_empty() {
                let listed: Vec<String> = unresolved
                    .iter()
                    .map(|(path, marker)| format!("{path} ({marker})"))
                    .collect();
                debug!(task_id = %task.id, attempt, "Rejected generation with unresolved markers");
                feedback = Some(format!(
                    "Generated files still contain unresolved markers: {}",
                    listed.join(", ")
                ));
                previous_attempt = serde_json::to_value(&files).unwrap_or_default();
                continue;
            }

            if let Some(problem) = self.write_files(&files, &cancel).await? {
                feedback = Some(problem);
                previous_attempt = serde_json::to_value(&files).unwrap_or_default();
                continue;
            }

            for id in &related {
                self.store.boost(id, USED_CONTEXT_BOOST).await;
            }

            let paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
            info!(task_id = %task.id, attempt, files = paths.len(), "Generation accepted");
            result.success = true;
            result.output = format!("Generated {} file(s) on attempt {attempt}", paths.len());
            result.data = serde_json::json!({ "files": paths, "context": related });
            result.artifacts = paths;
            return Ok(result);
        }

        result.output = feedback.unwrap_or_else(|| "Code generation did not converge".into());
        Ok(result)
    }
}
