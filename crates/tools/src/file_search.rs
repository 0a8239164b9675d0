//! File search tool: scan the workspace for files by name or by content.
//!
//! Two modes:
//! - `structural`: a term matches when it appears in the workspace-relative
//!   path (directory names included).
//! - `content`: a term matches when it appears in the file body.
//!
//! Matching is case-insensitive. Files are ranked by the number of distinct
//! terms they match, ties broken by path. `.gitignore` is honoured and the
//! sandbox's forbidden prefixes are never reported.

use async_trait::async_trait;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use taskloop_core::error::ToolError;
use taskloop_core::tool::{Tool, ToolResult};
use tracing::debug;

use crate::sandbox::Workspace;

const DEFAULT_LIMIT: usize = 50;
const MAX_CONTENT_SCAN_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Structural,
    Content,
}

impl SearchMode {
    fn parse(raw: Option<&str>) -> Result<Self, ToolError> {
        match raw.unwrap_or("structural") {
            "structural" => Ok(Self::Structural),
            "content" => Ok(Self::Content),
            other => Err(ToolError::InvalidArguments(format!(
                "Unknown search mode '{other}' (expected 'structural' or 'content')"
            ))),
        }
    }
}

pub struct FileSearchTool {
    workspace: Workspace,
}

impl FileSearchTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

fn parse_terms(arguments: &serde_json::Value) -> Vec<String> {
    let mut terms: Vec<String> = match &arguments["terms"] {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_lowercase())
            .collect(),
        serde_json::Value::String(s) => s.split_whitespace().map(|t| t.to_lowercase()).collect(),
        _ => Vec::new(),
    };
    terms.retain(|t| !t.is_empty());
    terms.sort();
    terms.dedup();
    terms
}

fn count_hits(haystack: &str, terms: &[String]) -> usize {
    let haystack = haystack.to_lowercase();
    terms.iter().filter(|t| haystack.contains(t.as_str())).count()
}

fn scan(
    workspace: &Workspace,
    scope: &Path,
    terms: &[String],
    mode: SearchMode,
    limit: usize,
) -> Vec<(String, usize)> {
    let mut builder = WalkBuilder::new(scope);
    builder.hidden(true);
    builder.follow_links(false);
    builder.require_git(false);

    let mut hits = Vec::new();
    for entry in builder.build() {
        let Ok(entry) = entry else {
            continue;
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let Some(path) = entry.path().to_str() else {
            continue;
        };
        // Re-validating through the sandbox drops forbidden paths.
        let Ok(rel) = workspace.relative(path) else {
            continue;
        };

        let score = match mode {
            SearchMode::Structural => count_hits(&rel, terms),
            SearchMode::Content => {
                let small_enough = entry
                    .metadata()
                    .map(|m| m.len() <= MAX_CONTENT_SCAN_BYTES)
                    .unwrap_or(false);
                if !small_enough {
                    continue;
                }
                match std::fs::read_to_string(entry.path()) {
                    Ok(body) => count_hits(&body, terms),
                    Err(_) => continue,
                }
            }
        };
        if score > 0 {
            hits.push((rel, score));
        }
    }

    hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    hits.truncate(limit);
    hits
}

#[async_trait]
impl Tool for FileSearchTool {
    fn name(&self) -> &str {
        "file_search"
    }

    fn description(&self) -> &str {
        "Find workspace files whose path (structural mode) or content (content mode) matches the given terms."
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let terms = parse_terms(&arguments);
        if terms.is_empty() {
            return Err(ToolError::InvalidArguments(
                "Missing or empty 'terms' argument".into(),
            ));
        }
        let mode = SearchMode::parse(arguments["mode"].as_str())?;
        let limit = arguments["limit"]
            .as_u64()
            .map(|l| l as usize)
            .unwrap_or(DEFAULT_LIMIT);
        let scope_arg = arguments["scope"].as_str().unwrap_or(".").to_string();

        let scope = self
            .workspace
            .resolve_dir(&scope_arg)
            .map_err(|e| ToolError::PermissionDenied {
                tool_name: "file_search".into(),
                reason: e.to_string(),
            })?;
        if !scope.is_dir() {
            return Ok(ToolResult::failed(format!(
                "Scope '{scope_arg}' is not a directory"
            )));
        }

        debug!(scope = %scope_arg, ?mode, terms = ?terms, "Scanning workspace");

        let workspace = self.workspace.clone();
        let hits = tokio::task::spawn_blocking(move || scan(&workspace, &scope, &terms, mode, limit))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "file_search".into(),
                reason: e.to_string(),
            })?;

        let matches: Vec<String> = hits.into_iter().map(|(path, _)| path).collect();
        let output = if matches.is_empty() {
            "No matching files".to_string()
        } else {
            matches.join("\n")
        };

        Ok(ToolResult::ok(output).with_data(serde_json::json!({
            "matches": matches,
            "mode": mode,
            "scope": scope_arg,
        })))
    }
}
