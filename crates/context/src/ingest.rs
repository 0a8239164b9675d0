//! Prime a context store from a directory tree.

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::store::ContextStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub inserted: usize,
    pub skipped: usize,
    pub bytes: usize,
}

/// Workspace-relative, `/`-separated identifier for `path`.
pub fn resource_id(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn workspace_files(root: &Path) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(root);
    builder.hidden(true);
    builder.follow_links(false);
    builder.require_git(false);

    let mut out = Vec::new();
    for entry in builder.build() {
        let Ok(entry) = entry else {
            continue;
        };
        if entry.file_type().is_some_and(|ft| ft.is_file()) {
            out.push(entry.into_path());
        }
    }
    out.sort();
    out
}

/// Walk `root` (honouring `.gitignore`) and cache every UTF-8 file no larger
/// than `max_file_bytes`. Files the store rejects for capacity are skipped.
pub async fn ingest_dir(
    store: &ContextStore,
    root: &Path,
    max_file_bytes: usize,
) -> IngestReport {
    let mut report = IngestReport::default();

    for path in workspace_files(root) {
        let too_large = tokio::fs::metadata(&path)
            .await
            .map(|m| m.len() > max_file_bytes as u64)
            .unwrap_or(true);
        if too_large {
            report.skipped += 1;
            continue;
        }

        // Non-UTF-8 content is treated as binary and skipped.
        let Ok(content) = tokio::fs::read_to_string(&path).await else {
            report.skipped += 1;
            continue;
        };

        let id = resource_id(root, &path);
        let size = content.len();
        match store.insert(id.clone(), content).await {
            Ok(()) => {
                report.inserted += 1;
                report.bytes += size;
            }
            Err(e) => {
                warn!(id = %id, "Skipping file during ingest: {e}");
                report.skipped += 1;
            }
        }
    }

    debug!(
        root = %root.display(),
        inserted = report.inserted,
        skipped = report.skipped,
        "Ingested directory"
    );
    report
}
