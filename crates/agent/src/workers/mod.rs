//! The built-in workers: search, code and test.
//!
//! Each worker runs its own small gather → act → verify cycle over the
//! shared [`ContextStore`](taskloop_context::ContextStore) and
//! [`ToolRegistry`](taskloop_core::ToolRegistry). A worker that cannot do
//! its job returns `success = false` with an explanation in `output`;
//! `Err` is reserved for tool faults and cancellation.

pub mod code;
pub mod search;

pub use code::CodeWorker;
pub use search::SearchWorker;
pub use test::TestWorker;

use serde::{Deserialize, Serialize};
use taskloop_core::tool::ToolResult;

/// A file produced by a generator tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// Files carried in a generator result's `data`.
///
/// Accepts either `{"files": [{path, content}, ..]}` or a single
/// `{"path", "content"}` object.
pub fn generated_files(result: &ToolResult) -> Vec<GeneratedFile> {
    let Some(data) = &result.data else {
        return Vec::new();
    };
    if let Some(files) = data.get("files") {
        return serde_json::from_value(files.clone()).unwrap_or_default();
    }
    serde_json::from_value::<GeneratedFile>(data.clone())
        .map(|f| vec![f])
        .unwrap_or_default()
}

/// Path heuristic for "this file is already a test".
pub fn is_test_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    let file_name = lower.rsplit('/').next().unwrap_or(&lower);
    let stem = file_name.split('.').next().unwrap_or(file_name);

    lower
        .split('/')
        .any(|dir| matches!(dir, "test" | "tests" | "__tests__" | "spec" | "specs"))
        || stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with("_spec")
        || file_name.contains(".test.")
        || file_name.contains(".spec.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_heuristic() {
        assert!(is_test_path("backend/payment/handlers/wallets_test.go"));
        assert!(is_test_path("tests/e2e.rs"));
        assert!(is_test_path("frontend/src/__tests__/App.tsx"));
        assert!(is_test_path("src/components/Button.test.tsx"));
        assert!(is_test_path("app/test_models.py"));
        assert!(!is_test_path("backend/payment/services/wallet.go"));
        assert!(!is_test_path("src/contest.rs"));
    }

    #[test]
    fn generated_files_accepts_both_shapes() {
        let many = ToolResult::ok("").with_data(serde_json::json!({
            "files": [{ "path": "a.rs", "content": "a" }, { "path": "b.rs", "content": "b" }]
        }));
        assert_eq!(generated_files(&many).len(), 2);

        let one = ToolResult::ok("")
            .with_data(serde_json::json!({ "path": "c.rs", "content": "c" }));
        assert_eq!(
            generated_files(&one),
            vec![GeneratedFile {
                path: "c.rs".into(),
                content: "c".into()
            }]
        );

        assert!(generated_files(&ToolResult::ok("plain")).is_empty());
    }
}
