//! File read tool: read file contents with workspace validation.

use async_trait::async_trait;
use taskloop_core::error::ToolError;
use taskloop_core::tool::{Tool, ToolResult};

use crate::sandbox::Workspace;

pub struct FileReadTool {
    workspace: Workspace,
}

impl FileReadTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a workspace file."
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let rel = self
            .workspace
            .relative(path)
            .map_err(|e| ToolError::PermissionDenied {
                tool_name: "file_read".into(),
                reason: e.to_string(),
            })?;

        match tokio::fs::read_to_string(self.workspace.root().join(&rel)).await {
            Ok(content) => {
                let bytes = content.len();
                Ok(ToolResult::ok(content)
                    .with_data(serde_json::json!({ "path": rel, "bytes": bytes })))
            }
            Err(e) => Ok(ToolResult::failed(format!("Failed to read file: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.txt"), "Hello, world!\n").unwrap();

        let tool = FileReadTool::new(Workspace::new(dir.path(), vec![]));
        let result = tool
            .execute(serde_json::json!({ "path": "test.txt" }))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("Hello, world!"));
        assert_eq!(result.data.unwrap()["path"], "test.txt");
    }

    #[tokio::test]
    async fn read_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileReadTool::new(Workspace::new(dir.path(), vec![]));
        let result = tool
            .execute(serde_json::json!({ "path": "missing.txt" }))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.output.contains("Failed to read file"));
    }

    #[tokio::test]
    async fn missing_path_argument() {
        let tool = FileReadTool::new(Workspace::new(".", vec![]));
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn path_traversal_blocked() {
        let tool = FileReadTool::new(Workspace::new(".", vec![]));
        let result = tool
            .execute(serde_json::json!({ "path": "../../../etc/passwd" }))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn forbidden_path_blocked() {
        let tool = FileReadTool::new(Workspace::new(".", vec![".env".into()]));
        let result = tool.execute(serde_json::json!({ "path": ".env" })).await;
        assert!(result.is_err());
    }
}
