//! External command tool: delegate a capability to any executable.
//!
//! The tool arguments are written to the command's stdin as JSON. If the
//! command prints a JSON document on stdout it becomes the result's `data`
//! (and an optional top-level `"success": false` marks the result failed);
//! otherwise stdout is returned as plain output.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use taskloop_core::error::ToolError;
use taskloop_core::tool::{Tool, ToolResult};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::shell::shell_command;

pub struct ExternalCommandTool {
    name: String,
    description: String,
    command: String,
    working_dir: PathBuf,
}

impl ExternalCommandTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        command: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            command: command.into(),
            working_dir: working_dir.into(),
        }
    }

    fn exec_error(&self, reason: impl ToString) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Tool for ExternalCommandTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let payload = serde_json::to_vec(&arguments).map_err(|e| self.exec_error(e))?;

        debug!(tool = %self.name, command = %self.command, bytes = payload.len(), "Invoking external command");

        let mut child = shell_command(&self.command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.exec_error(e))?;

        // Feed stdin while draining stdout/stderr; a command that echoes its
        // input would otherwise block on a full pipe.
        let stdin = child.stdin.take();
        let feed = async {
            if let Some(mut stdin) = stdin {
                // A command that ignores its input may close stdin early.
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!(tool = %self.name, "stdin closed early: {e}");
                }
            }
        };
        let ((), output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(|e| self.exec_error(e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!(tool = %self.name, exit_code = code, "External command failed");
            return Ok(ToolResult::failed(format!("[exit code: {code}]\n{stdout}\n{stderr}")));
        }

        match serde_json::from_str::<serde_json::Value>(&stdout) {
            Ok(data) => {
                let success = data
                    .get("success")
                    .and_then(|s| s.as_bool())
                    .unwrap_or(true);
                let text = data
                    .get("output")
                    .and_then(|o| o.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| stdout.clone());
                let result = if success {
                    ToolResult::ok(text)
                } else {
                    ToolResult::failed(text)
                };
                Ok(result.with_data(data))
            }
            Err(_) => Ok(ToolResult::ok(stdout)),
        }
    }
}
