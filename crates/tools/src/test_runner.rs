//! Test run tool: invoke the project's test command and summarise it.
//!
//! The command's combined output is scanned for the usual summary shapes
//! (`12 passed`, `1 failed`, `coverage: 84.2%`) so workers can reason about
//! counts without knowing which runner produced them.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use taskloop_core::error::ToolError;
use taskloop_core::tool::{Tool, ToolResult};
use tracing::{debug, warn};

use crate::shell::shell_command;

static COVERAGE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)coverage[^0-9\n]*([0-9]+(?:\.[0-9]+)?)\s*%").ok());
static PASSED_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+passed").ok());
static FAILED_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+failed").ok());

/// Counts extracted from a test run's output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub passed: u64,
    pub failed: u64,
    pub coverage: Option<f64>,
}

impl TestSummary {
    pub fn total(&self) -> u64 {
        self.passed + self.failed
    }

    /// Parse runner output. Repeated summary lines (one per package) are
    /// summed; for coverage the last reported figure wins.
    pub fn parse(output: &str) -> Self {
        let captures = |re: &Option<Regex>| -> Vec<String> {
            re.iter()
                .flat_map(|re| re.captures_iter(output))
                .filter_map(|c| Some(c.get(1)?.as_str().to_string()))
                .collect()
        };
        let sum = |re: &Option<Regex>| -> u64 {
            captures(re)
                .iter()
                .filter_map(|n| n.parse::<u64>().ok())
                .sum()
        };
        let coverage = captures(&COVERAGE_RE)
            .iter()
            .filter_map(|n| n.parse::<f64>().ok())
            .last();
        Self {
            passed: sum(&PASSED_RE),
            failed: sum(&FAILED_RE),
            coverage,
        }
    }
}

pub struct TestRunTool {
    command: String,
    working_dir: PathBuf,
}

impl TestRunTool {
    pub fn new(command: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: working_dir.into(),
        }
    }
}

#[async_trait]
impl Tool for TestRunTool {
    fn name(&self) -> &str {
        "test_run"
    }

    fn description(&self) -> &str {
        "Run the configured test command and report passed/failed counts and coverage."
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = match arguments["args"].as_str() {
            Some(extra) if !extra.trim().is_empty() => format!("{} {}", self.command, extra.trim()),
            _ => self.command.clone(),
        };

        debug!(command = %command, "Running tests");

        let output = shell_command(&command)
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "test_run".into(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{stdout}\n{stderr}");
        let summary = TestSummary::parse(&combined);
        let code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            warn!(exit_code = code, failed = summary.failed, "Test command failed");
        }

        let result = if output.status.success() {
            ToolResult::ok(combined.trim().to_string())
        } else {
            ToolResult::failed(format!("[exit code: {code}]\n{}", combined.trim()))
        };
        Ok(result.with_data(serde_json::json!({
            "passed": summary.passed,
            "failed": summary.failed,
            "coverage": summary.coverage,
            "exit_code": code,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pytest_style_summary() {
        let out = "===== 12 passed, 1 failed in 0.42s =====\nTOTAL coverage: 84.5%";
        let summary = TestSummary::parse(out);
        assert_eq!(summary.passed, 12);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 13);
        assert_eq!(summary.coverage, Some(84.5));
    }

    #[test]
    fn sums_repeated_lines_and_keeps_last_coverage() {
        let out = "pkg a: 3 passed\ncoverage: 50% of statements\npkg b: 4 passed\ncoverage: 91.0% of statements";
        let summary = TestSummary::parse(out);
        assert_eq!(summary.passed, 7);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.coverage, Some(91.0));
    }

    #[test]
    fn empty_output_has_no_coverage() {
        let summary = TestSummary::parse("nothing to see");
        assert_eq!(summary, TestSummary::default());
    }

    #[tokio::test]
    async fn runs_command_and_reports_data() {
        let tool = TestRunTool::new("echo '5 passed' && echo 'coverage: 88%'", ".");
        let result = tool.execute(serde_json::json!({})).await.unwrap();

        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["passed"], 5);
        assert_eq!(data["failed"], 0);
        assert_eq!(data["coverage"], 88.0);
        assert_eq!(data["exit_code"], 0);
    }

    #[tokio::test]
    async fn failing_command_is_a_failed_result() {
        let tool = TestRunTool::new("echo '2 failed' && exit 1", ".");
        let result = tool.execute(serde_json::json!({})).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.data.unwrap()["failed"], 2);
    }
}
