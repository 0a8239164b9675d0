//! Error types for the taskloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all taskloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Worker errors ---
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    // --- Context store errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// A tool's own error, wrapped by the registry with the tool name.
    #[error("Tool '{tool_name}' failed: {source}")]
    Failed {
        tool_name: String,
        #[source]
        source: Box<ToolError>,
    },

    #[error("Tool cancelled: {0}")]
    Cancelled(String),
}

impl ToolError {
    /// True when the failure was caused by cancellation rather than the tool.
    pub fn is_cancelled(&self) -> bool {
        match self {
            ToolError::Cancelled(_) => true,
            ToolError::Failed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Worker not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Worker {worker} failed: {reason}")]
    Failed { worker: String, reason: String },

    #[error("Worker {worker} timed out after {timeout_secs}s")]
    Timeout { worker: String, timeout_secs: u64 },

    #[error("Worker cancelled: {0}")]
    Cancelled(String),
}

impl WorkerError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            WorkerError::Cancelled(_) => true,
            WorkerError::Tool(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ContextError {
    #[error(
        "Context store over capacity: '{id}' needs {requested} bytes, {available} of {capacity} available"
    )]
    OverCapacity {
        id: String,
        requested: usize,
        available: usize,
        capacity: usize,
    },

    #[error("Resource identifier must not be empty")]
    EmptyIdentifier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::PermissionDenied {
            tool_name: "shell".into(),
            reason: "command not in allowlist".into(),
        });
        assert!(err.to_string().contains("shell"));
        assert!(err.to_string().contains("allowlist"));
    }

    #[test]
    fn wrapped_tool_error_names_the_tool() {
        let err = ToolError::Failed {
            tool_name: "code_generate".into(),
            source: Box::new(ToolError::InvalidArguments("missing 'task'".into())),
        };
        let text = err.to_string();
        assert!(text.contains("code_generate"));
        assert!(text.contains("missing 'task'"));
    }

    #[test]
    fn cancellation_is_detected_through_wrapping() {
        let err = WorkerError::Tool(ToolError::Failed {
            tool_name: "shell".into(),
            source: Box::new(ToolError::Cancelled("shell".into())),
        });
        assert!(err.is_cancelled());
        assert!(!WorkerError::NotFound("code".into()).is_cancelled());
    }

    #[test]
    fn over_capacity_reports_sizes() {
        let err = ContextError::OverCapacity {
            id: "src/lib.rs".into(),
            requested: 20,
            available: 10,
            capacity: 100,
        };
        let text = err.to_string();
        assert!(text.contains("src/lib.rs"));
        assert!(text.contains("20"));
        assert!(text.contains("100"));
    }
}
