//! Built-in tool implementations for taskloop.
//!
//! Tools give workers the ability to interact with the workspace:
//! run shell commands, read/write and search files, run the test suite,
//! and delegate code or test generation to external commands.
//!
//! Every file-touching tool shares one [`sandbox::Workspace`], so paths
//! outside the configured root or under a forbidden prefix are refused.

pub mod external;
pub mod file_read;
pub mod file_search;
pub mod file_write;
pub mod sandbox;
pub mod shell;
pub mod test_runner;

use taskloop_config::ToolsConfig;
use taskloop_core::tool::ToolRegistry;

pub use external::ExternalCommandTool;
pub use file_read::FileReadTool;
pub use file_search::{FileSearchTool, SearchMode};
pub use file_write::FileWriteTool;
pub use sandbox::{SandboxError, Workspace};
pub use shell::ShellTool;
pub use test_runner::{TestRunTool, TestSummary};

/// Create the default tool registry from configuration.
///
/// `shell`, `file_read`, `file_write` and `file_search` are always present.
/// `code_generate`, `test_generate` and `test_run` are only registered when
/// the matching command is configured.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let workspace = Workspace::new(&config.workspace_root, config.forbidden_paths.clone());
    let root = workspace.root().to_path_buf();

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ShellTool::new(
        config.allowed_commands.clone(),
        root.clone(),
    )));
    registry.register(Box::new(FileReadTool::new(workspace.clone())));
    registry.register(Box::new(FileWriteTool::new(workspace.clone())));
    registry.register(Box::new(FileSearchTool::new(workspace)));

    if let Some(cmd) = &config.code_generator {
        registry.register(Box::new(ExternalCommandTool::new(
            "code_generate",
            "Generate source files for a task from related context (external command).",
            cmd.clone(),
            root.clone(),
        )));
    }
    if let Some(cmd) = &config.test_generator {
        registry.register(Box::new(ExternalCommandTool::new(
            "test_generate",
            "Generate a test file for one source file (external command).",
            cmd.clone(),
            root.clone(),
        )));
    }
    if let Some(cmd) = &config.test_runner {
        registry.register(Box::new(TestRunTool::new(cmd.clone(), root)));
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_core_tools() {
        let registry = default_registry(&ToolsConfig::default());
        assert_eq!(
            registry.names(),
            vec!["file_read", "file_search", "file_write", "shell"]
        );
    }

    #[test]
    fn configured_commands_register_extra_tools() {
        let config = ToolsConfig {
            code_generator: Some("gen-code".into()),
            test_generator: Some("gen-test".into()),
            test_runner: Some("cargo test".into()),
            ..ToolsConfig::default()
        };
        let registry = default_registry(&config);
        assert_eq!(registry.len(), 7);
        assert!(registry.contains("code_generate"));
        assert!(registry.contains("test_generate"));
        assert!(registry.contains("test_run"));
    }
}
