//! Configuration loading, validation, and management for taskloop.
//!
//! Loads configuration from `~/.taskloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.taskloop/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Iteration loop and delegation settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Context store sizing, search, and eviction tuning
    #[serde(default)]
    pub context: ContextConfig,

    /// Per-role worker settings
    #[serde(default)]
    pub workers: WorkersConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Task type → ordered worker names
    #[serde(default = "default_routing")]
    pub routing: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_max_parallel_workers")]
    pub max_parallel_workers: usize,

    /// Upper bound on a single worker execution. 0 disables the bound.
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub enable_compaction: bool,
}

fn default_max_iterations() -> u32 {
    5
}
fn default_max_parallel_workers() -> usize {
    3
}
fn default_operation_timeout_secs() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_parallel_workers: default_max_parallel_workers(),
            operation_timeout_secs: default_operation_timeout_secs(),
            enable_compaction: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: usize,

    /// Utilisation at which compaction becomes due
    #[serde(default = "default_trigger_ratio")]
    pub compaction_trigger_ratio: f64,

    /// Utilisation compaction evicts down to
    #[serde(default = "default_target_ratio")]
    pub compaction_target_ratio: f64,

    /// Content tokens must be longer than this to be indexed
    #[serde(default = "default_min_index_token_len")]
    pub min_index_token_len: usize,

    /// Query tokens must be longer than this to be kept
    #[serde(default = "default_min_query_token_len")]
    pub min_query_token_len: usize,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Structural matches below this count are supplemented by index lookup
    #[serde(default = "default_structural_match_floor")]
    pub structural_match_floor: usize,

    /// Files larger than this are skipped during directory ingestion
    #[serde(default = "default_max_ingest_file_bytes")]
    pub max_ingest_file_bytes: usize,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    /// Keyword class → canonical path prefixes for structural search
    #[serde(default = "default_structural_classes")]
    pub structural_classes: BTreeMap<String, Vec<String>>,
}

fn default_capacity_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_trigger_ratio() -> f64 {
    0.8
}
fn default_target_ratio() -> f64 {
    0.7
}
fn default_min_index_token_len() -> usize {
    3
}
fn default_min_query_token_len() -> usize {
    2
}
fn default_max_results() -> usize {
    20
}
fn default_structural_match_floor() -> usize {
    5
}
fn default_max_ingest_file_bytes() -> usize {
    256 * 1024
}

fn default_structural_classes() -> BTreeMap<String, Vec<String>> {
    let class = |prefixes: &[&str]| prefixes.iter().map(|p| p.to_string()).collect::<Vec<_>>();
    BTreeMap::from([
        ("test".into(), class(&["tests/", "test/", "__tests__/", "spec/"])),
        (
            "component".into(),
            class(&["components/", "src/components/", "frontend/src/components/"]),
        ),
        ("service".into(), class(&["services/", "src/services/", "backend/services/"])),
        ("model".into(), class(&["models/", "src/models/", "backend/models/"])),
        ("api".into(), class(&["api/", "src/api/", "handlers/", "routes/"])),
        ("config".into(), class(&["config/", "configs/", ".config/"])),
    ])
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: default_capacity_bytes(),
            compaction_trigger_ratio: default_trigger_ratio(),
            compaction_target_ratio: default_target_ratio(),
            min_index_token_len: default_min_index_token_len(),
            min_query_token_len: default_min_query_token_len(),
            max_results: default_max_results(),
            structural_match_floor: default_structural_match_floor(),
            max_ingest_file_bytes: default_max_ingest_file_bytes(),
            scoring: ScoringConfig::default(),
            retention: RetentionConfig::default(),
            structural_classes: default_structural_classes(),
        }
    }
}

impl ContextConfig {
    /// A config with the given capacity and every other setting defaulted.
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            ..Self::default()
        }
    }
}

/// Search relevance weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Per query token found anywhere in the path
    #[serde(default = "default_path_match")]
    pub path_match: f64,

    /// Additional bonus when the token is in the file name
    #[serde(default = "default_filename_match")]
    pub filename_match: f64,

    /// Multiplier on the cached access count
    #[serde(default = "default_access_weight")]
    pub access_weight: f64,

    /// Subtracted per directory level
    #[serde(default = "default_depth_penalty")]
    pub depth_penalty: f64,
}

fn default_path_match() -> f64 {
    10.0
}
fn default_filename_match() -> f64 {
    20.0
}
fn default_access_weight() -> f64 {
    2.0
}
fn default_depth_penalty() -> f64 {
    0.5
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            path_match: default_path_match(),
            filename_match: default_filename_match(),
            access_weight: default_access_weight(),
            depth_penalty: default_depth_penalty(),
        }
    }
}

/// Compaction retention score: `access_weight × accesses + relevance − size / size_divisor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_access_weight")]
    pub access_weight: f64,

    #[serde(default = "default_size_divisor")]
    pub size_divisor: f64,
}

fn default_retention_access_weight() -> f64 {
    10.0
}
fn default_size_divisor() -> f64 {
    1000.0
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            access_weight: default_retention_access_weight(),
            size_divisor: default_size_divisor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    /// Internal generate/verify attempts for the code worker
    #[serde(default = "default_code_max_attempts")]
    pub code_max_attempts: u32,

    /// Generated content containing any of these is rejected
    #[serde(default = "default_unresolved_markers")]
    pub unresolved_markers: Vec<String>,

    /// Minimum coverage percentage the test worker accepts
    #[serde(default = "default_coverage_threshold")]
    pub coverage_threshold: f64,

    /// How many located files the search worker loads into the context store
    #[serde(default = "default_search_max_files")]
    pub search_max_files: usize,

    /// Query keyword → subdirectory the search worker scopes to
    #[serde(default = "default_search_scopes")]
    pub search_scopes: BTreeMap<String, String>,
}

fn default_code_max_attempts() -> u32 {
    3
}
fn default_unresolved_markers() -> Vec<String> {
    vec!["TODO".into(), "FIXME".into()]
}
fn default_coverage_threshold() -> f64 {
    80.0
}
fn default_search_max_files() -> usize {
    10
}
fn default_search_scopes() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("frontend".into(), "frontend".into()),
        ("ui".into(), "frontend".into()),
        ("component".into(), "frontend".into()),
        ("backend".into(), "backend".into()),
        ("api".into(), "backend".into()),
        ("handler".into(), "backend".into()),
        ("docs".into(), "docs".into()),
    ])
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            code_max_attempts: default_code_max_attempts(),
            unresolved_markers: default_unresolved_markers(),
            coverage_threshold: default_coverage_threshold(),
            search_max_files: default_search_max_files(),
            search_scopes: default_search_scopes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Root the file tools are sandboxed to and searches start from
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// If non-empty, the shell tool only runs these base commands
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,

    /// Path prefixes the file tools refuse to touch
    #[serde(default = "default_forbidden_paths")]
    pub forbidden_paths: Vec<String>,

    /// Shell command backing the `code_generate` tool (JSON on stdin/stdout)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_generator: Option<String>,

    /// Shell command backing the `test_generate` tool (JSON on stdin/stdout)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_generator: Option<String>,

    /// Shell command backing the `test_run` tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_runner: Option<String>,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_allowed_commands() -> Vec<String> {
    [
        "ls", "cat", "head", "tail", "echo", "pwd", "wc", "grep", "find", "git", "cargo",
        "go", "npm", "node", "python", "pytest",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

fn default_forbidden_paths() -> Vec<String> {
    vec![".git/".into(), ".env".into()]
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            allowed_commands: default_allowed_commands(),
            forbidden_paths: default_forbidden_paths(),
            code_generator: None,
            test_generator: None,
            test_runner: None,
        }
    }
}

fn default_routing() -> BTreeMap<String, Vec<String>> {
    let route = |workers: &[&str]| workers.iter().map(|w| w.to_string()).collect::<Vec<_>>();
    BTreeMap::from([
        ("search".into(), route(&["search"])),
        ("code".into(), route(&["search", "code"])),
        ("feature".into(), route(&["search", "code"])),
        ("test".into(), route(&["search", "test"])),
        ("bugfix".into(), route(&["search", "code", "test"])),
        ("refactor".into(), route(&["search", "code", "test"])),
    ])
}

impl AppConfig {
    /// Load configuration from the default path (~/.taskloop/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `TASKLOOP_MAX_ITERATIONS`
    /// - `TASKLOOP_MAX_PARALLEL`
    /// - `TASKLOOP_CONTEXT_CAPACITY`
    /// - `TASKLOOP_WORKSPACE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_parse::<u32>("TASKLOOP_MAX_ITERATIONS")? {
            self.orchestrator.max_iterations = v;
        }
        if let Some(v) = env_parse::<usize>("TASKLOOP_MAX_PARALLEL")? {
            self.orchestrator.max_parallel_workers = v;
        }
        if let Some(v) = env_parse::<usize>("TASKLOOP_CONTEXT_CAPACITY")? {
            self.context.capacity_bytes = v;
        }
        if let Ok(root) = std::env::var("TASKLOOP_WORKSPACE") {
            self.tools.workspace_root = PathBuf::from(root);
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".taskloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_iterations must be at least 1".into(),
            ));
        }
        if self.orchestrator.max_parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_parallel_workers must be at least 1".into(),
            ));
        }

        let ctx = &self.context;
        if ctx.capacity_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "context.capacity_bytes must be > 0".into(),
            ));
        }
        if !(ctx.compaction_target_ratio > 0.0
            && ctx.compaction_target_ratio < ctx.compaction_trigger_ratio
            && ctx.compaction_trigger_ratio <= 1.0)
        {
            return Err(ConfigError::ValidationError(
                "context ratios must satisfy 0 < compaction_target_ratio < compaction_trigger_ratio <= 1"
                    .into(),
            ));
        }
        if ctx.max_results == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_results must be at least 1".into(),
            ));
        }
        if ctx.retention.size_divisor <= 0.0 {
            return Err(ConfigError::ValidationError(
                "context.retention.size_divisor must be > 0".into(),
            ));
        }

        if self.workers.code_max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "workers.code_max_attempts must be at least 1".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.workers.coverage_threshold) {
            return Err(ConfigError::ValidationError(
                "workers.coverage_threshold must be between 0 and 100".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            context: ContextConfig::default(),
            workers: WorkersConfig::default(),
            tools: ToolsConfig::default(),
            routing: default_routing(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::ValidationError(format!("{key} has an invalid value: '{raw}'"))
        }),
        Err(_) => Ok(None),
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.orchestrator.max_iterations, 5);
        assert_eq!(config.context.compaction_trigger_ratio, 0.8);
        assert_eq!(config.context.compaction_target_ratio, 0.7);
        assert_eq!(config.context.max_results, 20);
        assert_eq!(config.workers.code_max_attempts, 3);
        assert_eq!(config.workers.coverage_threshold, 80.0);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.context.capacity_bytes, config.context.capacity_bytes);
        assert_eq!(parsed.routing, config.routing);
    }

    #[test]
    fn inverted_ratios_rejected() {
        let mut config = AppConfig::default();
        config.context.compaction_target_ratio = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_parallelism_rejected() {
        let mut config = AppConfig::default();
        config.orchestrator.max_parallel_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.orchestrator.max_parallel_workers, 3);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[orchestrator]
max_iterations = 2

[context.scoring]
filename_match = 35.0

[routing]
docs = ["search"]
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.orchestrator.max_iterations, 2);
        assert!(config.orchestrator.enable_compaction);
        assert_eq!(config.context.scoring.filename_match, 35.0);
        assert_eq!(config.context.scoring.path_match, 10.0);
        assert_eq!(config.routing["docs"], vec!["search"]);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[orchestrator\nmax_iterations = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("max_iterations"));
        assert!(toml_str.contains("compaction_trigger_ratio"));
    }
}
