//! CLI subcommands.

pub mod init;
pub mod run;
pub mod search;
pub mod tools;

use std::path::PathBuf;
use taskloop_config::AppConfig;

/// Options shared by every subcommand.
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub workspace: Option<PathBuf>,
}

impl GlobalOpts {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
    }

    /// Load configuration, honouring `--config` and `--workspace`.
    pub fn load_config(&self) -> Result<AppConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load_from(path),
            None => AppConfig::load(),
        }
        .map_err(|e| format!("Failed to load config: {e}"))?;

        if let Some(root) = &self.workspace {
            config.tools.workspace_root = root.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_path_wins() {
        let opts = GlobalOpts {
            config: Some(PathBuf::from("/tmp/custom.toml")),
            workspace: None,
        };
        assert_eq!(opts.config_path(), PathBuf::from("/tmp/custom.toml"));
    }

    #[test]
    fn workspace_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let opts = GlobalOpts {
            config: Some(dir.path().join("missing.toml")),
            workspace: Some(PathBuf::from("/srv/project")),
        };
        let config = opts.load_config().unwrap();
        assert_eq!(config.tools.workspace_root, PathBuf::from("/srv/project"));
    }
}
