/// Configuration for the vaultkeep agent.
/// Reads config.json from ~/.config/vaultkeep/config.json (or platform equivalent),
/// or from the path given on the command line.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use vaultkeep_core::config::{ParaFolders, VaultConfig};

/// Environment variable that overrides `vault_path`.
pub const VAULT_PATH_ENV: &str = "VAULTKEEP_VAULT_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub vault_path: Option<PathBuf>,
    #[serde(default)]
    pub para_folders: ParaFolders,
    #[serde(default)]
    pub exclude_folders: Option<Vec<String>>,
    #[serde(default)]
    pub daily_notes_folder: Option<String>,
    /// Lookback window for `folder_stats` when a request omits it.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

fn default_lookback_days() -> u32 {
    7
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            vault_path: None,
            para_folders: ParaFolders::default(),
            exclude_folders: None,
            daily_notes_folder: None,
            lookback_days: default_lookback_days(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no vault configured: set vault_path in {config} or {env}")]
    MissingVaultPath { config: String, env: &'static str },

    #[error("vault path {0} does not exist or is not a directory")]
    VaultNotFound(PathBuf),
}

impl AgentConfig {
    /// Resolve the vault configuration. `env_vault_path` wins over the file.
    pub fn into_vault_config(
        self,
        config_path: &Path,
        env_vault_path: Option<PathBuf>,
    ) -> Result<VaultConfig, ConfigError> {
        let vault_path = env_vault_path
            .or(self.vault_path)
            .ok_or_else(|| ConfigError::MissingVaultPath {
                config: config_path.display().to_string(),
                env: VAULT_PATH_ENV,
            })?;
        if !vault_path.is_dir() {
            return Err(ConfigError::VaultNotFound(vault_path));
        }

        let mut config = VaultConfig::new(vault_path);
        config.para_folders = self.para_folders;
        if let Some(exclude) = self.exclude_folders {
            config.exclude_folders = exclude;
        }
        if let Some(daily) = self.daily_notes_folder {
            config.daily_notes_folder = daily;
        }
        Ok(config)
    }
}

/// Default config path: ~/.config/vaultkeep/config.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vaultkeep")
        .join("config.json")
}

/// Load config from path. Returns default if the file doesn't exist or can't be parsed.
pub fn load_config(path: &Path) -> AgentConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("[vaultkeep.agent] Failed to parse config {}: {}", path.display(), e);
            AgentConfig::default()
        }),
        Err(_) => {
            log::info!("[vaultkeep.agent] No config at {}, using defaults", path.display());
            AgentConfig::default()
        }
    }
}

/// `VAULTKEEP_VAULT_PATH`, ignoring empty values.
pub fn env_vault_path() -> Option<PathBuf> {
    std::env::var_os(VAULT_PATH_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
