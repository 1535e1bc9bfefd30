//! Registry credential context and `.env` loading.
//!
//! Grounded on `syncable-cli::config::load_config`'s fallback-chain shape,
//! generalized here to the env-var -> docker-config-file -> creds-store
//! precedence documented in spec §4.3. Everything here is read exactly once
//! per run (§5 "Shared resources" (3)); no task mutates it afterwards.

pub mod env_file;

use std::path::PathBuf;

/// Credentials and registry-identifying context built once at startup.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    pub config_file: PathBuf,
    pub docker_username: Option<String>,
    pub docker_password: Option<String>,
    pub acr_username: Option<String>,
    pub acr_password: Option<String>,
    pub acr_registry_name: Option<String>,
}

impl RegistryConfig {
    /// Build from the process environment and an explicit config file path.
    /// `config_file` defaults to `~/.docker/config.json` when not given.
    pub fn from_env(config_file: Option<PathBuf>) -> Self {
        let config_file = config_file.unwrap_or_else(default_config_file);

        Self {
            config_file,
            docker_username: non_empty(std::env::var("DOCKER_USERNAME").ok()),
            docker_password: non_empty(std::env::var("DOCKER_PASSWORD").ok()),
            acr_username: non_empty(std::env::var("ACR_USERNAME").ok()),
            acr_password: non_empty(std::env::var("ACR_PASSWORD").ok()),
            acr_registry_name: non_empty(std::env::var("ACR_REGISTRY_NAME").ok()),
        }
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

fn default_config_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".docker")
        .join("config.json")
}
