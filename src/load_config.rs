/// `load_config` module: the YAML defaults file and the environment.
///
/// The YAML file never carries secrets. It only replaces built-in defaults for
/// command flags; anything given explicitly on the command line wins over it.
/// API location and credentials come from the environment (see [`Settings`]).
///
/// Accepted YAML:
///
/// ```yaml
/// api_url: http://localhost:8080/api/v1
/// defaults:
///   source_dir: /data/journals
///   container_dir: /root/datasets/journals
///   name_template: "{name}-journal"
///   slug_template: "{name}-oa"
///   summary_template: "Open access journal: {name}"
///   tags: journal,open-access
///   response_type: both
///   model: anthropic/claude-3.5-sonnet
///   progress_file: progress.json
///   descriptions: descriptions.json
/// ```
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::api_key::resolve_api_key;

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_CONTAINER_DIR: &str = "/root/datasets";
pub const DEFAULT_PROGRESS_FILE: &str = "progress.json";
pub const DEFAULT_DESCRIPTIONS_FILE: &str = "descriptions.json";
pub const DEFAULT_TEMPLATE: &str = "{name}";
pub const DEFAULT_RESPONSE_TYPE: &str = "both";

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub api_url: Option<String>,
    pub defaults: Defaults,
}

/// Per-flag fallbacks; every field is optional.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub source_dir: Option<PathBuf>,
    pub container_dir: Option<String>,
    pub name_template: Option<String>,
    pub slug_template: Option<String>,
    pub summary_template: Option<String>,
    pub tags: Option<String>,
    pub response_type: Option<String>,
    pub model: Option<String>,
    pub progress_file: Option<PathBuf>,
    pub descriptions: Option<PathBuf>,
}

impl Defaults {
    pub fn container_dir(&self) -> String {
        self.container_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTAINER_DIR.to_string())
    }

    pub fn progress_file(&self) -> PathBuf {
        self.progress_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRESS_FILE))
    }

    pub fn descriptions(&self) -> PathBuf {
        self.descriptions
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DESCRIPTIONS_FILE))
    }

    pub fn response_type(&self) -> String {
        self.response_type
            .clone()
            .unwrap_or_else(|| DEFAULT_RESPONSE_TYPE.to_string())
    }
}

/// Loads the YAML defaults file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let config: CliConfig = serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow::anyhow!("Failed to parse config YAML: {e}")
    })?;
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    Ok(config)
}

/// Loads the config file when one is given, otherwise built-in defaults only.
pub fn load_optional_config(path: Option<&Path>) -> Result<CliConfig> {
    match path {
        Some(p) => load_config(p).with_context(|| format!("loading {}", p.display())),
        None => Ok(CliConfig::default()),
    }
}

/// Where to reach the instance and with which credentials.
#[derive(Clone)]
pub struct Settings {
    pub api_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_url", &self.api_url)
            .field("api_key_set", &!self.api_key.is_empty())
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// `SYFT_API_URL` wins over the config file's `api_url`. A missing
    /// `SYFT_ADMIN_API_KEY` is looked up from the running container.
    pub async fn from_env(config: &CliConfig) -> Self {
        let api_url = non_empty_var("SYFT_API_URL")
            .or_else(|| config.api_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let api_key = match non_empty_var("SYFT_ADMIN_API_KEY") {
            Some(key) => key,
            None => {
                let discovered = resolve_api_key(&api_url).await;
                if discovered.is_empty() {
                    tracing::warn!(api_url = %api_url, "No SYFT_ADMIN_API_KEY found");
                }
                discovered
            }
        };

        let settings = Settings { api_url, api_key };
        info!(?settings, "Resolved settings");
        settings
    }
}

/// Key for the description generator; generation is unavailable without it.
pub fn openrouter_api_key() -> Option<String> {
    non_empty_var("OPENROUTER_API_KEY")
}
