//! Application configuration.
//!
//! Settings come from a TOML file chosen by layered lookup, then secrets are
//! overridden from the environment. A `./.env` file may seed the environment
//! but never replaces variables that are already set.
use crate::client::local::DEFAULT_BASE_URL;
use crate::client::pod::DEFAULT_IMAGE;
use crate::request::{AudioFormat, MAX_BATCH_SIZE};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.toml";
const HOME_CONFIG_REL: &str = ".config/auto-music-gen/config.toml";

pub const ENV_ACESTEP_API_KEY: &str = "ACESTEP_API_KEY";
pub const ENV_RUNPOD_API_KEY: &str = "RUNPOD_API_KEY";
pub const ENV_ACESTEP_INSTALL_DIR: &str = "ACESTEP_INSTALL_DIR";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub acestep: AceStepConfig,
    pub generation: GenerationDefaults,
    pub output: OutputConfig,
    pub runpod: RunPodConfig,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AceStepConfig {
    /// Checkout of the ACE-Step server; empty means search the usual places.
    pub install_dir: String,
    pub port: u16,
    /// Shell-style command run inside `install_dir` to start the server.
    pub launch_command: String,
}

impl Default for AceStepConfig {
    fn default() -> Self {
        Self {
            install_dir: String::new(),
            port: 8001,
            launch_command: "uv run acestep-api".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    pub audio_format: String,
    pub batch_size: u32,
    pub inference_steps: u32,
    pub guidance_scale: f64,
    pub audio_duration: u32,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            audio_format: AudioFormat::Mp3.as_str().to_string(),
            batch_size: 1,
            inference_steps: 8,
            guidance_scale: 7.0,
            audio_duration: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub output_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunPodConfig {
    pub api_key: String,
    pub gpu_type: String,
    pub template_id: String,
    pub volume_id: String,
    pub image_name: String,
    pub auto_destroy: bool,
}

impl Default for RunPodConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            gpu_type: "NVIDIA GeForce RTX 4090".to_string(),
            template_id: String::new(),
            volume_id: String::new(),
            image_name: DEFAULT_IMAGE.to_string(),
            auto_destroy: true,
        }
    }
}

/// Wait budgets, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub generation_secs: u64,
    pub server_start_secs: u64,
    pub pod_start_secs: u64,
    pub pod_server_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            generation_secs: 1800,
            server_start_secs: 120,
            pod_start_secs: 300,
            pod_server_secs: 180,
        }
    }
}

impl TimeoutConfig {
    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }

    pub fn server_start(&self) -> Duration {
        Duration::from_secs(self.server_start_secs)
    }

    pub fn pod_start(&self) -> Duration {
        Duration::from_secs(self.pod_start_secs)
    }

    pub fn pod_server(&self) -> Duration {
        Duration::from_secs(self.pod_server_secs)
    }
}

/// Where the loaded settings came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub source: ConfigSource,
}

/// Default lookup locations after an explicit path: cwd, then the user config dir.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(HOME_CONFIG_REL));
    }
    paths
}

/// Load `./.env`, then resolve and parse the config against the process environment.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "ignoring unreadable .env"),
    }
    load_config_from(explicit, &default_search_paths(), |key| {
        std::env::var(key).ok()
    })
}

/// Resolve the config file and apply environment overrides read through `env`.
pub fn load_config_from(
    explicit: Option<&Path>,
    search_paths: &[PathBuf],
    env: impl Fn(&str) -> Option<String>,
) -> Result<LoadedConfig> {
    let (mut config, source) = match resolve_config_path(explicit, search_paths) {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("read config {}", path.display()))?;
            let config =
                parse_config(&text).with_context(|| format!("parse config {}", path.display()))?;
            (config, ConfigSource::File(path))
        }
        None => (AppConfig::default(), ConfigSource::Defaults),
    };
    apply_env_overrides(&mut config, env);
    tracing::info!(source = %source, "configuration loaded");
    Ok(LoadedConfig { config, source })
}

/// First existing file among the explicit path and the search paths.
///
/// An explicit path that does not exist is skipped with a warning.
pub fn resolve_config_path(explicit: Option<&Path>, search_paths: &[PathBuf]) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "config file not found, searching defaults");
    }
    search_paths.iter().find(|path| path.is_file()).cloned()
}

pub fn parse_config(text: &str) -> Result<AppConfig> {
    toml::from_str(text).context("parse config TOML")
}

/// Non-empty environment values replace the matching secrets and paths.
pub fn apply_env_overrides(config: &mut AppConfig, env: impl Fn(&str) -> Option<String>) {
    let lookup = |key: &str| env(key).filter(|value| !value.is_empty());
    if let Some(value) = lookup(ENV_ACESTEP_API_KEY) {
        config.server.api_key = value;
    }
    if let Some(value) = lookup(ENV_RUNPOD_API_KEY) {
        config.runpod.api_key = value;
    }
    if let Some(value) = lookup(ENV_ACESTEP_INSTALL_DIR) {
        config.acestep.install_dir = value;
    }
}

/// Reject settings the wizard could not turn into a valid request.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.server.base_url.trim().is_empty() {
        return Err(anyhow!("server.base_url must not be empty"));
    }
    config
        .generation
        .audio_format
        .parse::<AudioFormat>()
        .map_err(|err| anyhow!("generation.audio_format: {}", err.message))?;
    let batch = config.generation.batch_size;
    if !(1..=MAX_BATCH_SIZE).contains(&batch) {
        return Err(anyhow!(
            "generation.batch_size must be between 1 and {MAX_BATCH_SIZE}, got {batch}"
        ));
    }
    if config.generation.inference_steps == 0 {
        return Err(anyhow!("generation.inference_steps must be positive"));
    }
    if shell_words::split(&config.acestep.launch_command)
        .map(|words| words.is_empty())
        .unwrap_or(true)
    {
        return Err(anyhow!(
            "acestep.launch_command is not a valid command: {:?}",
            config.acestep.launch_command
        ));
    }
    Ok(())
}

/// Copy of the config safe to print.
pub fn masked(config: &AppConfig) -> AppConfig {
    let mut copy = config.clone();
    copy.server.api_key = mask_secret(&copy.server.api_key);
    copy.runpod.api_key = mask_secret(&copy.runpod.api_key);
    copy
}

/// Keep the last four characters of long secrets.
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count == 0 {
        return String::new();
    }
    if count <= 8 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{tail}")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
