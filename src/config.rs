//! Configuration loading and defaults for the editorial console.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8001";
pub const DEFAULT_CONTENT_ROOT: &str = "content/raw";
pub const DEFAULT_BRIDGE_HOST: &str = "127.0.0.1";
pub const DEFAULT_BRIDGE_PORT: u16 = 8765;

pub const DEFAULT_STYLE_GUIDES_PATH: &str = "/api/styleguides";
pub const DEFAULT_CONTENT_FOLDERS_PATH: &str = "/api/list-content-folders";
pub const DEFAULT_ANALYZE_FOLDER_PATH: &str = "/api/analyze-folder";
pub const DEFAULT_SAVE_METADATA_PATH: &str = "/api/save-metadata";
pub const DEFAULT_RUN_PIPELINE_PATH: &str = "/api/run-pipeline-stream";

// === Types ===

/// Raw retry configuration loaded from config files.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub enabled: Option<bool>,
    pub max_retries: Option<u32>,
    pub initial_delay: Option<f64>,
    pub max_delay: Option<f64>,
    pub exponential_base: Option<f64>,
}

/// Resolved retry policy with defaults applied.
///
/// Only idempotent GET requests are retried; see [`crate::client`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_retries: u32,
    pub initial_delay: f64,
    pub max_delay: f64,
    pub exponential_base: f64,
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            initial_delay: 0.0,
            max_delay: 0.0,
            exponential_base: 1.0,
        }
    }

    /// Compute the backoff delay for a retry attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.initial_delay * self.exponential_base.powi(exponent);
        let delay = delay.min(self.max_delay);
        // Clamp to a sane range to guard against NaN/negative from misconfigured values
        let delay = if delay.is_nan() { 0.0 } else { delay.clamp(0.0, 300.0) };
        std::time::Duration::from_secs_f64(delay)
    }
}

/// Per-endpoint path overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointsConfig {
    pub style_guides: Option<String>,
    pub content_folders: Option<String>,
    pub analyze_folder: Option<String>,
    pub save_metadata: Option<String>,
    pub run_pipeline: Option<String>,
}

/// Resolved endpoint paths, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub style_guides: String,
    pub content_folders: String,
    pub analyze_folder: String,
    pub save_metadata: String,
    pub run_pipeline: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            style_guides: DEFAULT_STYLE_GUIDES_PATH.to_string(),
            content_folders: DEFAULT_CONTENT_FOLDERS_PATH.to_string(),
            analyze_folder: DEFAULT_ANALYZE_FOLDER_PATH.to_string(),
            save_metadata: DEFAULT_SAVE_METADATA_PATH.to_string(),
            run_pipeline: DEFAULT_RUN_PIPELINE_PATH.to_string(),
        }
    }
}

/// Assistant bridge listener configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BridgeConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Resolved configuration, including defaults and environment overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub base_url: Option<String>,
    pub content_root: Option<String>,
    pub endpoints: Option<EndpointsConfig>,
    pub retry: Option<RetryConfig>,
    pub bridge: Option<BridgeConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(flatten)]
    base: Config,
    profiles: Option<HashMap<String, Config>>,
}

// === Config Loading ===

impl Config {
    /// Load configuration from disk and merge with environment overrides.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use vector_wave_console::config::Config;
    /// let config = Config::load(None, None)?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn load(path: Option<PathBuf>, profile: Option<&str>) -> Result<Self> {
        let path = resolve_load_config_path(path);
        let mut config = match path.as_ref() {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                let parsed: ConfigFile = toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
                apply_profile(parsed, profile)?
            }
            _ => {
                if let Some(name) = profile {
                    anyhow::bail!("Profile '{name}' not found. Available profiles: none");
                }
                Config::default()
            }
        };

        apply_env_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Validate user-supplied values.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = self.base_url.as_deref() {
            let trimmed = url.trim();
            if trimmed.is_empty() {
                anyhow::bail!("base_url cannot be empty string");
            }
            reqwest::Url::parse(trimmed)
                .with_context(|| format!("Invalid base_url '{trimmed}'"))?;
        }
        if let Some(root) = self.content_root.as_deref()
            && root.trim().is_empty()
        {
            anyhow::bail!("content_root cannot be empty string");
        }
        if let Some(endpoints) = &self.endpoints {
            for (key, value) in [
                ("style_guides", &endpoints.style_guides),
                ("content_folders", &endpoints.content_folders),
                ("analyze_folder", &endpoints.analyze_folder),
                ("save_metadata", &endpoints.save_metadata),
                ("run_pipeline", &endpoints.run_pipeline),
            ] {
                if let Some(path) = value
                    && !path.starts_with('/')
                {
                    anyhow::bail!("Invalid endpoints.{key} '{path}': expected a path starting with '/'.");
                }
            }
        }
        if let Some(retry) = &self.retry
            && let Some(base) = retry.exponential_base
            && base <= 0.0
        {
            anyhow::bail!("retry.exponential_base must be positive, got {base}");
        }
        Ok(())
    }

    /// Return the backend base URL (normalized, no trailing slash).
    #[must_use]
    pub fn base_url(&self) -> String {
        let base = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL);
        base.trim_end_matches('/').to_string()
    }

    /// Folder prefix used when suggesting folder paths to the user.
    #[must_use]
    pub fn content_root(&self) -> String {
        self.content_root
            .as_deref()
            .map(|root| root.trim().trim_end_matches('/').to_string())
            .filter(|root| !root.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_ROOT.to_string())
    }

    /// Resolve endpoint paths with defaults applied.
    #[must_use]
    pub fn endpoints(&self) -> Endpoints {
        let defaults = Endpoints::default();
        let Some(cfg) = &self.endpoints else {
            return defaults;
        };
        Endpoints {
            style_guides: cfg.style_guides.clone().unwrap_or(defaults.style_guides),
            content_folders: cfg.content_folders.clone().unwrap_or(defaults.content_folders),
            analyze_folder: cfg.analyze_folder.clone().unwrap_or(defaults.analyze_folder),
            save_metadata: cfg.save_metadata.clone().unwrap_or(defaults.save_metadata),
            run_pipeline: cfg.run_pipeline.clone().unwrap_or(defaults.run_pipeline),
        }
    }

    /// Host and port the assistant bridge listens on.
    #[must_use]
    pub fn bridge_addr(&self) -> (String, u16) {
        let bridge = self.bridge.clone().unwrap_or_default();
        (
            bridge.host.unwrap_or_else(|| DEFAULT_BRIDGE_HOST.to_string()),
            bridge.port.unwrap_or(DEFAULT_BRIDGE_PORT),
        )
    }

    /// Resolve the effective retry policy with defaults applied.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy {
            enabled: true,
            max_retries: 2,
            initial_delay: 0.5,
            max_delay: 10.0,
            exponential_base: 2.0,
        };

        let Some(cfg) = &self.retry else {
            return defaults;
        };

        RetryPolicy {
            enabled: cfg.enabled.unwrap_or(defaults.enabled),
            max_retries: cfg.max_retries.unwrap_or(defaults.max_retries),
            initial_delay: cfg.initial_delay.unwrap_or(defaults.initial_delay),
            max_delay: cfg.max_delay.unwrap_or(defaults.max_delay),
            exponential_base: cfg.exponential_base.unwrap_or(defaults.exponential_base),
        }
    }
}

// === Defaults ===

fn home_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".vector-wave").join("config.toml"))
}

fn env_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("VECTOR_WAVE_CONFIG_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(expand_path(trimmed));
        }
    }
    None
}

fn expand_pathbuf(path: PathBuf) -> PathBuf {
    if let Some(raw) = path.to_str() {
        return expand_path(raw);
    }
    path
}

fn resolve_load_config_path(path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = path {
        return Some(expand_pathbuf(path));
    }
    env_config_path().or_else(home_config_path)
}

fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

// === Environment Overrides ===

fn apply_env_overrides(config: &mut Config) {
    if let Ok(value) = std::env::var("VECTOR_WAVE_BASE_URL") {
        config.base_url = Some(value);
    }
    if let Ok(value) = std::env::var("VECTOR_WAVE_CONTENT_ROOT") {
        config.content_root = Some(value);
    }
    if let Ok(value) = std::env::var("VECTOR_WAVE_BRIDGE_PORT")
        && let Ok(port) = value.trim().parse::<u16>()
    {
        config.bridge.get_or_insert_with(BridgeConfig::default).port = Some(port);
    }
}

fn apply_profile(config: ConfigFile, profile: Option<&str>) -> Result<Config> {
    let Some(profile_name) = profile else {
        return Ok(config.base);
    };
    let profiles = config.profiles.as_ref();
    match profiles.and_then(|profiles| profiles.get(profile_name)) {
        Some(override_cfg) => Ok(merge_config(config.base, override_cfg.clone())),
        None => {
            let available = profiles
                .map(|profiles| {
                    let mut keys = profiles.keys().cloned().collect::<Vec<_>>();
                    keys.sort();
                    if keys.is_empty() {
                        "none".to_string()
                    } else {
                        keys.join(", ")
                    }
                })
                .unwrap_or_else(|| "none".to_string());
            anyhow::bail!("Profile '{profile_name}' not found. Available profiles: {available}")
        }
    }
}

fn merge_config(base: Config, override_cfg: Config) -> Config {
    Config {
        base_url: override_cfg.base_url.or(base.base_url),
        content_root: override_cfg.content_root.or(base.content_root),
        endpoints: merge_endpoints(base.endpoints, override_cfg.endpoints),
        retry: override_cfg.retry.or(base.retry),
        bridge: override_cfg.bridge.or(base.bridge),
    }
}

fn merge_endpoints(
    base: Option<EndpointsConfig>,
    override_cfg: Option<EndpointsConfig>,
) -> Option<EndpointsConfig> {
    match (base, override_cfg) {
        (None, None) => None,
        (Some(base), Some(over)) => Some(EndpointsConfig {
            style_guides: over.style_guides.or(base.style_guides),
            content_folders: over.content_folders.or(base.content_folders),
            analyze_folder: over.analyze_folder.or(base.analyze_folder),
            save_metadata: over.save_metadata.or(base.save_metadata),
            run_pipeline: over.run_pipeline.or(base.run_pipeline),
        }),
        (Some(base), None) => Some(base),
        (None, Some(over)) => Some(over),
    }
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}
