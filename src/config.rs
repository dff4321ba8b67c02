//! Configuration for the console.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (ICM_API_URL, ICM_HUB_PATH)
//! 2. Config file (.icm/console.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .icm/console.yaml
//! - Falls back to ~/.icm/console.yaml

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::shell::ConsoleSettings;
use crate::notify::badge::HIDE_AFTER_CONNECTED;
use crate::notify::toast::ToastSettings;
use crate::transport::protocol::hub_url;
use crate::transport::state::{ReconnectPolicy, DEFAULT_RECONNECT_DELAYS_MS};
use crate::transport::TransportSettings;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_HUB_PATH: &str = "/hubs/notifications";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub api_url: Option<String>,
    pub hub_path: Option<String>,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub toasts: ToastsConfig,
    #[serde(default)]
    pub badge: BadgeConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransportConfig {
    pub reconnect_delays_ms: Option<Vec<u64>>,
    /// 0 means never give up
    pub max_reconnect_attempts: Option<u32>,
    pub retry_after_close_ms: Option<u64>,
    pub keepalive_secs: Option<u64>,
    pub server_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToastsConfig {
    pub max_live: Option<usize>,
    pub default_duration_ms: Option<u64>,
    pub exit_transition_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BadgeConfig {
    pub hide_after_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconcileConfig {
    pub announce_acknowledged: Option<bool>,
}

/// Environment overrides
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    api_url: Option<String>,
    hub_path: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            api_url: std::env::var("ICM_API_URL").ok().filter(|v| !v.is_empty()),
            hub_path: std::env::var("ICM_HUB_PATH").ok().filter(|v| !v.is_empty()),
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Base API url, e.g. `http://localhost:5000/api`
    pub api_url: String,
    /// Hub path appended to the API url
    pub hub_path: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub reconnect: ReconnectPolicy,
    pub keepalive: Duration,
    pub server_timeout: Duration,
    pub toasts: ToastSettings,
    pub badge_hide_after: Duration,
    pub announce_acknowledged: bool,
}

impl ResolvedConfig {
    /// WebSocket URL of the push hub
    pub fn hub_url(&self) -> String {
        hub_url(&self.api_url, &self.hub_path)
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            url: self.hub_url(),
            policy: self.reconnect.clone(),
            keepalive: self.keepalive,
            server_timeout: self.server_timeout,
        }
    }

    pub fn console_settings(&self) -> ConsoleSettings {
        ConsoleSettings {
            toasts: self.toasts,
            badge_hide_after: self.badge_hide_after,
            announce_acknowledged: self.announce_acknowledged,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let start = std::env::current_dir().ok()?;
    find_config_file_from(&start).or_else(|| {
        let home = dirs::home_dir()?.join(".icm").join("console.yaml");
        home.exists().then_some(home)
    })
}

fn find_config_file_from(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".icm").join("console.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn millis(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_millis).unwrap_or(default)
}

fn secs(value: Option<u64>, default: Duration) -> Duration {
    value.map(Duration::from_secs).unwrap_or(default)
}

/// Merge the layers
fn resolve(file: Option<(PathBuf, ConfigFile)>, env: EnvOverrides) -> Result<ResolvedConfig> {
    let (config_file, file) = match file {
        Some((path, file)) => (Some(path), Some(file)),
        None => (None, None),
    };

    let api_url = env
        .api_url
        .or_else(|| file.as_ref().and_then(|f| f.api_url.clone()))
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let hub_path = env
        .hub_path
        .or_else(|| file.as_ref().and_then(|f| f.hub_path.clone()))
        .unwrap_or_else(|| DEFAULT_HUB_PATH.to_string());

    if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
        anyhow::bail!("api_url must be an http(s) URL, got '{}'", api_url);
    }

    let transport = file.as_ref().map(|f| f.transport.clone()).unwrap_or_default();
    let toasts = file.as_ref().map(|f| f.toasts.clone()).unwrap_or_default();
    let badge = file.as_ref().map(|f| f.badge.clone()).unwrap_or_default();
    let reconcile = file.as_ref().map(|f| f.reconcile.clone()).unwrap_or_default();

    let defaults = ReconnectPolicy::default();
    let delays: Vec<Duration> = transport
        .reconnect_delays_ms
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_RECONNECT_DELAYS_MS.to_vec())
        .into_iter()
        .map(Duration::from_millis)
        .collect();
    let reconnect = ReconnectPolicy {
        delays,
        max_attempts: match transport.max_reconnect_attempts {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.max_attempts,
        },
        retry_after_close: millis(transport.retry_after_close_ms, defaults.retry_after_close),
    };

    let toast_defaults = ToastSettings::default();

    Ok(ResolvedConfig {
        api_url,
        hub_path,
        config_file,
        reconnect,
        keepalive: secs(transport.keepalive_secs, Duration::from_secs(15)),
        server_timeout: secs(transport.server_timeout_secs, Duration::from_secs(30)),
        toasts: ToastSettings {
            max_live: toasts.max_live.unwrap_or(toast_defaults.max_live),
            default_duration: millis(toasts.default_duration_ms, toast_defaults.default_duration),
            exit_transition: millis(toasts.exit_transition_ms, toast_defaults.exit_transition),
        },
        badge_hide_after: millis(badge.hide_after_ms, HIDE_AFTER_CONNECTED),
        announce_acknowledged: reconcile.announce_acknowledged.unwrap_or(true),
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let file = match find_config_file() {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Some((path, parsed))
        }
        None => None,
    };
    resolve(file, EnvOverrides::from_env())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
