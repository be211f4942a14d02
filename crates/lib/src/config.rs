//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.addin/config.json`) and environment.
//! It only says where the host lives: the target origin and the socket the CLI connects to.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level add-in config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddinConfig {
    /// Host target and connection settings.
    #[serde(default)]
    pub host: HostConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    /// Origin outbound envelopes are addressed to (passed to `init`). Overridden by ADDIN_HOST_URL env.
    #[serde(default)]
    pub url: Option<String>,

    /// WebSocket endpoint carrying envelopes (default "ws://127.0.0.1:15152/addin").
    #[serde(default = "default_socket_url")]
    pub socket_url: String,
}

fn default_socket_url() -> String {
    "ws://127.0.0.1:15152/addin".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            url: None,
            socket_url: default_socket_url(),
        }
    }
}

/// Resolve the host origin: env ADDIN_HOST_URL overrides config. Blank values count as unset.
pub fn resolve_host_url(config: &AddinConfig) -> Option<String> {
    non_blank(std::env::var("ADDIN_HOST_URL").ok()).or_else(|| non_blank(config.host.url.clone()))
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("ADDIN_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".addin").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from `path` (or the default path). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(AddinConfig, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        AddinConfig::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Write a default config file if none exists. Returns true when a file was created.
pub fn init_config_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating config directory {}", dir.display()))?;
    }
    let body = serde_json::to_string_pretty(&AddinConfig::default())?;
    std::fs::write(path, body).with_context(|| format!("writing config to {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("addin-config-test-{}", uuid::Uuid::new_v4()))
            .join("config.json")
    }

    #[test]
    fn default_socket_url_applies_to_partial_file() {
        let c: AddinConfig =
            serde_json::from_str(r#"{"host":{"url":"https://host.example"}}"#).unwrap();
        assert_eq!(c.host.url.as_deref(), Some("https://host.example"));
        assert_eq!(c.host.socket_url, "ws://127.0.0.1:15152/addin");
    }

    #[test]
    fn blank_config_url_is_unset() {
        let mut c = AddinConfig::default();
        c.host.url = Some("   ".into());
        assert_eq!(non_blank(c.host.url.clone()), None);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = temp_path();
        let (c, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert!(c.host.url.is_none());
    }

    #[test]
    fn init_writes_once_and_loads_back() {
        let path = temp_path();
        assert!(init_config_file(&path).unwrap());
        assert!(!init_config_file(&path).unwrap());
        let (c, _) = load_config(Some(path.clone())).unwrap();
        assert_eq!(c.host.socket_url, default_socket_url());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn invalid_json_reports_path() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{").unwrap();
        let err = load_config(Some(path.clone())).unwrap_err();
        assert!(format!("{:#}", err).contains("parsing config"));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
