use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DATA_DIR_ENV: &str = "RESEARCH_RELAY_DATA_DIR";
pub const UPSTREAM_URL_ENV: &str = "RESEARCH_RELAY_UPSTREAM_URL";
pub const API_HOST_ENV: &str = "RESEARCH_RELAY_API_HOST";
pub const API_PORT_ENV: &str = "RESEARCH_RELAY_API_PORT";

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_preview_chars")]
    pub query_preview_chars: usize,

    #[serde(default = "default_max_tool_calls")]
    pub default_max_tool_calls: u32,

    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,

    /// Six-field cron expression (seconds first).
    #[serde(default = "default_cleanup_cron")]
    pub cleanup_cron: String,

    #[serde(default)]
    pub cleanup_terminal_only: bool,

    #[serde(default)]
    pub stale_after_minutes: Option<u64>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    17890
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_model() -> String {
    "o4-mini-deep-research".to_string()
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_preview_chars() -> usize {
    100
}
fn default_max_tool_calls() -> u32 {
    30
}
fn default_max_age_hours() -> u64 {
    24
}
fn default_cleanup_cron() -> String {
    "0 0 * * * *".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            query_preview_chars: default_preview_chars(),
            default_max_tool_calls: default_max_tool_calls(),
            max_age_hours: default_max_age_hours(),
            cleanup_cron: default_cleanup_cron(),
            cleanup_terminal_only: false,
            stale_after_minutes: None,
        }
    }
}

/// `$RESEARCH_RELAY_DATA_DIR`, or `~/.research-relay`.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".research-relay"))
}

impl RelayConfig {
    pub async fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let config_path = data_dir.as_ref().join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let parsed: RelayConfig = toml::from_str(&content)
                .with_context(|| format!("Invalid config in {}", config_path.display()))?;
            info!("Loaded config from {}", config_path.display());
            parsed
        } else {
            info!("No {} found, using defaults.", CONFIG_FILE);
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(UPSTREAM_URL_ENV) {
            self.upstream.base_url = url;
        }
        if let Some(host) = lookup(API_HOST_ENV) {
            self.server.host = host;
        }
        if let Some(port) = lookup(API_PORT_ENV) {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid {}='{}'", API_PORT_ENV, port),
            }
        }
    }

    /// Empty when the variable is unset; the upstream then rejects calls.
    pub fn api_key(&self) -> String {
        match std::env::var(&self.upstream.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key.trim().to_string(),
            _ => {
                warn!(
                    "{} is not set; upstream requests will be unauthenticated",
                    self.upstream.api_key_env
                );
                String::new()
            }
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.jobs.max_age_hours, 24);
        assert_eq!(config.jobs.cleanup_cron, "0 0 * * * *");
        assert_eq!(config.upstream.default_model, "o4-mini-deep-research");
        assert!(!config.jobs.cleanup_terminal_only);
        assert!(config.jobs.stale_after_minutes.is_none());
    }

    #[tokio::test]
    async fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[jobs]\nmax_age_hours = 6\ncleanup_terminal_only = true\n\n[server]\nport = 9000\n",
        )
        .unwrap();

        let config = RelayConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.jobs.max_age_hours, 6);
        assert!(config.jobs.cleanup_terminal_only);
        assert_eq!(config.jobs.query_preview_chars, 100);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[jobs\nmax_age_hours = ").unwrap();
        assert!(RelayConfig::load(dir.path()).await.is_err());
    }

    #[test]
    fn env_overrides_apply_and_bad_port_is_ignored() {
        let env: HashMap<&str, &str> = [
            (UPSTREAM_URL_ENV, "http://127.0.0.1:9/v1"),
            (API_HOST_ENV, "0.0.0.0"),
            (API_PORT_ENV, "not-a-port"),
        ]
        .into_iter()
        .collect();

        let mut config = RelayConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.upstream.base_url, "http://127.0.0.1:9/v1");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 17890);

        config.apply_env(|key| (key == API_PORT_ENV).then(|| "18000".to_string()));
        assert_eq!(config.server.port, 18000);
    }
}
