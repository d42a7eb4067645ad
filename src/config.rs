use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:4000".to_string()
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
        }
    }
}

fn default_base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pillbox")
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Base URL of the event gateway. Required — startup fails without it.
    pub url: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_sink_timeout")]
    pub timeout_secs: u64,
}

fn default_topic() -> String {
    "reminders.schedule".to_string()
}

fn default_sink_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    #[serde(default)]
    pub on_dispatch_failure: FailurePolicy,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            on_dispatch_failure: FailurePolicy::default(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_secs: default_retry_base_secs(),
        }
    }
}

/// What a watcher does when the sink rejects a dispatch: `disable` stops
/// that reminder's watcher permanently, `retry` backs off and keeps it
/// alive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Disable,
    Retry,
}

fn default_tick_secs() -> u64 {
    60
}

fn default_retry_max_attempts() -> u32 {
    5
}

fn default_retry_base_secs() -> u64 {
    2
}

pub fn load(path: &str) -> Result<Config> {
    let path = expand_tilde(path);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config.toml")?;
    Ok(config)
}

pub async fn init_config_dir() -> Result<()> {
    let base = default_base_dir();
    tokio::fs::create_dir_all(base.join("reminders")).await?;

    let config_path = base.join("config.toml");
    if !config_path.exists() {
        tokio::fs::write(
            &config_path,
            r#"[api]
bind = "127.0.0.1:4000"

# [store]
# base_dir = "/var/lib/pillbox"

[sink]
# Event gateway that forwards dispatches to downstream consumers.
url = "http://127.0.0.1:8082"
topic = "reminders.schedule"
timeout_secs = 10

[scheduler]
tick_secs = 60
# "disable" stops a reminder's watcher on the first failed dispatch.
# "retry" retries with exponential backoff and keeps the watcher alive.
on_dispatch_failure = "retry"
retry_max_attempts = 5
retry_base_secs = 2
"#,
        )
        .await?;
    }

    Ok(())
}

fn expand_tilde(path: &str) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [sink]
            url = "http://localhost:8082"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.bind, "127.0.0.1:4000");
        assert_eq!(config.sink.topic, "reminders.schedule");
        assert_eq!(config.sink.timeout_secs, 10);
        assert_eq!(config.scheduler.tick_secs, 60);
        assert_eq!(config.scheduler.on_dispatch_failure, FailurePolicy::Disable);
    }

    #[test]
    fn test_missing_sink_url_is_an_error() {
        assert!(toml::from_str::<Config>("[api]\nbind = \"127.0.0.1:4000\"\n").is_err());
        assert!(toml::from_str::<Config>("[sink]\ntopic = \"t\"\n").is_err());
    }

    #[test]
    fn test_failure_policy_parses_lowercase() {
        let config: Config = toml::from_str(
            r#"
            [sink]
            url = "http://localhost:8082"

            [scheduler]
            on_dispatch_failure = "retry"
            "#,
        )
        .unwrap();
        assert_eq!(config.scheduler.on_dispatch_failure, FailurePolicy::Retry);
    }
}
