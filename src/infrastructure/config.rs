use crate::application::history_store::DEFAULT_CAPACITY;
use crate::application::poller::PollerConfig;
use crate::domain::telemetry::{default_metric_specs, MetricSpec};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ViewerConfig {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub live: LiveSettings,
    #[serde(default)]
    pub poller: PollerSettings,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_circuit_count")]
    pub default_circuit_count: u32,
    #[serde(default = "default_devices_path")]
    pub devices_path: String,
    #[serde(default = "default_history_path")]
    pub history_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LiveSettings {
    #[serde(default = "default_live_url")]
    pub url: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollerSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistorySettings {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_circuit_count() -> u32 {
    16
}

fn default_devices_path() -> String {
    "/api/devices".to_string()
}

fn default_history_path() -> String {
    "/api/circuit-data/${device}/${circuit}".to_string()
}

fn default_live_url() -> String {
    "ws://127.0.0.1:5001/socket.io/?EIO=4&transport=websocket".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    2000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_history_limit() -> usize {
    50
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            request_timeout_ms: default_request_timeout_ms(),
            default_circuit_count: default_circuit_count(),
            devices_path: default_devices_path(),
            history_path: default_history_path(),
        }
    }
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            url: default_live_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            history_limit: default_history_limit(),
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl ViewerConfig {
    /// Configured metrics, or the built-in catalog when none are listed.
    pub fn metric_specs(&self) -> Vec<MetricSpec> {
        if self.metrics.is_empty() {
            default_metric_specs()
        } else {
            self.metrics.clone()
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.poller.interval_ms.max(1)),
            history_limit: self.poller.history_limit,
        }
    }
}

/// `config/viewer.{toml,json,...}` if present, overridden by `RIG_VIEWER__*`
/// environment variables.
pub fn load_viewer_config() -> anyhow::Result<ViewerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/viewer").required(false))
        .add_source(config::Environment::with_prefix("RIG_VIEWER").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace `${name}` placeholders in an endpoint path template
pub fn prepare_path(template: &str, vars: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, &urlencoding::encode(value));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::Metric;

    #[test]
    fn test_prepare_path() {
        let mut vars = HashMap::new();
        vars.insert("device".to_string(), "2".to_string());
        vars.insert("circuit".to_string(), "5".to_string());

        let result = prepare_path(&default_history_path(), &vars);

        assert_eq!(result, "/api/circuit-data/2/5");
    }

    #[test]
    fn test_defaults_from_empty_source() {
        let settings = config::Config::builder().build().unwrap();
        let config: ViewerConfig = settings.try_deserialize().unwrap();

        assert_eq!(config.history.capacity, 50);
        assert_eq!(config.poller_config().interval, Duration::from_secs(1));
        assert_eq!(config.backend.default_circuit_count, 16);
        assert_eq!(config.metric_specs().len(), 6);
    }

    #[test]
    fn test_metrics_from_toml() {
        let toml = r##"
            [poller]
            interval_ms = 250

            [[metrics]]
            key = "temperature"
            label = "Cell Temp"
            unit = "°C"
            candidate_source_keys = ["MaxTemp", "temperature"]
            color = "#ff0000"
        "##;
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap();
        let config: ViewerConfig = settings.try_deserialize().unwrap();

        let specs = config.metric_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].key, Metric::Temperature);
        assert_eq!(specs[0].candidate_source_keys, vec!["MaxTemp", "temperature"]);
        assert_eq!(specs[0].precision, 2);
        assert_eq!(config.poller.interval_ms, 250);
    }
}
