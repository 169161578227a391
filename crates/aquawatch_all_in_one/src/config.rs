use anyhow::Context;
use common::memory::DEFAULT_MAX_READINGS_PER_DEVICE;
use common::telemetry::LogFormat;
use common::ThresholdTable;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// json or pretty
    #[serde(default)]
    pub log_format: LogFormat,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream carrying sensor readings
    #[serde(default = "default_nats_readings_stream")]
    pub nats_readings_stream: String,

    /// Subject filter; the last token is the device id
    #[serde(default = "default_nats_readings_subject")]
    pub nats_readings_subject: String,

    /// Durable consumer name
    #[serde(default = "default_nats_consumer_name")]
    pub nats_consumer_name: String,

    /// Batch size for consumer
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // Notification configuration
    /// Minimum time between repeat notifications of an unchanged state
    #[serde(default = "default_notification_cooldown_secs")]
    pub notification_cooldown_secs: u64,

    /// Sender address used in rendered emails
    #[serde(default = "default_mail_from")]
    pub mail_from: String,

    // Directory and thresholds
    /// JSON snapshot of companies, locations and users
    #[serde(default)]
    pub directory_path: Option<String>,

    /// Threshold table file (json, yaml or toml); built-in defaults otherwise
    #[serde(default)]
    pub thresholds_path: Option<String>,

    /// Readings retained in memory per device, oldest dropped first
    #[serde(default = "default_max_readings_per_device")]
    pub max_readings_per_device: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_readings_stream() -> String {
    "sensor_readings".to_string()
}

fn default_nats_readings_subject() -> String {
    "sensor_readings.>".to_string()
}

fn default_nats_consumer_name() -> String {
    "aquawatch-alarm-worker".to_string()
}

fn default_nats_batch_size() -> usize {
    50
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_notification_cooldown_secs() -> u64 {
    300
}

fn default_mail_from() -> String {
    "alerts@aquawatch.local".to_string()
}

fn default_max_readings_per_device() -> usize {
    DEFAULT_MAX_READINGS_PER_DEVICE
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("AQUAWATCH"))
            .build()?
            .try_deserialize()
    }

    pub fn notification_cooldown(&self) -> Duration {
        Duration::from_secs(self.notification_cooldown_secs)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn load_thresholds(&self) -> anyhow::Result<ThresholdTable> {
        match &self.thresholds_path {
            Some(path) => Config::builder()
                .add_source(File::with_name(path))
                .build()
                .and_then(|config| config.try_deserialize())
                .with_context(|| format!("Failed to load thresholds from {}", path)),
            None => Ok(ThresholdTable::default()),
        }
    }
}
