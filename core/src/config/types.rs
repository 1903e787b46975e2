use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub shutdown: ShutdownConfig,

    #[serde(default)]
    pub record: RecordConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.collector.host.trim().is_empty() {
            return Err("collector.host must not be empty".to_string());
        }
        if self.collector.port == 0 {
            return Err("collector.port must be non-zero".to_string());
        }
        if self.delivery.buffer_size == 0 {
            return Err("delivery.buffer_size must be at least 1".to_string());
        }
        if self.delivery.buffer_size > crate::queue::MAX_CAPACITY {
            return Err(format!(
                "delivery.buffer_size must be at most {}, got {}",
                crate::queue::MAX_CAPACITY,
                self.delivery.buffer_size
            ));
        }
        if self.record.facility > 23 {
            return Err(format!(
                "record.facility must be in 0..=23, got {}",
                self.record.facility
            ));
        }
        if self.record.severity > 7 {
            return Err(format!(
                "record.severity must be in 0..=7, got {}",
                self.record.severity
            ));
        }
        if self.record.max_message_bytes == 0 {
            return Err("record.max_message_bytes must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_collector_host")]
    pub host: String,

    #[serde(default = "default_collector_port")]
    pub port: u16,

    /// Upper bound for a single connect + send attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_collector_host() -> String {
    "localhost".to_string()
}

fn default_collector_port() -> u16 {
    514
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl CollectorConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: default_collector_host(),
            port: default_collector_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Queue capacity, in messages.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,

    /// Time allowed for the first successful delivery before giving up.
    #[serde(default = "default_bootstrap_window_secs")]
    pub bootstrap_window_secs: u64,
}

fn default_buffer_size() -> usize {
    10 * 1024 * 1024
}

fn default_retry_interval_secs() -> u64 {
    5
}

fn default_bootstrap_window_secs() -> u64 {
    30
}

impl DeliveryConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn bootstrap_window(&self) -> Duration {
        Duration::from_secs(self.bootstrap_window_secs)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            retry_interval_secs: default_retry_interval_secs(),
            bootstrap_window_secs: default_bootstrap_window_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// How long the child gets between SIGTERM and SIGKILL.
    #[serde(default = "default_term_grace_secs")]
    pub term_grace_secs: u64,

    /// How long buffered lines may take to drain after the child exits.
    #[serde(default = "default_drain_grace_secs")]
    pub drain_grace_secs: u64,
}

fn default_term_grace_secs() -> u64 {
    30
}

fn default_drain_grace_secs() -> u64 {
    5
}

impl ShutdownConfig {
    pub fn term_grace(&self) -> Duration {
        Duration::from_secs(self.term_grace_secs)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_secs(self.drain_grace_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            term_grace_secs: default_term_grace_secs(),
            drain_grace_secs: default_drain_grace_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Syslog facility code (1 = user-level).
    #[serde(default = "default_facility")]
    pub facility: u8,

    /// Syslog severity code (6 = informational).
    #[serde(default = "default_severity")]
    pub severity: u8,

    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Overrides the local host name in the record header.
    #[serde(default)]
    pub hostname: Option<String>,
}

fn default_app_name() -> String {
    "my_app".to_string()
}

fn default_facility() -> u8 {
    1
}

fn default_severity() -> u8 {
    6
}

fn default_max_message_bytes() -> usize {
    1024
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            facility: default_facility(),
            severity: default_severity(),
            max_message_bytes: default_max_message_bytes(),
            hostname: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "relaylog_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}
