// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway configuration with validation.
//!
//! Loaded from TOML; every field has a default so a file only needs the
//! settings it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{MAX_FRAME_SIZE, FRAME_HEADER_SIZE};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which sessions receive broker-originated messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutPolicy {
    /// Every connected session.
    #[default]
    All,
    /// Connected sessions with a matching SUBSCRIBE filter.
    Subscribers,
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// UDP listen port (default: 1884).
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,

    /// UDP bind address (default: 0.0.0.0).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Maximum distinct client IPs tracked (default: 128).
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Receive buffer size per datagram (default: 512).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Worker tasks draining the datagram queue (default: 4).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Bounded datagram queue depth (default: 1024).
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Broker -> client delivery policy.
    #[serde(default)]
    pub fanout: FanoutPolicy,

    /// Topic names used to find the end of a PUBLISH-by-name topic.
    #[serde(default)]
    pub known_topics: Vec<String>,

    /// Highest topic id the registry hands out (default: 65535).
    #[serde(default = "default_max_topics")]
    pub max_topics: u16,

    /// Statistics reporting interval (seconds, 0 disables).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upstream MQTT broker.
    #[serde(default)]
    pub broker: BrokerConfig,
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,

    #[serde(default = "default_broker_port")]
    pub port: u16,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Filter subscribed on every (re)connect.
    #[serde(default = "default_topic_filter")]
    pub topic_filter: String,

    /// QoS for the broker subscription (0-2).
    #[serde(default)]
    pub subscribe_qos: u8,

    /// Outgoing request queue capacity of the MQTT client.
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,

    #[serde(default = "default_reconnect_min")]
    pub reconnect_min_ms: u64,

    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_ms: u64,
}

fn default_udp_port() -> u16 {
    1884
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_max_clients() -> usize {
    128
}

fn default_max_message_size() -> usize {
    512
}

fn default_workers() -> usize {
    4
}

fn default_queue_depth() -> usize {
    1024
}

fn default_max_topics() -> u16 {
    u16::MAX
}

fn default_stats_interval() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "mqttsn-gateway".to_string()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_topic_filter() -> String {
    "#".to_string()
}

fn default_request_capacity() -> usize {
    64
}

fn default_reconnect_min() -> u64 {
    500
}

fn default_reconnect_max() -> u64 {
    30_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            udp_port: default_udp_port(),
            bind_address: default_bind_address(),
            max_clients: default_max_clients(),
            max_message_size: default_max_message_size(),
            workers: default_workers(),
            queue_depth: default_queue_depth(),
            fanout: FanoutPolicy::All,
            known_topics: Vec::new(),
            max_topics: default_max_topics(),
            stats_interval_secs: default_stats_interval(),
            log_level: default_log_level(),
            broker: BrokerConfig::default(),
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive(),
            topic_filter: default_topic_filter(),
            subscribe_qos: 0,
            request_capacity: default_request_capacity(),
            reconnect_min_ms: default_reconnect_min(),
            reconnect_max_ms: default_reconnect_max(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// `bind_address:udp_port`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.udp_port)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.is_empty() {
            return Err(ConfigError::Invalid("bind_address must not be empty".into()));
        }
        if self.max_clients == 0 {
            return Err(ConfigError::Invalid("max_clients must be > 0".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be > 0".into()));
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::Invalid("queue_depth must be > 0".into()));
        }
        // A datagram larger than one frame is malformed anyway, so one frame
        // is the useful minimum.
        if self.max_message_size < MAX_FRAME_SIZE || self.max_message_size > 65_535 {
            return Err(ConfigError::Invalid(format!(
                "max_message_size must be in {}..=65535",
                MAX_FRAME_SIZE
            )));
        }
        if self.max_topics == 0 {
            return Err(ConfigError::Invalid("max_topics must be > 0".into()));
        }
        for name in &self.known_topics {
            // The name must fit a PUBLISH frame next to flags and msg_id.
            if name.is_empty() || name.len() > MAX_FRAME_SIZE - FRAME_HEADER_SIZE - 3 {
                return Err(ConfigError::Invalid(format!(
                    "known topic {:?} has invalid length",
                    name
                )));
            }
        }
        self.broker.validate()
    }
}

impl BrokerConfig {
    /// Validate broker settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("broker.host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("broker.port must be > 0".into()));
        }
        if self.client_id.is_empty() || self.client_id.starts_with(' ') {
            return Err(ConfigError::Invalid(
                "broker.client_id must be non-empty and not start with a space".into(),
            ));
        }
        if self.topic_filter.is_empty() {
            return Err(ConfigError::Invalid(
                "broker.topic_filter must not be empty".into(),
            ));
        }
        if self.subscribe_qos > 2 {
            return Err(ConfigError::Invalid(
                "broker.subscribe_qos must be 0, 1 or 2".into(),
            ));
        }
        if self.request_capacity == 0 {
            return Err(ConfigError::Invalid(
                "broker.request_capacity must be > 0".into(),
            ));
        }
        if self.reconnect_min_ms == 0 || self.reconnect_min_ms > self.reconnect_max_ms {
            return Err(ConfigError::Invalid(
                "broker.reconnect_min_ms must be > 0 and <= reconnect_max_ms".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.udp_port, 1884);
        assert_eq!(config.listen_addr(), "0.0.0.0:1884");
        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.topic_filter, "#");
        assert_eq!(config.fanout, FanoutPolicy::All);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
udp_port = 20000
fanout = "subscribers"
known_topics = ["pico/data", "pico/chunks"]

[broker]
host = "broker.local"
topic_filter = "pico/#"
"#,
        )
        .unwrap();
        assert_eq!(config.udp_port, 20000);
        assert_eq!(config.fanout, FanoutPolicy::Subscribers);
        assert_eq!(config.known_topics.len(), 2);
        assert_eq!(config.broker.host, "broker.local");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.workers, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "udp_port = 1999\n[broker]\nport = 1999").unwrap();
        let config = GatewayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.udp_port, 1999);
        assert_eq!(config.broker.port, 1999);
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = 0").unwrap();
        let err = GatewayConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_from_file_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "udp_port = \"not a port\"").unwrap();
        assert!(matches!(
            GatewayConfig::from_file(file.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_validate_rejections() {
        let mut c = GatewayConfig::default();
        c.max_clients = 0;
        assert!(c.validate().is_err());

        let mut c = GatewayConfig::default();
        c.max_message_size = 64;
        assert!(c.validate().is_err());

        let mut c = GatewayConfig::default();
        c.known_topics = vec![String::new()];
        assert!(c.validate().is_err());

        let mut c = GatewayConfig::default();
        c.broker.client_id = " gw".into();
        assert!(c.validate().is_err());

        let mut c = GatewayConfig::default();
        c.broker.subscribe_qos = 3;
        assert!(c.validate().is_err());

        let mut c = GatewayConfig::default();
        c.broker.reconnect_min_ms = 60_000;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = GatewayConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: GatewayConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.udp_port, config.udp_port);
        assert_eq!(back.broker.topic_filter, config.broker.topic_filter);
    }
}
