//! Config schema types (bot, socket server, durable store, channels, logging, metrics).
use std::{net::SocketAddr, path::PathBuf, time::Duration};

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub bot: BotConfig,
    pub socket: SocketConfig,
    pub store: StoreConfig,
    pub channels: ChannelsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Chat platform bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot token. Never written back out.
    #[serde(skip_serializing)]
    pub token: Option<Secret<String>>,
    /// Prefix for chat commands (`!listen`, `!status`, ...).
    pub command_prefix: String,
    /// Messages kept in the platform cache so edits and deletions can be
    /// resolved to their full content.
    pub message_cache_size: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            command_prefix: "!".into(),
            message_cache_size: 1_000,
        }
    }
}

/// Broadcast socket server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    pub host: String,
    pub port: u16,
    /// Listen backlog for pending connections.
    pub max_connections: u32,
    pub heartbeat_interval_secs: u64,
    /// Upper bound on a single write to one client.
    pub write_timeout_ms: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8888,
            max_connections: 5,
            heartbeat_interval_secs: 30,
            write_timeout_ms: 5_000,
        }
    }
}

impl SocketConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Durable store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// When false every event goes straight to the fallback file.
    pub enabled: bool,
    /// sqlx connection URL.
    pub uri: String,
    /// Logical database name, reported in logs and stats.
    pub database: String,
    /// Table holding one row per event.
    pub table: String,
    /// Per-attempt connect and acquire timeout.
    pub timeout_ms: u64,
    /// Append-only file used when the store cannot take a write.
    pub fallback_file: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            uri: "sqlite://courier.db?mode=rwc".into(),
            database: "discord_bot".into(),
            table: "messages".into(),
            timeout_ms: 5_000,
            fallback_file: PathBuf::from("discord_messages.txt"),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Monitored-channel persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub file: PathBuf,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("monitored_channels.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Optional plain-text copy of the log stream.
    pub file: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: None,
            json: false,
        }
    }
}

/// Metrics exporter settings. No listener means metrics are not exported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub listen: Option<SocketAddr>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CourierConfig::default();
        assert_eq!(cfg.bot.command_prefix, "!");
        assert_eq!(cfg.socket.host, "localhost");
        assert_eq!(cfg.socket.port, 8888);
        assert_eq!(cfg.socket.max_connections, 5);
        assert_eq!(cfg.socket.heartbeat_interval(), Duration::from_secs(30));
        assert!(cfg.store.enabled);
        assert_eq!(cfg.store.table, "messages");
        assert_eq!(cfg.store.timeout(), Duration::from_millis(5_000));
        assert_eq!(cfg.channels.file, PathBuf::from("monitored_channels.json"));
        assert!(cfg.metrics.listen.is_none());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg: CourierConfig = toml::from_str(
            r#"
            [socket]
            port = 9999

            [bot]
            token = "abc"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.socket.port, 9999);
        assert_eq!(cfg.socket.host, "localhost");
        assert_eq!(cfg.bot.token.as_ref().unwrap().expose_secret(), "abc");
    }

    #[test]
    fn token_is_never_serialized() {
        let mut cfg = CourierConfig::default();
        cfg.bot.token = Some(Secret::new("hunter2".into()));
        let out = toml::to_string(&cfg).unwrap();
        assert!(!out.contains("hunter2"));
    }
}
