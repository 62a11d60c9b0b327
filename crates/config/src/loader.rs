use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::CourierConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "courier.toml",
    "courier.yaml",
    "courier.yml",
    "courier.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<CourierConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./courier.{toml,yaml,yml,json}`
/// 2. `~/.config/courier/courier.{toml,yaml,yml,json}`
///
/// Returns `CourierConfig::default()` if no file is found or it fails to parse.
pub fn discover_and_load() -> CourierConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    CourierConfig::default()
}

/// Full startup load: file (explicit or discovered), then environment overrides.
///
/// An explicit path must load; a discovered one falls back to defaults.
pub fn load(explicit: Option<&Path>) -> Result<CourierConfig> {
    let mut config = match explicit {
        Some(path) => load_config(path)?,
        None => discover_and_load(),
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Returns the user-global config directory (`~/.config/courier/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "courier").map(|d| d.config_dir().to_path_buf())
}

fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> Result<CourierConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        _ => Err(Error::UnsupportedFormat { ext: ext.into() }),
    }
}

// ── Environment overrides ───────────────────────────────────────────────────

/// Apply the process environment on top of `config`.
pub fn apply_env_overrides(config: &mut CourierConfig) -> Result<()> {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

/// Apply overrides from `lookup`. Empty values count as unset.
pub fn apply_env_overrides_with(
    config: &mut CourierConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = get("DISCORD_BOT_TOKEN") {
        config.bot.token = Some(Secret::new(token));
    }
    if let Some(prefix) = get("BOT_PREFIX") {
        config.bot.command_prefix = prefix;
    }

    if let Some(level) = get("LOG_LEVEL") {
        config.logging.level = level.to_lowercase();
    }
    if let Some(file) = get("LOG_FILE") {
        config.logging.file = Some(PathBuf::from(file));
    }

    if let Some(file) = get("MESSAGE_LOG_FILE") {
        config.store.fallback_file = PathBuf::from(file);
    }
    if let Some(file) = get("CHANNELS_FILE") {
        config.channels.file = PathBuf::from(file);
    }

    if let Some(host) = get("SOCKET_HOST") {
        config.socket.host = host;
    }
    if let Some(v) = get("SOCKET_PORT") {
        config.socket.port = parse_env("SOCKET_PORT", &v)?;
    }
    if let Some(v) = get("MAX_CONNECTIONS") {
        config.socket.max_connections = parse_env("MAX_CONNECTIONS", &v)?;
    }
    if let Some(v) = get("HEARTBEAT_INTERVAL") {
        config.socket.heartbeat_interval_secs = parse_env("HEARTBEAT_INTERVAL", &v)?;
    }
    if let Some(v) = get("SOCKET_WRITE_TIMEOUT_MS") {
        config.socket.write_timeout_ms = parse_env("SOCKET_WRITE_TIMEOUT_MS", &v)?;
    }

    if let Some(uri) = get("STORE_URI") {
        config.store.uri = uri;
    }
    if let Some(database) = get("STORE_DATABASE") {
        config.store.database = database;
    }
    if let Some(table) = get("STORE_TABLE") {
        config.store.table = table;
    }
    if let Some(v) = get("STORE_TIMEOUT_MS") {
        config.store.timeout_ms = parse_env("STORE_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = get("ENABLE_STORE") {
        config.store.enabled = parse_bool("ENABLE_STORE", &v)?;
    }

    if let Some(v) = get("METRICS_ADDR") {
        config.metrics.listen = Some(parse_env("METRICS_ADDR", &v)?);
    }

    Ok(())
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::invalid_env(name, value, e))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::invalid_env(name, value, "expected true or false")),
    }
}
