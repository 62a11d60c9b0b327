//! Configuration loading, env substitution and validation.
//!
//! Config files: `courier.toml`, `courier.yaml`, or `courier.json`,
//! searched in `./` then `~/.config/courier/`. Environment variables
//! (including a `.env` file loaded by the binary) override file values.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in file text.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, apply_env_overrides_with, discover_and_load, load, load_config},
    schema::{
        BotConfig, ChannelsConfig, CourierConfig, LoggingConfig, MetricsConfig, SocketConfig,
        StoreConfig,
    },
    validate::{Requirement, is_valid_identifier, validate},
};
