//! Startup checks that turn a bad configuration into one clear error.

use crate::{
    error::{Error, Result},
    schema::CourierConfig,
};

/// What the caller is about to run; only the relay needs the bot token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Relay,
    Offline,
}

/// Accepts `[A-Za-z_][A-Za-z0-9_]*`, which is safe to splice into SQL.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn validate(config: &CourierConfig, requirement: Requirement) -> Result<()> {
    if requirement == Requirement::Relay && config.bot.token.is_none() {
        return Err(Error::missing("DISCORD_BOT_TOKEN"));
    }
    if config.bot.command_prefix.is_empty() {
        return Err(Error::invalid("bot.command_prefix must not be empty"));
    }
    if config.socket.heartbeat_interval_secs == 0 {
        return Err(Error::invalid(
            "socket.heartbeat_interval_secs must be at least 1",
        ));
    }
    if config.socket.max_connections == 0 {
        return Err(Error::invalid("socket.max_connections must be at least 1"));
    }
    if !is_valid_identifier(&config.store.table) {
        return Err(Error::invalid(format!(
            "store.table {:?} is not a valid identifier",
            config.store.table
        )));
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, secrecy::Secret};

    fn with_token() -> CourierConfig {
        let mut cfg = CourierConfig::default();
        cfg.bot.token = Some(Secret::new("t".into()));
        cfg
    }

    #[test]
    fn relay_requires_token() {
        let err = validate(&CourierConfig::default(), Requirement::Relay).unwrap_err();
        assert!(matches!(err, Error::Missing { ref name } if name == "DISCORD_BOT_TOKEN"));
        assert!(validate(&CourierConfig::default(), Requirement::Offline).is_ok());
        assert!(validate(&with_token(), Requirement::Relay).is_ok());
    }

    #[test]
    fn zero_heartbeat_is_rejected() {
        let mut cfg = with_token();
        cfg.socket.heartbeat_interval_secs = 0;
        assert!(validate(&cfg, Requirement::Relay).is_err());
    }

    #[test]
    fn bad_table_name_is_rejected() {
        let mut cfg = with_token();
        cfg.store.table = "messages; DROP TABLE x".into();
        assert!(validate(&cfg, Requirement::Relay).is_err());
    }

    #[rstest]
    #[case("messages", true)]
    #[case("_chat_events2", true)]
    #[case("2fast", false)]
    #[case("", false)]
    #[case("with-dash", false)]
    fn identifiers(#[case] name: &str, #[case] ok: bool) {
        assert_eq!(is_valid_identifier(name), ok);
    }
}
