//! Prefix commands that manage the monitored-channel set.
//!
//! Parsing and reply text are pure so they can be tested without a gateway
//! connection; the handler does the side effects.

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start monitoring a channel, the current one when no id is given.
    Listen(Option<u64>),
    /// Stop monitoring a channel, the current one when no id is given.
    Unlisten(Option<u64>),
    Ping,
    Status,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Listen(_) => "listen",
            Self::Unlisten(_) => "unlisten",
            Self::Ping => "ping",
            Self::Status => "status",
        }
    }
}

/// Parse `content` as a command.
///
/// Returns `Ok(None)` for anything that is not one of ours, including
/// messages without the prefix. Extra arguments are ignored.
pub fn parse(content: &str, prefix: &str) -> Result<Option<Command>> {
    let Some(rest) = content.trim_start().strip_prefix(prefix) else {
        return Ok(None);
    };
    let mut words = rest.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let arg = words.next();
    let command = match name {
        "listen" => Command::Listen(arg.map(parse_channel).transpose()?),
        "unlisten" => Command::Unlisten(arg.map(parse_channel).transpose()?),
        "ping" => Command::Ping,
        "status" => Command::Status,
        _ => return Ok(None),
    };
    Ok(Some(command))
}

/// Accepts a bare id or a channel mention (`<#id>`).
fn parse_channel(arg: &str) -> Result<u64> {
    let digits = arg
        .strip_prefix("<#")
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(arg);
    match digits.parse::<u64>() {
        Ok(id) if id != 0 => Ok(id),
        _ => Err(Error::invalid_channel(arg)),
    }
}

// ── Replies ────────────────────────────────────────────────────────────────

pub const PONG: &str = "Pong!";

pub const NO_CHANNELS: &str = "No channels monitored";

pub fn listen_reply(channel_id: u64, added: bool) -> String {
    let verb = if added {
        "Started"
    } else {
        "Already"
    };
    format!("{verb} monitoring <#{channel_id}>")
}

pub fn unlisten_reply(channel_id: u64, removed: bool) -> String {
    let verb = if removed {
        "Stopped"
    } else {
        "Not"
    };
    format!("{verb} monitoring <#{channel_id}>")
}

/// Status block; `channels` pairs each monitored id with its cached name.
pub fn status_reply(running: bool, clients: usize, channels: &[(u64, Option<String>)]) -> String {
    if channels.is_empty() {
        return NO_CHANNELS.to_string();
    }
    let socket = if running {
        "Running"
    } else {
        "Stopped"
    };
    let mut lines = vec![
        "**Status:**".to_string(),
        format!("Socket: {socket}"),
        format!("Clients: {clients}"),
        format!("Channels ({}):", channels.len()),
    ];
    lines.extend(channels.iter().map(|(id, name)| {
        format!("• {} ({id})", name.as_deref().unwrap_or("Unknown"))
    }));
    lines.join("\n")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("!listen", Command::Listen(None))]
    #[case("!listen 42", Command::Listen(Some(42)))]
    #[case("!listen <#42>", Command::Listen(Some(42)))]
    #[case("  !unlisten 7 trailing", Command::Unlisten(Some(7)))]
    #[case("!unlisten", Command::Unlisten(None))]
    #[case("!ping", Command::Ping)]
    #[case("!status", Command::Status)]
    fn parses_commands(#[case] content: &str, #[case] expected: Command) {
        assert_eq!(parse(content, "!").unwrap(), Some(expected));
    }

    #[rstest]
    #[case("hello there")]
    #[case("!")]
    #[case("!unknown 1")]
    #[case("?ping")]
    #[case("!Ping")]
    fn ignores_other_messages(#[case] content: &str) {
        assert_eq!(parse(content, "!").unwrap(), None);
    }

    #[rstest]
    #[case("!listen general")]
    #[case("!listen 0")]
    #[case("!unlisten -5")]
    #[case("!listen <#abc>")]
    fn rejects_bad_channel_ids(#[case] content: &str) {
        assert!(matches!(
            parse(content, "!"),
            Err(Error::InvalidChannel { .. })
        ));
    }

    #[test]
    fn multi_char_prefix() {
        assert_eq!(parse("c!ping", "c!").unwrap(), Some(Command::Ping));
        assert_eq!(parse("!ping", "c!").unwrap(), None);
    }

    #[test]
    fn monitoring_replies() {
        assert_eq!(listen_reply(42, true), "Started monitoring <#42>");
        assert_eq!(listen_reply(42, false), "Already monitoring <#42>");
        assert_eq!(unlisten_reply(42, true), "Stopped monitoring <#42>");
        assert_eq!(unlisten_reply(42, false), "Not monitoring <#42>");
    }

    #[test]
    fn status_without_channels() {
        assert_eq!(status_reply(true, 3, &[]), NO_CHANNELS);
    }

    #[test]
    fn status_lists_channels() {
        let reply = status_reply(false, 2, &[(1, Some("general".into())), (2, None)]);
        assert_eq!(
            reply,
            "**Status:**\nSocket: Stopped\nClients: 2\nChannels (2):\n• general (1)\n• Unknown (2)"
        );
    }
}
