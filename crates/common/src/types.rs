//! The normalized chat event shared by persistence, fan-out and the wire.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// What happened to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    New,
    Edited,
    Deleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Edited => "EDITED",
            Self::Deleted => "DELETED",
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NEW" => Ok(Self::New),
            "EDITED" => Ok(Self::Edited),
            "DELETED" => Ok(Self::Deleted),
            other => Err(Error::message(format!("unknown event kind: {other}"))),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message occurrence on the chat platform, normalized.
///
/// Built once per platform event and never mutated afterwards; sinks receive
/// it behind an `Arc` and only read it. Field order here is the field order
/// on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// ISO-8601, UTC.
    pub timestamp: String,
    pub server: Option<String>,
    pub server_id: Option<u64>,
    pub channel: String,
    pub channel_id: u64,
    pub author: String,
    pub author_id: u64,
    pub content: String,
    #[serde(rename = "attachments")]
    pub attachment_urls: Vec<String>,
    #[serde(rename = "embeds")]
    pub embed_count: u32,
    #[serde(rename = "reactions")]
    pub reaction_count: u32,
}

impl ChatEvent {
    /// Deterministic storage key: `{channel_id}_{timestamp}_{author_id}`.
    ///
    /// Re-processing the same logical event yields the same key, so store
    /// writes overwrite instead of duplicating.
    pub fn record_key(&self) -> String {
        format!("{}_{}_{}", self.channel_id, self.timestamp, self.author_id)
    }

    /// Pretty JSON with two-space indentation, non-ASCII kept verbatim.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Server label used in log lines.
    pub fn origin(&self) -> &str {
        self.server.as_deref().unwrap_or("DM")
    }
}

/// Truncate `text` to at most `max_chars` characters for log previews,
/// appending `...` when something was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn sample() -> ChatEvent {
        ChatEvent {
            kind: EventKind::Edited,
            timestamp: "2025-03-01T10:15:30.123456Z".into(),
            server: Some("Guild".into()),
            server_id: Some(7),
            channel: "general".into(),
            channel_id: 42,
            author: "alice".into(),
            author_id: 1001,
            content: "héllo ✓".into(),
            attachment_urls: vec!["https://cdn.example/a.png".into()],
            embed_count: 1,
            reaction_count: 3,
        }
    }

    fn direct_message() -> ChatEvent {
        ChatEvent {
            server: None,
            server_id: None,
            ..sample()
        }
    }

    fn no_attachments() -> ChatEvent {
        ChatEvent {
            attachment_urls: Vec::new(),
            embed_count: 0,
            reaction_count: 0,
            ..sample()
        }
    }

    fn max_ids() -> ChatEvent {
        ChatEvent {
            server_id: Some(u64::MAX),
            channel_id: u64::MAX,
            author_id: u64::MAX,
            embed_count: u32::MAX,
            reaction_count: u32::MAX,
            ..sample()
        }
    }

    fn framing_characters() -> ChatEvent {
        ChatEvent {
            kind: EventKind::Deleted,
            content: "}\n\"quoted\" {\nHEARTBEAT\n\\ tail".into(),
            ..sample()
        }
    }

    #[rstest]
    #[case::guild(sample())]
    #[case::direct_message(direct_message())]
    #[case::no_attachments(no_attachments())]
    #[case::max_ids(max_ids())]
    #[case::framing_characters(framing_characters())]
    fn json_roundtrip_preserves_event(#[case] event: ChatEvent) {
        let back = ChatEvent::from_json(&event.to_json().unwrap()).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn wire_field_names_and_order() {
        let json = sample().to_json().unwrap();
        let keys = [
            "\"type\"",
            "\"timestamp\"",
            "\"server\"",
            "\"server_id\"",
            "\"channel\"",
            "\"channel_id\"",
            "\"author\"",
            "\"author_id\"",
            "\"content\"",
            "\"attachments\"",
            "\"embeds\"",
            "\"reactions\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
        assert!(json.contains("\"type\": \"EDITED\""));
        assert!(json.starts_with("{\n  \"type\""));
    }

    #[test]
    fn non_ascii_is_not_escaped() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("héllo ✓"));
    }

    #[test]
    fn dm_event_serializes_nulls() {
        let mut event = sample();
        event.server = None;
        event.server_id = None;
        let json = event.to_json().unwrap();
        assert!(json.contains("\"server\": null"));
        assert!(json.contains("\"server_id\": null"));
        assert_eq!(event.origin(), "DM");
    }

    #[test]
    fn record_key_is_deterministic() {
        let a = sample();
        let mut b = sample();
        b.content = "different body".into();
        assert_eq!(a.record_key(), "42_2025-03-01T10:15:30.123456Z_1001");
        assert_eq!(a.record_key(), b.record_key());
    }

    #[test]
    fn kind_parses_its_own_display() {
        for kind in [EventKind::New, EventKind::Edited, EventKind::Deleted] {
            assert_eq!(kind.to_string().parse::<EventKind>().unwrap(), kind);
        }
        assert!("new".parse::<EventKind>().is_err());
    }

    #[rstest]
    #[case("short", 50, "short")]
    #[case("abcdef", 3, "abc...")]
    #[case("ééééé", 2, "éé...")]
    #[case("", 5, "")]
    fn preview_truncates_on_char_boundaries(
        #[case] text: &str,
        #[case] max: usize,
        #[case] expected: &str,
    ) {
        assert_eq!(preview(text, max), expected);
    }
}
