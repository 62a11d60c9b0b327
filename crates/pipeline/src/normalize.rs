//! Raw platform event → [`ChatEvent`].

use {
    chrono::{DateTime, SecondsFormat, Utc},
    courier_common::{ChatEvent, EventKind},
};

use crate::{Error, Result};

/// Server label for direct messages.
pub const DM_SERVER: &str = "DM";

/// A platform message as handed over by the ingestion layer, before any
/// validation. Fields the platform may fail to resolve are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    pub guild_id: Option<u64>,
    pub guild_name: Option<String>,
    pub channel_id: Option<u64>,
    pub channel_name: Option<String>,
    pub author_id: Option<u64>,
    pub author: Option<String>,
    pub content: String,
    pub attachment_urls: Vec<String>,
    pub embed_count: u32,
    pub reaction_count: u32,
}

/// Build the immutable [`ChatEvent`] for `raw`, stamped with `now`.
///
/// Channel id, author id and author name are required. A channel without a
/// resolvable name is labelled with its id; an event outside any guild is
/// labelled [`DM_SERVER`] with no server id.
pub fn normalize(raw: RawEvent, kind: EventKind, now: DateTime<Utc>) -> Result<ChatEvent> {
    let channel_id = raw.channel_id.ok_or_else(|| Error::missing("channel_id"))?;
    let author_id = raw.author_id.ok_or_else(|| Error::missing("author_id"))?;
    let author = raw
        .author
        .filter(|a| !a.is_empty())
        .ok_or_else(|| Error::missing("author"))?;

    let (server, server_id) = match (raw.guild_id, raw.guild_name) {
        (Some(id), Some(name)) => (name, Some(id)),
        (Some(id), None) => (id.to_string(), Some(id)),
        (None, _) => (DM_SERVER.to_string(), None),
    };

    Ok(ChatEvent {
        kind,
        timestamp: now.to_rfc3339_opts(SecondsFormat::Micros, true),
        server: Some(server),
        server_id,
        channel: raw
            .channel_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| channel_id.to_string()),
        channel_id,
        author,
        author_id,
        content: raw.content,
        attachment_urls: raw.attachment_urls,
        embed_count: raw.embed_count,
        reaction_count: raw.reaction_count,
    })
}
