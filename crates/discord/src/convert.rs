//! serenity [`Message`] → [`RawEvent`].

use {
    courier_pipeline::RawEvent,
    serenity::all::{Context, Message, MessageUpdateEvent},
};

/// Fields read directly off the message, with guild and channel names left
/// unresolved.
pub fn raw_fields(msg: &Message) -> RawEvent {
    RawEvent {
        guild_id: msg.guild_id.map(|g| g.get()),
        guild_name: None,
        channel_id: Some(msg.channel_id.get()),
        channel_name: None,
        author_id: Some(msg.author.id.get()),
        author: Some(msg.author.tag()),
        content: msg.content.clone(),
        attachment_urls: msg.attachments.iter().map(|a| a.url.clone()).collect(),
        embed_count: msg.embeds.len() as u32,
        reaction_count: msg.reactions.len() as u32,
    }
}

/// [`raw_fields`] plus guild and channel names from the cache, falling back
/// to an HTTP lookup for the channel.
pub async fn raw_event(ctx: &Context, msg: &Message) -> RawEvent {
    let mut raw = raw_fields(msg);
    raw.guild_name = msg.guild_id.and_then(|g| g.name(ctx));
    raw.channel_name = msg.channel_id.name(ctx).await.ok();
    raw
}

/// The parts of a gateway edit that can change a cached message. `None`
/// means the field was not part of the edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageEdit {
    pub content: Option<String>,
    pub attachment_urls: Option<Vec<String>>,
    pub embed_count: Option<u32>,
}

impl From<&MessageUpdateEvent> for MessageEdit {
    fn from(event: &MessageUpdateEvent) -> Self {
        Self {
            content: event.content.clone(),
            attachment_urls: event
                .attachments
                .as_ref()
                .map(|a| a.iter().map(|a| a.url.clone()).collect()),
            embed_count: event.embeds.as_ref().map(|e| e.len() as u32),
        }
    }
}

/// Apply a partial edit to a previously seen message.
pub fn apply_update(mut raw: RawEvent, edit: &MessageEdit) -> RawEvent {
    if let Some(content) = &edit.content {
        raw.content = content.clone();
    }
    if let Some(urls) = &edit.attachment_urls {
        raw.attachment_urls = urls.clone();
    }
    if let Some(count) = edit.embed_count {
        raw.embed_count = count;
    }
    raw
}

/// Fill guild and channel names that were not resolved when the message was
/// first seen. Names already present are kept.
pub fn fill_names(
    raw: &mut RawEvent,
    guild_name: impl FnOnce(u64) -> Option<String>,
    channel_name: impl FnOnce(u64) -> Option<String>,
) {
    if raw.guild_name.is_none()
        && let Some(id) = raw.guild_id
    {
        raw.guild_name = guild_name(id);
    }
    if raw.channel_name.is_none()
        && let Some(id) = raw.channel_id
    {
        raw.channel_name = channel_name(id);
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn cached() -> RawEvent {
        RawEvent {
            guild_id: Some(100),
            guild_name: None,
            channel_id: Some(42),
            channel_name: None,
            author_id: Some(7),
            author: Some("alice".into()),
            content: "before".into(),
            attachment_urls: vec!["https://cdn.example/a.png".into()],
            embed_count: 1,
            reaction_count: 2,
        }
    }

    #[rstest]
    #[case::nothing(MessageEdit::default(), "before", 1, 1)]
    #[case::content(
        MessageEdit { content: Some("after".into()), ..MessageEdit::default() },
        "after", 1, 1
    )]
    #[case::attachments_cleared(
        MessageEdit { attachment_urls: Some(Vec::new()), ..MessageEdit::default() },
        "before", 0, 1
    )]
    #[case::embeds(
        MessageEdit { embed_count: Some(3), ..MessageEdit::default() },
        "before", 1, 3
    )]
    #[case::everything(
        MessageEdit {
            content: Some(String::new()),
            attachment_urls: Some(vec!["x".into(), "y".into()]),
            embed_count: Some(0),
        },
        "", 2, 0
    )]
    fn edits_replace_only_present_fields(
        #[case] edit: MessageEdit,
        #[case] content: &str,
        #[case] attachments: usize,
        #[case] embeds: u32,
    ) {
        let raw = apply_update(cached(), &edit);
        assert_eq!(raw.content, content);
        assert_eq!(raw.attachment_urls.len(), attachments);
        assert_eq!(raw.embed_count, embeds);
        assert_eq!(raw.reaction_count, 2);
        assert_eq!(raw.channel_id, Some(42));
        assert_eq!(raw.author.as_deref(), Some("alice"));
    }

    #[test]
    fn missing_names_are_filled() {
        let mut raw = cached();
        fill_names(
            &mut raw,
            |id| (id == 100).then(|| "Rustaceans".to_string()),
            |id| (id == 42).then(|| "general".to_string()),
        );
        assert_eq!(raw.guild_name.as_deref(), Some("Rustaceans"));
        assert_eq!(raw.channel_name.as_deref(), Some("general"));
    }

    #[test]
    fn resolved_names_are_kept() {
        let mut raw = RawEvent {
            guild_name: Some("Old guild".into()),
            channel_name: Some("old-channel".into()),
            ..cached()
        };
        fill_names(
            &mut raw,
            |_| panic!("guild lookup not needed"),
            |_| panic!("channel lookup not needed"),
        );
        assert_eq!(raw.guild_name.as_deref(), Some("Old guild"));
        assert_eq!(raw.channel_name.as_deref(), Some("old-channel"));
    }

    #[test]
    fn direct_messages_skip_the_guild_lookup() {
        let mut raw = RawEvent {
            guild_id: None,
            ..cached()
        };
        fill_names(&mut raw, |_| panic!("no guild"), |_| None);
        assert_eq!(raw.guild_name, None);
        assert_eq!(raw.channel_name, None);
    }
}
