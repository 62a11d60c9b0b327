//! Discord event handler for serenity.
//!
//! Feeds new, edited and deleted messages into the pipeline and answers the
//! monitoring commands.

use std::{
    num::NonZeroU64,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    courier_common::EventKind,
    courier_gateway::BroadcastHub,
    courier_pipeline::{DistributionPipeline, RawEvent},
    serenity::{
        all::{
            ChannelId, Context, EventHandler, GatewayIntents, GuildId, Message, MessageId,
            MessageUpdateEvent, Ready,
        },
        async_trait,
    },
    tracing::{debug, info, warn},
};

use crate::{
    cache::MessageCache,
    commands::{self, Command},
    convert::{self, MessageEdit},
};

/// Handler for Discord gateway events.
pub struct RelayHandler {
    pipeline: Arc<DistributionPipeline>,
    hub: Arc<BroadcastHub>,
    prefix: String,
    messages: MessageCache,
    bot_user_id: AtomicU64,
}

impl RelayHandler {
    pub fn new(
        pipeline: Arc<DistributionPipeline>,
        hub: Arc<BroadcastHub>,
        prefix: impl Into<String>,
        cache_size: usize,
    ) -> Self {
        Self {
            pipeline,
            hub,
            prefix: prefix.into(),
            messages: MessageCache::new(cache_size),
            bot_user_id: AtomicU64::new(0),
        }
    }

    /// Required gateway intents for the bot.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }

    fn is_own(&self, author_id: u64) -> bool {
        author_id == self.bot_user_id.load(Ordering::Relaxed)
    }

    /// Names are resolved only for monitored channels.
    async fn snapshot(&self, ctx: &Context, msg: &Message) -> RawEvent {
        if self.pipeline.filter().is_monitored(msg.channel_id.get()) {
            convert::raw_event(ctx, msg).await
        } else {
            convert::raw_fields(msg)
        }
    }

    fn run_command(&self, ctx: &Context, msg: &Message, command: Command) -> String {
        let current = msg.channel_id.get();
        let filter = self.pipeline.filter();
        match command {
            Command::Listen(target) => {
                let channel_id = target.unwrap_or(current);
                commands::listen_reply(channel_id, filter.add(channel_id))
            },
            Command::Unlisten(target) => {
                let channel_id = target.unwrap_or(current);
                commands::unlisten_reply(channel_id, filter.remove(channel_id))
            },
            Command::Ping => commands::PONG.to_string(),
            Command::Status => {
                let channels: Vec<(u64, Option<String>)> = filter
                    .monitored()
                    .into_iter()
                    .map(|id| (id, cached_channel_name(ctx, id)))
                    .collect();
                commands::status_reply(self.hub.is_running(), self.hub.client_count(), &channels)
            },
        }
    }

    async fn handle_commands(&self, ctx: &Context, msg: &Message) {
        let command = match commands::parse(&msg.content, &self.prefix) {
            Ok(Some(command)) => command,
            Ok(None) => return,
            Err(e) => {
                debug!(channel_id = msg.channel_id.get(), error = %e, "bad command argument");
                self.reply(ctx, msg, &e.to_string()).await;
                return;
            },
        };
        info!(
            command = command.name(),
            channel_id = msg.channel_id.get(),
            author = %msg.author.tag(),
            "command received"
        );
        let reply = self.run_command(ctx, msg, command);
        self.reply(ctx, msg, &reply).await;
    }

    async fn reply(&self, ctx: &Context, msg: &Message, text: &str) {
        if let Err(e) = msg.channel_id.say(&ctx.http, text).await {
            warn!(channel_id = msg.channel_id.get(), error = %e, "failed to send command response");
        }
    }
}

fn cached_channel_name(ctx: &Context, channel_id: u64) -> Option<String> {
    let id = ChannelId::from(NonZeroU64::new(channel_id)?);
    ctx.cache.channel(id).map(|c| c.name.clone())
}

/// Cached messages outside monitored channels carry no names. Look them up
/// from serenity's cache before relaying.
fn fill_cached_names(ctx: &Context, raw: &mut RawEvent) {
    convert::fill_names(
        raw,
        |id| NonZeroU64::new(id).and_then(|id| GuildId::from(id).name(ctx)),
        |id| cached_channel_name(ctx, id),
    );
}

#[async_trait]
impl EventHandler for RelayHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        self.bot_user_id.store(ready.user.id.get(), Ordering::Relaxed);
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            monitored = self.pipeline.filter().len(),
            "discord bot ready"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if self.is_own(msg.author.id.get()) {
            return;
        }

        let raw = self.snapshot(&ctx, &msg).await;
        self.messages.insert(msg.id.get(), raw.clone());
        self.pipeline.ingest(raw, EventKind::New).await;

        self.handle_commands(&ctx, &msg).await;
    }

    async fn message_update(
        &self,
        ctx: Context,
        _old_if_available: Option<Message>,
        new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        let message_id = event.id.get();
        let raw = match new {
            Some(msg) => {
                let raw = self.snapshot(&ctx, &msg).await;
                self.messages.insert(message_id, raw.clone());
                raw
            },
            None => match self.messages.apply_edit(message_id, &MessageEdit::from(&event)) {
                Some(mut raw) => {
                    fill_cached_names(&ctx, &mut raw);
                    raw
                },
                None => {
                    debug!(message_id, "edited message not cached, skipping");
                    return;
                },
            },
        };
        self.pipeline.ingest(raw, EventKind::Edited).await;
    }

    async fn message_delete(
        &self,
        ctx: Context,
        channel_id: ChannelId,
        deleted_message_id: MessageId,
        _guild_id: Option<GuildId>,
    ) {
        let message_id = deleted_message_id.get();
        let Some(mut raw) = self.messages.remove(message_id) else {
            debug!(
                channel_id = channel_id.get(),
                message_id, "deleted message not cached, skipping"
            );
            return;
        };
        fill_cached_names(&ctx, &mut raw);
        self.pipeline.ingest(raw, EventKind::Deleted).await;
    }
}
