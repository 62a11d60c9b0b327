//! Client construction and lifecycle.

use std::sync::Arc;

use {
    secrecy::{ExposeSecret, Secret},
    serenity::{Client, cache},
    tokio_util::sync::CancellationToken,
    tracing::info,
};

use crate::{Result, handler::RelayHandler};

/// Connect with `handler` and run until the gateway closes or `cancel`
/// fires. `cache_size` bounds serenity's per-channel message cache.
pub async fn run(
    token: &Secret<String>,
    handler: RelayHandler,
    cache_size: usize,
    cancel: CancellationToken,
) -> Result<()> {
    let mut settings = cache::Settings::default();
    settings.max_messages = cache_size;

    let mut client = Client::builder(token.expose_secret(), RelayHandler::intents())
        .event_handler(handler)
        .cache_settings(settings)
        .await?;
    let shards = Arc::clone(&client.shard_manager);

    info!("connecting to discord");
    tokio::select! {
        result = client.start() => result?,
        () = cancel.cancelled() => {
            info!("disconnecting from discord");
            shards.shutdown_all().await;
        },
    }
    Ok(())
}
