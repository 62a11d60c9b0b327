//! `courier serve`: wire every component together and run until Ctrl-C.

use std::sync::Arc;

use {
    anyhow::Context,
    courier_channels::{ChannelFilter, Subscriber},
    courier_config::{CourierConfig, Requirement, validate},
    courier_discord::RelayHandler,
    courier_gateway::{BroadcastHub, HubConfig},
    courier_metrics::{MetricsRecorderConfig, init_metrics},
    courier_pipeline::DistributionPipeline,
    courier_store::{EventStore, FileSink, PersistenceGateway, StoreSupervisor},
    tokio_util::sync::CancellationToken,
    tracing::{error, info},
};

pub async fn serve(config: CourierConfig) -> anyhow::Result<()> {
    validate(&config, Requirement::Relay)?;
    let token = config
        .bot
        .token
        .clone()
        .context("DISCORD_BOT_TOKEN is required")?;

    init_metrics(MetricsRecorderConfig {
        listen: config.metrics.listen,
        ..Default::default()
    })?;

    let filter = Arc::new(ChannelFilter::load(&config.channels.file));
    info!(
        path = %config.channels.file.display(),
        monitored = filter.len(),
        "monitored channels loaded"
    );

    let supervisor = Arc::new(StoreSupervisor::new(&config.store)?);
    supervisor.initialize().await;
    let fallback = FileSink::new(&config.store.fallback_file);
    let persistence = if config.store.enabled {
        let store: Arc<dyn EventStore> = supervisor.clone();
        PersistenceGateway::new(Some(store), fallback)
    } else {
        PersistenceGateway::fallback_only(fallback)
    };

    let pipeline = Arc::new(DistributionPipeline::new(
        Arc::clone(&filter),
        Arc::new(persistence),
    ));

    let hub = Arc::new(BroadcastHub::new(HubConfig::from(&config.socket)));
    hub.start()
        .await
        .context("failed to start the broadcast server")?;
    let subscriber: Arc<dyn Subscriber> = hub.clone();
    pipeline.add_subscriber(subscriber);

    let handler = RelayHandler::new(
        Arc::clone(&pipeline),
        Arc::clone(&hub),
        config.bot.command_prefix.clone(),
        config.bot.message_cache_size,
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                on_signal.cancel();
            },
            Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
        }
    });

    let result = courier_discord::run(
        &token,
        handler,
        config.bot.message_cache_size,
        cancel.clone(),
    )
    .await;
    if let Err(e) = &result {
        error!(error = %e, "discord client stopped");
    }

    hub.stop().await;
    supervisor.disconnect().await;
    info!("courier stopped");
    result.map_err(Into::into)
}
