//! `courier store`: inspect the durable store.

use {
    anyhow::bail,
    clap::Subcommand,
    courier_common::preview,
    courier_config::CourierConfig,
    courier_store::{EventStore, StoreSupervisor},
};

#[derive(Subcommand)]
pub enum StoreAction {
    /// Connection state and record count as JSON.
    Stats,
    /// Most recently stored events, newest first.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

pub async fn handle_store(config: &CourierConfig, action: StoreAction) -> anyhow::Result<()> {
    let supervisor = StoreSupervisor::new(&config.store)?;
    let connected = supervisor.initialize().await;

    let result = match action {
        StoreAction::Stats => print_stats(&supervisor, connected).await,
        StoreAction::Recent { limit } => {
            if !connected {
                bail!("durable store {} is not reachable", config.store.database);
            }
            print_recent(&supervisor, limit).await
        },
    };
    supervisor.disconnect().await;
    result
}

async fn print_stats(supervisor: &StoreSupervisor, connected: bool) -> anyhow::Result<()> {
    let mut stats = serde_json::to_value(supervisor.stats().await)?;
    if connected && let Some(fields) = stats.as_object_mut() {
        fields.insert("records".into(), supervisor.count().await?.into());
    }
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn print_recent(supervisor: &StoreSupervisor, limit: usize) -> anyhow::Result<()> {
    let records = supervisor.recent(limit).await?;
    if records.is_empty() {
        println!("No stored events");
        return Ok(());
    }
    for record in records {
        let event = &record.event;
        println!(
            "{} [{}] {}/{} {}: {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            event.kind,
            event.origin(),
            event.channel,
            event.author,
            preview(&event.content, 80)
        );
    }
    Ok(())
}
