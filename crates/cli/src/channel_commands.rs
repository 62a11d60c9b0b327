//! `courier channels`: edit the monitored-channel file offline.

use {clap::Subcommand, courier_channels::ChannelFilter, courier_config::CourierConfig};

#[derive(Subcommand)]
pub enum ChannelAction {
    /// List monitored channel ids.
    List,
    /// Start monitoring a channel.
    Add { channel_id: u64 },
    /// Stop monitoring a channel.
    Remove { channel_id: u64 },
}

pub fn handle_channels(config: &CourierConfig, action: ChannelAction) -> anyhow::Result<()> {
    let filter = ChannelFilter::load(&config.channels.file);
    println!("{}", apply(&filter, action));
    Ok(())
}

fn apply(filter: &ChannelFilter, action: ChannelAction) -> String {
    match action {
        ChannelAction::List => {
            let ids = filter.monitored();
            if ids.is_empty() {
                "No channels monitored".to_string()
            } else {
                ids.iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        },
        ChannelAction::Add { channel_id } => {
            if filter.add(channel_id) {
                format!("Started monitoring {channel_id}")
            } else {
                format!("Already monitoring {channel_id}")
            }
        },
        ChannelAction::Remove { channel_id } => {
            if filter.remove(channel_id) {
                format!("Stopped monitoring {channel_id}")
            } else {
                format!("Not monitoring {channel_id}")
            }
        },
    }
}
