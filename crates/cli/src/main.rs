mod channel_commands;
mod listen_commands;
mod serve;
mod store_commands;

use std::{fs::OpenOptions, path::PathBuf, sync::Mutex};

use {
    clap::{Parser, Subcommand},
    courier_config::{CourierConfig, LoggingConfig},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "courier", about = "Courier — chat event relay")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides LOG_LEVEL.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (default: ./courier.toml, then ~/.config/courier/).
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay (default when no subcommand is provided).
    Serve,
    /// Connect to a running relay and print every event it broadcasts.
    Listen {
        /// Relay host (defaults to the configured socket host).
        #[arg(long)]
        host: Option<String>,
        /// Relay port (defaults to the configured socket port).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Monitored channel management.
    Channels {
        #[command(subcommand)]
        action: channel_commands::ChannelAction,
    },
    /// Durable store inspection.
    Store {
        #[command(subcommand)]
        action: store_commands::StoreAction,
    },
}

fn init_telemetry(cli: &Cli, logging: &LoggingConfig) -> anyhow::Result<()> {
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            )
        },
        None => None,
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if cli.json_logs || logging.json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Telemetry needs the logging section, so a bad config is reported
    // after the subscriber is up.
    let loaded = courier_config::load(cli.config.as_deref());
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_telemetry(&cli, &logging)?;
    let config: CourierConfig = loaded?;

    info!(version = env!("CARGO_PKG_VERSION"), "courier starting");

    match cli.command {
        None | Some(Commands::Serve) => serve::serve(config).await,
        Some(Commands::Listen { host, port }) => {
            let host = host.unwrap_or(config.socket.host);
            let port = port.unwrap_or(config.socket.port);
            listen_commands::listen(&host, port).await
        },
        Some(Commands::Channels { action }) => channel_commands::handle_channels(&config, action),
        Some(Commands::Store { action }) => store_commands::handle_store(&config, action).await,
    }
}
