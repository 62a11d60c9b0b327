//! `courier listen`: print the relay's event stream.

use {
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

pub async fn listen(host: &str, port: u16) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let mut received = 0u64;
    courier_gateway::client::listen(host, port, cancel, |event| {
        received += 1;
        match event.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => warn!(error = %e, "failed to render event"),
        }
    })
    .await?;
    info!(received, "listener stopped");
    Ok(())
}
