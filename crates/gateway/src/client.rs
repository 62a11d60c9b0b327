//! Subscriber side of the wire protocol, used by `courier listen`.

use {
    courier_common::ChatEvent,
    futures::StreamExt,
    tokio::net::TcpStream,
    tokio_util::{codec::FramedRead, sync::CancellationToken},
    tracing::{debug, info},
};

use crate::{
    Result,
    wire::{Frame, FrameCodec},
};

/// Connect to a hub and hand every event to `on_event` until the server
/// closes the connection or `cancel` fires. Heartbeats are consumed silently.
pub async fn listen<F>(host: &str, port: u16, cancel: CancellationToken, mut on_event: F) -> Result<()>
where
    F: FnMut(ChatEvent),
{
    let stream = TcpStream::connect((host, port)).await?;
    info!(host, port, "connected to broadcast hub");
    let mut frames = FramedRead::new(stream, FrameCodec);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("listener cancelled");
                return Ok(());
            },
            next = frames.next() => match next {
                Some(Ok(Frame::Heartbeat)) => debug!("heartbeat"),
                Some(Ok(Frame::Event(event))) => on_event(*event),
                Some(Err(e)) => return Err(e),
                None => {
                    info!("broadcast hub closed the connection");
                    return Ok(());
                },
            },
        }
    }
}
