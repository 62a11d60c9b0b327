//! TCP broadcast server: accept loop, per-client heartbeats, fan-out.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    courier_channels::Subscriber,
    courier_common::ChatEvent,
    courier_config::SocketConfig,
    futures::future::join_all,
    tokio::{
        io::{AsyncRead, AsyncReadExt},
        net::{TcpListener, TcpSocket},
        task::JoinHandle,
        time::MissedTickBehavior,
    },
    tokio_util::{sync::CancellationToken, task::TaskTracker},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use courier_metrics::{broadcast as broadcast_metrics, counter};

use crate::{
    Error, Result,
    registry::{BoxedWriter, ClientConnection, ClientId, ClientRegistry},
    wire::{HEARTBEAT_FRAME, encode_event},
};

/// Name the hub registers under as a pipeline subscriber.
pub const HUB_SUBSCRIBER_NAME: &str = "broadcast-hub";

/// Time `stop()` waits for the accept loop and client tasks to wind down.
const STOP_GRACE: Duration = Duration::from_secs(5);

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub host: String,
    pub port: u16,
    /// Listen backlog.
    pub backlog: u32,
    pub heartbeat_interval: Duration,
    pub write_timeout: Duration,
}

impl From<&SocketConfig> for HubConfig {
    fn from(config: &SocketConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            backlog: config.max_connections,
            heartbeat_interval: config.heartbeat_interval(),
            write_timeout: config.write_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Result of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Everything a client task needs, cloned per connection.
#[derive(Clone)]
struct ClientContext {
    registry: Arc<ClientRegistry>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    heartbeat_interval: Duration,
    write_timeout: Duration,
}

struct RunHandle {
    ctx: ClientContext,
    accept_task: JoinHandle<()>,
    local_addr: SocketAddr,
}

struct Lifecycle {
    state: HubState,
    run: Option<RunHandle>,
}

/// Socket server fanning events out to every connected client.
pub struct BroadcastHub {
    config: HubConfig,
    registry: Arc<ClientRegistry>,
    lifecycle: Mutex<Lifecycle>,
}

impl BroadcastHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            config,
            registry: Arc::new(ClientRegistry::new()),
            lifecycle: Mutex::new(Lifecycle {
                state: HubState::Stopped,
                run: None,
            }),
        }
    }

    pub fn state(&self) -> HubState {
        self.lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state
    }

    pub fn is_running(&self) -> bool {
        self.state() == HubState::Running
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .run
            .as_ref()
            .map(|run| run.local_addr)
    }

    // ── Lifecycle ──────────────────────────────────────────────────────────

    /// Bind and start accepting. A bind failure or a zero heartbeat interval
    /// is returned to the caller; starting a hub that is not stopped is a
    /// no-op.
    pub async fn start(&self) -> Result<()> {
        if self.config.heartbeat_interval.is_zero() {
            return Err(Error::invalid_config("heartbeat interval must be non-zero"));
        }
        {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
            if lifecycle.state != HubState::Stopped {
                warn!(state = ?lifecycle.state, "broadcast hub already started");
                return Ok(());
            }
            lifecycle.state = HubState::Starting;
        }

        let (listener, local_addr) = match self.bind().await {
            Ok(bound) => bound,
            Err(e) => {
                self.set_state(HubState::Stopped);
                return Err(e);
            },
        };

        let ctx = ClientContext {
            registry: Arc::clone(&self.registry),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            heartbeat_interval: self.config.heartbeat_interval,
            write_timeout: self.config.write_timeout,
        };
        let accept_task = tokio::spawn(accept_loop(listener, ctx.clone()));

        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        lifecycle.run = Some(RunHandle {
            ctx,
            accept_task,
            local_addr,
        });
        lifecycle.state = HubState::Running;
        info!(
            %local_addr,
            heartbeat_secs = self.config.heartbeat_interval.as_secs(),
            "broadcast hub listening"
        );
        Ok(())
    }

    /// Cancel the accept loop, close every client and wait (bounded) for the
    /// tasks to finish. The listener is dropped with the accept loop.
    pub async fn stop(&self) {
        let run = {
            let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
            if lifecycle.state != HubState::Running {
                return;
            }
            lifecycle.state = HubState::Stopping;
            lifecycle.run.take()
        };
        let Some(run) = run else {
            self.set_state(HubState::Stopped);
            return;
        };

        run.ctx.cancel.cancel();
        let closed = self.registry.close_all().await;

        if tokio::time::timeout(STOP_GRACE, run.accept_task)
            .await
            .is_err()
        {
            warn!("accept loop did not stop within the grace period");
        }
        run.ctx.tracker.close();
        if tokio::time::timeout(STOP_GRACE, run.ctx.tracker.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = run.ctx.tracker.len(),
                "client tasks did not stop within the grace period"
            );
        }

        self.set_state(HubState::Stopped);
        info!(closed_clients = closed, "broadcast hub stopped");
    }

    async fn bind(&self) -> Result<(TcpListener, SocketAddr)> {
        let target = format!("{}:{}", self.config.host, self.config.port);
        let addrs: Vec<SocketAddr> =
            tokio::net::lookup_host((self.config.host.as_str(), self.config.port))
                .await
                .map_err(|source| Error::Resolve {
                    addr: target.clone(),
                    source,
                })?
                .collect();
        let addr = addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| {
                Error::bind(
                    &target,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
                )
            })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        };
        let socket = socket.map_err(|e| Error::bind(&target, e))?;
        socket
            .set_reuseaddr(true)
            .map_err(|e| Error::bind(&target, e))?;
        socket.bind(addr).map_err(|e| Error::bind(&target, e))?;
        let listener = socket
            .listen(self.config.backlog)
            .map_err(|e| Error::bind(&target, e))?;
        let local_addr = listener.local_addr()?;
        Ok((listener, local_addr))
    }

    fn set_state(&self, state: HubState) {
        self.lifecycle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state = state;
    }

    fn running_context(&self) -> Option<ClientContext> {
        let lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        match (&lifecycle.state, &lifecycle.run) {
            (HubState::Running, Some(run)) => Some(run.ctx.clone()),
            _ => None,
        }
    }

    // ── Clients ────────────────────────────────────────────────────────────

    /// Register an already-connected stream pair and start its handler.
    /// Accepted sockets come through here; so can in-process streams.
    pub fn attach(
        &self,
        addr: SocketAddr,
        reader: BoxedReader,
        writer: BoxedWriter,
    ) -> Result<ClientId> {
        let ctx = self.running_context().ok_or(Error::NotRunning)?;
        Ok(spawn_client(&ctx, addr, reader, writer))
    }

    /// Send `event` to every client concurrently; clients whose send failed
    /// are removed once all sends have completed.
    pub async fn broadcast(&self, event: &ChatEvent) -> Result<BroadcastReport> {
        let clients = self.registry.snapshot();
        if clients.is_empty() {
            return Ok(BroadcastReport::default());
        }
        let frame = encode_event(event)?;

        let sends = clients.iter().map(|conn| {
            let frame = frame.clone();
            async move { (conn.id(), conn.send(&frame).await) }
        });
        let results = join_all(sends).await;

        let mut report = BroadcastReport::default();
        let mut dead = Vec::new();
        for (id, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(client_id = %id, error = %e, "broadcast send failed, dropping client");
                    dead.push(id);
                },
            }
        }
        report.failed = dead.len();
        for id in dead {
            self.registry.deregister(id).await;
        }

        #[cfg(feature = "metrics")]
        {
            counter!(broadcast_metrics::EVENTS_SENT_TOTAL).increment(report.delivered as u64);
            counter!(broadcast_metrics::SEND_FAILURES_TOTAL).increment(report.failed as u64);
        }
        debug!(
            delivered = report.delivered,
            failed = report.failed,
            "event broadcast"
        );
        Ok(report)
    }
}

#[async_trait]
impl Subscriber for BroadcastHub {
    fn name(&self) -> &str {
        HUB_SUBSCRIBER_NAME
    }

    async fn deliver(&self, event: &ChatEvent) -> courier_channels::Result<()> {
        self.broadcast(event)
            .await
            .map(|_| ())
            .map_err(|e| courier_channels::Error::external("broadcast failed", e))
    }
}

// ── Tasks ───────────────────────────────────────────────────────────────────

async fn accept_loop(listener: TcpListener, ctx: ClientContext) {
    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%addr, error = %e, "failed to set TCP_NODELAY");
                    }
                    let (reader, writer) = stream.into_split();
                    spawn_client(&ctx, addr, Box::new(reader), Box::new(writer));
                },
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    // Typically fd exhaustion; give it a moment.
                    tokio::time::sleep(Duration::from_millis(100)).await;
                },
            },
        }
    }
    debug!("accept loop stopped");
}

fn spawn_client(
    ctx: &ClientContext,
    addr: SocketAddr,
    reader: BoxedReader,
    writer: BoxedWriter,
) -> ClientId {
    let conn = ctx.registry.register(addr, writer, ctx.write_timeout);
    let id = conn.id();
    #[cfg(feature = "metrics")]
    counter!(broadcast_metrics::CONNECTIONS_TOTAL).increment(1);
    info!(client_id = %id, %addr, clients = ctx.registry.len(), "client connected");
    ctx.tracker.spawn(client_task(ctx.clone(), conn, reader));
    id
}

/// Heartbeat immediately and then every interval; watch the read half for
/// EOF. Any failure removes this client only.
async fn client_task(ctx: ClientContext, conn: Arc<ClientConnection>, mut reader: BoxedReader) {
    let mut ticker = tokio::time::interval(ctx.heartbeat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut buf = [0u8; 256];

    let reason = loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break "server stopping",
            _ = ticker.tick() => {
                if let Err(e) = conn.send(HEARTBEAT_FRAME).await {
                    debug!(client_id = %conn.id(), error = %e, "heartbeat failed");
                    break "heartbeat failed";
                }
                #[cfg(feature = "metrics")]
                counter!(broadcast_metrics::HEARTBEATS_SENT_TOTAL).increment(1);
            },
            read = reader.read(&mut buf) => match read {
                Ok(0) => break "disconnected",
                // Clients have nothing to say; input is discarded.
                Ok(_) => {},
                Err(e) => {
                    debug!(client_id = %conn.id(), error = %e, "client read failed");
                    break "read error";
                },
            },
        }
    };

    if ctx.registry.deregister(conn.id()).await {
        info!(
            client_id = %conn.id(),
            addr = %conn.addr(),
            reason,
            clients = ctx.registry.len(),
            "client disconnected"
        );
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        courier_common::EventKind,
        std::{
            pin::Pin,
            task::{Context, Poll},
        },
        tokio::io::{AsyncWrite, DuplexStream},
    };

    fn config(heartbeat: Duration) -> HubConfig {
        HubConfig {
            host: "127.0.0.1".into(),
            port: 0,
            backlog: 16,
            heartbeat_interval: heartbeat,
            write_timeout: Duration::from_secs(1),
        }
    }

    fn event(content: &str) -> ChatEvent {
        ChatEvent {
            kind: EventKind::New,
            timestamp: "2025-03-01T10:15:30.000000Z".into(),
            server: Some("Guild".into()),
            server_id: Some(1),
            channel: "general".into(),
            channel_id: 42,
            author: "alice".into(),
            author_id: 7,
            content: content.into(),
            attachment_urls: Vec::new(),
            embed_count: 0,
            reaction_count: 0,
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    /// Accepts heartbeats, rejects event frames.
    struct RejectEvents;

    impl AsyncWrite for RejectEvents {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            if buf.starts_with(b"{") {
                Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
            } else {
                Poll::Ready(Ok(buf.len()))
            }
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// A client whose read half stays open; returns the test's end of the
    /// write half.
    fn attach_duplex(hub: &BroadcastHub, idle_readers: &mut Vec<DuplexStream>) -> DuplexStream {
        let (server_write, client_read) = tokio::io::duplex(64 * 1024);
        let (server_read, client_write) = tokio::io::duplex(64);
        idle_readers.push(client_write);
        hub.attach(peer(), Box::new(server_read), Box::new(server_write))
            .unwrap();
        client_read
    }

    async fn read_until_event(stream: &mut DuplexStream, expected_len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 1024];
        while !out.ends_with(b"}\n") || out.len() < expected_len {
            let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
                .await
                .unwrap()
                .unwrap();
            assert!(n > 0, "stream closed early");
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let hub = BroadcastHub::new(config(Duration::from_secs(60)));
        assert_eq!(hub.state(), HubState::Stopped);
        assert!(hub.local_addr().is_none());

        hub.start().await.unwrap();
        assert!(hub.is_running());
        let addr = hub.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        // Second start is a no-op.
        hub.start().await.unwrap();
        assert_eq!(hub.local_addr(), Some(addr));

        hub.stop().await;
        assert_eq!(hub.state(), HubState::Stopped);
        assert!(hub.local_addr().is_none());

        // Stopping twice is harmless.
        hub.stop().await;
    }

    #[tokio::test]
    async fn zero_heartbeat_interval_is_rejected() {
        let hub = BroadcastHub::new(config(Duration::ZERO));
        assert!(matches!(
            hub.start().await,
            Err(Error::InvalidConfig { .. })
        ));
        assert_eq!(hub.state(), HubState::Stopped);
        assert!(hub.local_addr().is_none());
        assert!(matches!(
            hub.attach(peer(), Box::new(tokio::io::empty()), Box::new(tokio::io::sink())),
            Err(Error::NotRunning)
        ));
    }

    #[tokio::test]
    async fn attach_requires_running() {
        let hub = BroadcastHub::new(config(Duration::from_secs(60)));
        let (a, _b) = tokio::io::duplex(64);
        let (c, _d) = tokio::io::duplex(64);
        assert!(matches!(
            hub.attach(peer(), Box::new(a), Box::new(c)),
            Err(Error::NotRunning)
        ));
    }

    #[tokio::test]
    async fn heartbeat_then_event() {
        let hub = BroadcastHub::new(config(Duration::from_secs(60)));
        hub.start().await.unwrap();
        let mut idle = Vec::new();
        let mut client = attach_duplex(&hub, &mut idle);

        let mut first = [0u8; HEARTBEAT_FRAME.len()];
        client.read_exact(&mut first).await.unwrap();
        assert_eq!(&first, HEARTBEAT_FRAME);

        let report = hub.broadcast(&event("hello")).await.unwrap();
        assert_eq!(report, BroadcastReport {
            delivered: 1,
            failed: 0
        });

        let expected = encode_event(&event("hello")).unwrap();
        let got = read_until_event(&mut client, expected.len()).await;
        assert_eq!(got, expected.to_vec());

        hub.stop().await;
    }

    #[tokio::test]
    async fn failing_client_is_isolated_and_removed() {
        let hub = BroadcastHub::new(config(Duration::from_secs(60)));
        hub.start().await.unwrap();
        let mut idle = Vec::new();
        let mut good: Vec<DuplexStream> = (0..3).map(|_| attach_duplex(&hub, &mut idle)).collect();

        let (server_read, client_write) = tokio::io::duplex(64);
        idle.push(client_write);
        hub.attach(peer(), Box::new(server_read), Box::new(RejectEvents))
            .unwrap();
        assert_eq!(hub.client_count(), 4);

        let report = hub.broadcast(&event("hello")).await.unwrap();
        assert_eq!(report, BroadcastReport {
            delivered: 3,
            failed: 1
        });
        assert_eq!(hub.client_count(), 3);

        let expected = encode_event(&event("hello")).unwrap();
        for client in &mut good {
            let got = read_until_event(client, expected.len()).await;
            assert!(got.ends_with(&expected));
        }
        hub.stop().await;
    }

    #[tokio::test]
    async fn client_eof_deregisters() {
        let hub = BroadcastHub::new(config(Duration::from_secs(60)));
        hub.start().await.unwrap();

        let (server_write, _client_read) = tokio::io::duplex(1024);
        let (server_read, client_write) = tokio::io::duplex(64);
        hub.attach(peer(), Box::new(server_read), Box::new(server_write))
            .unwrap();
        assert_eq!(hub.client_count(), 1);

        drop(client_write);
        tokio::time::timeout(Duration::from_secs(2), async {
            while hub.client_count() != 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        hub.stop().await;
    }

    #[tokio::test]
    async fn stop_closes_clients() {
        let hub = BroadcastHub::new(config(Duration::from_secs(60)));
        hub.start().await.unwrap();
        let mut idle = Vec::new();
        let mut client = attach_duplex(&hub, &mut idle);

        let mut heartbeat = [0u8; HEARTBEAT_FRAME.len()];
        client.read_exact(&mut heartbeat).await.unwrap();

        hub.stop().await;
        assert_eq!(hub.client_count(), 0);
        let mut buf = [0u8; 8];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn broadcast_without_clients() {
        let hub = BroadcastHub::new(config(Duration::from_secs(60)));
        let report = hub.broadcast(&event("nobody")).await.unwrap();
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn hub_is_a_subscriber() {
        let hub = BroadcastHub::new(config(Duration::from_secs(60)));
        assert_eq!(Subscriber::name(&hub), HUB_SUBSCRIBER_NAME);
        hub.deliver(&event("x")).await.unwrap();
    }

    #[tokio::test]
    async fn bind_conflict_is_an_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let hub = BroadcastHub::new(HubConfig {
            port,
            ..config(Duration::from_secs(60))
        });
        assert!(matches!(hub.start().await, Err(Error::Bind { .. })));
        assert_eq!(hub.state(), HubState::Stopped);
    }
}
