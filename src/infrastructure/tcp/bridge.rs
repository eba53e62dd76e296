use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Chunks the reader queues before it stops reading from the socket
const EVENT_CAPACITY: usize = 16;

const READ_BUFFER_SIZE: usize = 4096;

/// Notification from the bridge to its owning session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Bytes received from the remote endpoint
    Data(Vec<u8>),
    /// The connection has gone away; sent once per successful connection
    Closed,
}

/// State shared between the bridge handle and its reader task
struct BridgeLink {
    connected: AtomicBool,
    writer: Mutex<Option<OwnedWriteHalf>>,
    cancel: CancellationToken,
}

impl BridgeLink {
    /// Tear the connection down; only the first caller does any work.
    async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Disconnecting upstream connection");
        self.cancel.cancel();

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!("Failed to shutdown upstream stream: {}", e);
            }
        }
    }
}

/// Outbound TCP connection proxied on behalf of one modem session.
///
/// A bridge makes at most one connection. Inbound bytes are read by a
/// background task into a bounded queue which the owner drains with
/// [`UpstreamBridge::recv`]. When the owner stops draining, the reader
/// stops reading and the remote is held back by TCP flow control.
pub struct UpstreamBridge {
    link: Arc<BridgeLink>,
    events: Option<mpsc::Receiver<Vec<u8>>>,
    reader: Option<tokio::task::JoinHandle<()>>,
    peer_addr: Option<SocketAddr>,
}

impl UpstreamBridge {
    /// Create an idle bridge whose reader stops when `cancel` fires
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            link: Arc::new(BridgeLink {
                connected: AtomicBool::new(false),
                writer: Mutex::new(None),
                cancel,
            }),
            events: None,
            reader: None,
            peer_addr: None,
        }
    }

    /// Make a single connection attempt bounded by `deadline`.
    ///
    /// Failures of any kind are logged and reported as `false`.
    pub async fn connect(&mut self, host: &str, port: u16, deadline: Duration) -> bool {
        if self.reader.is_some() {
            warn!("Upstream bridge to {:?} already used", self.peer_addr);
            return false;
        }

        info!("Connecting to {}:{}...", host, port);

        let stream = match tokio::time::timeout(deadline, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("Failed to connect to {}:{}: {}", host, port, e);
                return false;
            }
            Err(_) => {
                warn!("Connection timeout to {}:{}", host, port);
                return false;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        self.peer_addr = stream.peer_addr().ok();
        let (read_half, write_half) = stream.into_split();

        *self.link.writer.lock().await = Some(write_half);
        self.link.connected.store(true, Ordering::SeqCst);

        let (sender, events) = mpsc::channel(EVENT_CAPACITY);
        self.events = Some(events);

        let link = Arc::clone(&self.link);
        self.reader = Some(tokio::spawn(read_loop(link, read_half, sender)));

        info!("Connected to {}:{}", host, port);
        true
    }

    /// Forward bytes to the remote endpoint.
    ///
    /// A failed write disconnects the bridge; the owner learns about it
    /// through the `Closed` event.
    pub async fn send(&self, data: &[u8]) {
        if !self.is_connected() {
            return;
        }

        let mut writer = self.link.writer.lock().await;
        let result = match writer.as_mut() {
            Some(stream) => stream.write_all(data).await,
            None => return,
        };
        drop(writer);

        match result {
            Ok(()) => debug!("Sent {} bytes upstream: {}", data.len(), hex::encode(data)),
            Err(e) => {
                warn!("Failed to write to upstream connection: {}", e);
                self.link.disconnect().await;
            }
        }
    }

    /// Close the connection. Idempotent and safe to race with the reader.
    pub async fn disconnect(&self) {
        self.link.disconnect().await;
    }

    /// Next notification from the remote side.
    ///
    /// Data arrives in order and is followed by exactly one `Closed`. After
    /// that, or when the bridge never connected, this never resolves.
    pub async fn recv(&mut self) -> BridgeEvent {
        let Some(events) = self.events.as_mut() else {
            return std::future::pending().await;
        };

        match events.recv().await {
            Some(data) => BridgeEvent::Data(data),
            None => {
                self.events = None;
                BridgeEvent::Closed
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }
}

impl Drop for UpstreamBridge {
    fn drop(&mut self) {
        // Stops the reader, which releases the socket
        self.link.cancel.cancel();
    }
}

/// Pump the socket into the queue. Dropping `events` on exit is what the
/// owner sees as `Closed`.
async fn read_loop(
    link: Arc<BridgeLink>,
    mut stream: OwnedReadHalf,
    events: mpsc::Sender<Vec<u8>>,
) {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = tokio::select! {
            _ = link.cancel.cancelled() => {
                debug!("Upstream reader cancelled");
                break;
            }
            result = stream.read(&mut buffer) => match result {
                Ok(0) => {
                    info!("Upstream connection closed by remote host");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!("Failed to read from upstream connection: {}", e);
                    break;
                }
            }
        };

        debug!("Received {} bytes upstream: {}", n, hex::encode(&buffer[..n]));

        // Waits while the queue is full, so unread data stays in the socket
        tokio::select! {
            sent = events.send(buffer[..n].to_vec()) => {
                if sent.is_err() {
                    debug!("Bridge owner gone");
                    break;
                }
            }
            _ = link.cancel.cancelled() => {
                debug!("Upstream reader cancelled while queue was full");
                break;
            }
        }
    }

    link.disconnect().await;
}
