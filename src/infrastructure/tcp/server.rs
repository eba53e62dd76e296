use crate::core::audio::SharedAudio;
use crate::core::session::ModemSession;
use crate::domain::config::ModemConfig;
use crate::domain::error::{ModemError, ModemResult};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sent to a client that connects while another session is active
pub const REJECT_MESSAGE: &str = "BUSY - Another session is active\r\n";

const REJECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Admission control for the single active session
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    occupied: Arc<AtomicBool>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot. The returned guard releases it when dropped.
    pub fn try_acquire(&self) -> Option<SessionGuard> {
        self.occupied
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SessionGuard {
                occupied: Arc::clone(&self.occupied),
            })
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied.load(Ordering::Acquire)
    }
}

/// Held for the whole lifetime of the active session
#[derive(Debug)]
pub struct SessionGuard {
    occupied: Arc<AtomicBool>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.occupied.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStats {
    pub bind_addr: SocketAddr,
    pub sessions_accepted: u64,
    pub sessions_rejected: u64,
    pub session_active: bool,
}

/// Listens on the loopback interface and runs one modem session at a time
pub struct ModemServer {
    listener: Option<TcpListener>,
    bind_addr: SocketAddr,
    config: Arc<ModemConfig>,
    audio: SharedAudio,
    slot: SessionSlot,
    counters: Arc<Counters>,
    cancel: CancellationToken,
    server_handle: Option<JoinHandle<()>>,
}

impl ModemServer {
    /// Bind the listener. Port 0 picks a free port.
    pub async fn bind(config: ModemConfig, audio: SharedAudio) -> ModemResult<Self> {
        Self::bind_with_cancel(config, audio, CancellationToken::new()).await
    }

    /// Bind with a caller supplied shutdown token
    pub async fn bind_with_cancel(
        config: ModemConfig,
        audio: SharedAudio,
        cancel: CancellationToken,
    ) -> ModemResult<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], config.modem.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| ModemError::Session {
            message: format!("Failed to bind to {}: {}", addr, e),
        })?;

        let bind_addr = listener.local_addr()?;
        info!("Modem server bound to {}", bind_addr);

        Ok(Self {
            listener: Some(listener),
            bind_addr,
            config: Arc::new(config),
            audio,
            slot: SessionSlot::new(),
            counters: Arc::new(Counters::default()),
            cancel,
            server_handle: None,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    pub fn is_running(&self) -> bool {
        self.server_handle.is_some()
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            bind_addr: self.bind_addr,
            sessions_accepted: self.counters.accepted.load(Ordering::Relaxed),
            sessions_rejected: self.counters.rejected.load(Ordering::Relaxed),
            session_active: self.slot.is_occupied(),
        }
    }

    /// Start accepting clients in the background
    pub fn start(&mut self) -> ModemResult<()> {
        let Some(listener) = self.listener.take() else {
            return Err(ModemError::Session {
                message: "Server is already running".to_string(),
            });
        };

        info!("Modem ready on {}", self.bind_addr);

        let handle = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.config),
            Arc::clone(&self.audio),
            self.slot.clone(),
            Arc::clone(&self.counters),
            self.cancel.clone(),
        ));
        self.server_handle = Some(handle);
        Ok(())
    }

    /// Stop accepting, end the active session and wait for it to finish
    pub async fn stop(&mut self) -> ModemResult<()> {
        self.cancel.cancel();
        self.wait().await;
        Ok(())
    }

    /// Wait for the accept loop to finish after shutdown was requested
    pub async fn wait(&mut self) {
        if let Some(handle) = self.server_handle.take() {
            if let Err(e) = handle.await {
                warn!("Server task completed with error: {}", e);
            }
            info!("Modem server stopped");
        }
    }
}

impl Drop for ModemServer {
    fn drop(&mut self) {
        if self.server_handle.is_some() {
            warn!("ModemServer dropped while still running");
            self.cancel.cancel();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: Arc<ModemConfig>,
    audio: SharedAudio,
    slot: SessionSlot,
    counters: Arc<Counters>,
    cancel: CancellationToken,
) {
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Received shutdown signal, stopping server");
                break;
            }
            accept_result = listener.accept() => {
                let (stream, addr) = match accept_result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                }

                match slot.try_acquire() {
                    Some(guard) => {
                        counters.accepted.fetch_add(1, Ordering::Relaxed);
                        info!("Client connected: {}", addr);
                        sessions.spawn(serve_client(
                            stream,
                            addr,
                            guard,
                            Arc::clone(&config),
                            Arc::clone(&audio),
                            cancel.child_token(),
                        ));
                    }
                    None => {
                        counters.rejected.fetch_add(1, Ordering::Relaxed);
                        warn!("Rejecting {}: another session is active", addr);
                        reject_client(stream, addr).await;
                    }
                }
            }
            Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(e) = joined {
                    error!("Session task failed: {}", e);
                }
            }
        }
    }

    // Sessions observe the same token through their child tokens
    while let Some(joined) = sessions.join_next().await {
        if let Err(e) = joined {
            error!("Session task failed: {}", e);
        }
    }
}

async fn serve_client(
    stream: TcpStream,
    addr: SocketAddr,
    _guard: SessionGuard,
    config: Arc<ModemConfig>,
    audio: SharedAudio,
    cancel: CancellationToken,
) {
    let mut session = ModemSession::new(stream, config, audio, cancel);
    if let Err(e) = session.run().await {
        warn!("Session for {} ended with error: {}", addr, e);
    }
    info!("Client disconnected: {}", addr);
}

async fn reject_client(mut stream: TcpStream, addr: SocketAddr) {
    let rejected = tokio::time::timeout(REJECT_TIMEOUT, async {
        stream.write_all(REJECT_MESSAGE.as_bytes()).await?;
        stream.shutdown().await
    })
    .await;

    match rejected {
        Ok(Ok(())) => debug!("Rejected client {}", addr),
        Ok(Err(e)) => debug!("Failed to notify rejected client {}: {}", addr, e),
        Err(_) => debug!("Timed out notifying rejected client {}", addr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::SilentAudio;
    use crate::domain::config::DialTiming;
    use tokio::io::AsyncReadExt;

    const WAIT: Duration = Duration::from_secs(5);

    fn test_config() -> ModemConfig {
        let mut config = ModemConfig::default();
        config.modem.port = 0;
        config.dial = DialTiming::immediate();
        config
    }

    async fn started() -> ModemServer {
        let mut server = ModemServer::bind(test_config(), Arc::new(SilentAudio))
            .await
            .unwrap();
        server.start().unwrap();
        server
    }

    async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
        let mut output = Vec::new();
        let mut buf = [0u8; 512];

        tokio::time::timeout(WAIT, async {
            while !String::from_utf8_lossy(&output).contains(needle) {
                let n = stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "connection closed early");
                output.extend_from_slice(&buf[..n]);
            }
        })
        .await
        .unwrap();

        String::from_utf8_lossy(&output).into_owned()
    }

    async fn wait_for_release(server: &ModemServer) {
        tokio::time::timeout(WAIT, async {
            while server.stats().session_active {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[test]
    fn test_slot_guard_releases() {
        let slot = SessionSlot::new();
        let guard = slot.try_acquire().unwrap();
        assert!(slot.is_occupied());
        assert!(slot.try_acquire().is_none());

        drop(guard);
        assert!(!slot.is_occupied());
        assert!(slot.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_binds_loopback() {
        let server = ModemServer::bind(test_config(), Arc::new(SilentAudio))
            .await
            .unwrap();
        assert!(server.bind_addr().ip().is_loopback());
        assert_ne!(server.bind_addr().port(), 0);
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_double_start_fails() {
        let mut server = started().await;
        assert!(server.is_running());
        assert!(server.start().is_err());

        server.stop().await.unwrap();
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_greets_client() {
        let mut server = started().await;
        let mut client = TcpStream::connect(server.bind_addr()).await.unwrap();

        let greeting = read_until(&mut client, "Ready\r\n").await;
        assert_eq!(greeting, "ModemCom Hayes Emulator v1.0\r\nReady\r\n");

        client.write_all(b"AT\r").await.unwrap();
        read_until(&mut client, "OK\r\n").await;

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_second_client_rejected() {
        let mut server = started().await;

        let mut first = TcpStream::connect(server.bind_addr()).await.unwrap();
        read_until(&mut first, "Ready\r\n").await;

        let mut second = TcpStream::connect(server.bind_addr()).await.unwrap();
        let mut rejected = Vec::new();
        tokio::time::timeout(WAIT, second.read_to_end(&mut rejected))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rejected, REJECT_MESSAGE.as_bytes());

        // The first session is unaffected
        first.write_all(b"AT\r").await.unwrap();
        read_until(&mut first, "AT\r\nOK\r\n").await;

        let stats = server.stats();
        assert_eq!(stats.sessions_accepted, 1);
        assert_eq!(stats.sessions_rejected, 1);
        assert!(stats.session_active);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_reject_client_completes_inline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (stream, addr) = listener.accept().await.unwrap();

        let bound = REJECT_TIMEOUT + Duration::from_millis(500);
        tokio::time::timeout(bound, reject_client(stream, addr))
            .await
            .unwrap();

        let mut rejected = Vec::new();
        client.read_to_end(&mut rejected).await.unwrap();
        assert_eq!(rejected, REJECT_MESSAGE.as_bytes());
    }

    #[tokio::test]
    async fn test_rejections_done_before_stop_returns() {
        let mut server = started().await;

        let mut first = TcpStream::connect(server.bind_addr()).await.unwrap();
        read_until(&mut first, "Ready\r\n").await;

        let mut others = Vec::new();
        for _ in 0..3 {
            let mut other = TcpStream::connect(server.bind_addr()).await.unwrap();
            read_until(&mut other, REJECT_MESSAGE).await;
            others.push(other);
        }
        assert_eq!(server.stats().sessions_rejected, 3);

        server.stop().await.unwrap();
        for mut other in others {
            let mut rest = Vec::new();
            tokio::time::timeout(WAIT, other.read_to_end(&mut rest))
                .await
                .unwrap()
                .unwrap();
            assert!(rest.is_empty());
        }
    }

    #[tokio::test]
    async fn test_slot_freed_after_disconnect() {
        let mut server = started().await;

        let mut first = TcpStream::connect(server.bind_addr()).await.unwrap();
        read_until(&mut first, "Ready\r\n").await;
        drop(first);
        wait_for_release(&server).await;

        let mut second = TcpStream::connect(server.bind_addr()).await.unwrap();
        read_until(&mut second, "Ready\r\n").await;
        assert_eq!(server.stats().sessions_accepted, 2);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_closes_active_session() {
        let mut server = started().await;

        let mut client = TcpStream::connect(server.bind_addr()).await.unwrap();
        read_until(&mut client, "Ready\r\n").await;

        tokio::time::timeout(WAIT, server.stop()).await.unwrap().unwrap();
        assert!(!server.stats().session_active);

        let mut rest = Vec::new();
        tokio::time::timeout(WAIT, client.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert!(rest.is_empty());
    }
}
