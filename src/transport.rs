// ABOUTME: Default TCP-backed transport implementing the Channel/Connector seams
//
// Holds a connected TcpStream as proof of liveness and drives the
// connectivity state machine through nudge-triggered redials. RPC stacks with
// their own client objects implement Channel/Connector over those instead;
// nothing in the pool names this type.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::conn::{Channel, ConnState, Connector};

/// Shared channel state: connectivity byte plus the held socket
struct ChannelShared {
    addr: String,
    state: AtomicU8,
    stream: Mutex<Option<TcpStream>>,
    dial_timeout: Duration,
    nodelay: bool,
}

impl ChannelShared {
    fn state(&self) -> ConnState {
        ConnState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn transition(&self, from: ConnState, to: ConnState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn lock_stream(&self) -> std::sync::MutexGuard<'_, Option<TcpStream>> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One dial attempt for a nudged channel; resolves Connecting into
    /// Ready or TransientFailure unless a close won the race
    async fn run_dial(self: Arc<Self>) {
        let connected = tokio::time::timeout(self.dial_timeout, TcpStream::connect(&self.addr)).await;

        match connected {
            Ok(Ok(stream)) => {
                if self.nodelay {
                    let _ = stream.set_nodelay(true);
                }
                if self.transition(ConnState::Connecting, ConnState::Ready) {
                    *self.lock_stream() = Some(stream);
                } else {
                    // Shut down while the dial was in flight
                    drop(stream);
                }
            }
            Ok(Err(error)) => {
                debug!(addr = %self.addr, error = %error, "Channel redial failed");
                self.transition(ConnState::Connecting, ConnState::TransientFailure);
            }
            Err(_) => {
                debug!(addr = %self.addr, timeout_ms = self.dial_timeout.as_millis(), "Channel redial timed out");
                self.transition(ConnState::Connecting, ConnState::TransientFailure);
            }
        }
    }
}

/// TCP transport channel
///
/// State machine: `Idle` until the first nudge, `Connecting` while a dial is
/// in flight, then `Ready` or `TransientFailure`; a further nudge retries
/// from `TransientFailure`. `close` is terminal.
#[derive(Clone)]
pub struct TcpChannel {
    shared: Arc<ChannelShared>,
}

impl TcpChannel {
    /// Create an unconnected channel; the first connect nudge dials
    #[must_use]
    pub fn idle(addr: impl Into<String>, dial_timeout: Duration, nodelay: bool) -> Self {
        Self {
            shared: Arc::new(ChannelShared {
                addr: addr.into(),
                state: AtomicU8::new(ConnState::Idle.as_u8()),
                stream: Mutex::new(None),
                dial_timeout,
                nodelay,
            }),
        }
    }

    /// Dial immediately, returning a `Ready` channel or the dial error
    pub async fn dial(addr: &str, dial_timeout: Duration, nodelay: bool) -> io::Result<Self> {
        let channel = Self::idle(addr, dial_timeout, nodelay);
        channel
            .shared
            .transition(ConnState::Idle, ConnState::Connecting);

        let connected = tokio::time::timeout(dial_timeout, TcpStream::connect(addr)).await;
        match connected {
            Ok(Ok(stream)) => {
                if nodelay {
                    let _ = stream.set_nodelay(true);
                }
                *channel.shared.lock_stream() = Some(stream);
                channel
                    .shared
                    .transition(ConnState::Connecting, ConnState::Ready);
                Ok(channel)
            }
            Ok(Err(error)) => Err(error),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect to {addr} timed out after {dial_timeout:?}"),
            )),
        }
    }

    /// Remote address of the held socket, when connected
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.shared.lock_stream().as_ref().and_then(|s| s.peer_addr().ok())
    }
}

impl Channel for TcpChannel {
    fn state(&self) -> ConnState {
        self.shared.state()
    }

    fn connect(&self) {
        let nudged = self.shared.transition(ConnState::Idle, ConnState::Connecting)
            || self
                .shared
                .transition(ConnState::TransientFailure, ConnState::Connecting);

        if nudged {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(shared.run_dial());
        }
    }

    fn close(&self) -> io::Result<()> {
        self.shared
            .state
            .store(ConnState::Shutdown.as_u8(), Ordering::SeqCst);
        self.shared.lock_stream().take();
        Ok(())
    }
}

/// Connector producing [`TcpChannel`]s
///
/// Carries the transport-specific options; the pool passes only an address.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    /// Per-attempt dial budget, also used by nudge-triggered redials
    pub dial_timeout: Duration,

    /// Set TCP_NODELAY on connected sockets
    pub nodelay: bool,
}

impl TcpConnector {
    /// Connector with default options (1s dial budget, nodelay on)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(1),
            nodelay: true,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn dial(&self, addr: &str) -> io::Result<Arc<dyn Channel>> {
        let channel = TcpChannel::dial(addr, self.dial_timeout, self.nodelay).await?;
        Ok(Arc::new(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    /// Port that refuses connections: bind, record, drop
    async fn refused_addr() -> String {
        let (listener, addr) = listener().await;
        drop(listener);
        addr
    }

    async fn wait_for_state(channel: &TcpChannel, want: ConnState) -> bool {
        for _ in 0..100 {
            if channel.state() == want {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    // ==================== Dial Tests ====================

    #[tokio::test]
    async fn test_dial_success_is_ready() {
        let (_listener, addr) = listener().await;

        let channel = TcpChannel::dial(&addr, Duration::from_secs(1), true).await.unwrap();
        assert_eq!(channel.state(), ConnState::Ready);
        assert!(channel.peer_addr().is_some());
    }

    #[tokio::test]
    async fn test_dial_refused_errors() {
        let addr = refused_addr().await;

        let result = TcpChannel::dial(&addr, Duration::from_secs(1), true).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connector_returns_ready_channel() {
        let (_listener, addr) = listener().await;

        let connector = TcpConnector::new();
        let channel = connector.dial(&addr).await.unwrap();
        assert_eq!(channel.state(), ConnState::Ready);
    }

    // ==================== State Machine Tests ====================

    #[tokio::test]
    async fn test_idle_until_nudged() {
        let (_listener, addr) = listener().await;

        let channel = TcpChannel::idle(&addr, Duration::from_secs(1), true);
        assert_eq!(channel.state(), ConnState::Idle);
        assert!(channel.peer_addr().is_none());

        channel.connect();
        assert!(wait_for_state(&channel, ConnState::Ready).await);
    }

    #[tokio::test]
    async fn test_nudge_failure_is_transient() {
        let addr = refused_addr().await;

        let channel = TcpChannel::idle(&addr, Duration::from_millis(200), true);
        channel.connect();

        assert!(wait_for_state(&channel, ConnState::TransientFailure).await);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_on_nudge() {
        let (listener, addr) = listener().await;
        drop(listener);

        let channel = TcpChannel::idle(&addr, Duration::from_millis(200), true);
        channel.connect();
        assert!(wait_for_state(&channel, ConnState::TransientFailure).await);

        // Server comes back on the same port
        let listener = TcpListener::bind(&addr).await.unwrap();
        channel.connect();
        assert!(wait_for_state(&channel, ConnState::Ready).await);
        drop(listener);
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let (_listener, addr) = listener().await;

        let channel = TcpChannel::dial(&addr, Duration::from_secs(1), true).await.unwrap();
        channel.close().unwrap();
        assert_eq!(channel.state(), ConnState::Shutdown);
        assert!(channel.peer_addr().is_none());

        // Nudges cannot resurrect a closed channel
        channel.connect();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(channel.state(), ConnState::Shutdown);
    }

    #[tokio::test]
    async fn test_close_during_dial_wins() {
        let (_listener, addr) = listener().await;

        let channel = TcpChannel::idle(&addr, Duration::from_secs(1), true);
        channel.connect();
        channel.close().unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(channel.state(), ConnState::Shutdown);
        assert!(channel.peer_addr().is_none());
    }
}
