// ABOUTME: Connectivity states, transport traits, and the pooled connection wrapper
//
// The pool never touches a socket directly. It drives transports through two
// seams: Channel (a live connection reporting its state) and Connector (dials
// a new Channel for an address). PoolConn pairs a Channel with the address it
// was dialed to and implements graceful, state-polling close.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Lower bound for the graceful-close poll interval
const MIN_CLOSE_POLL: Duration = Duration::from_millis(5);

/// Upper bound for the graceful-close poll interval
const MAX_CLOSE_POLL: Duration = Duration::from_secs(5);

/// Connectivity state reported by a transport channel
///
/// Mirrors the usual RPC channel lifecycle. `Shutdown` is terminal from the
/// pool's perspective; every other state is expected to make progress on its
/// own or after a connect nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnState {
    /// Channel created but no connection attempt in flight
    Idle,

    /// Connection attempt in flight
    Connecting,

    /// Connected and usable
    Ready,

    /// Last attempt failed; the transport retries on its own
    TransientFailure,

    /// Closed for good, requires a redial
    Shutdown,
}

impl ConnState {
    /// Whether the state permits use or is expected to self-heal
    ///
    /// Everything except `Shutdown` counts as healthy: `TransientFailure`
    /// channels are retained optimistically rather than torn down.
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        !matches!(self, Self::Shutdown)
    }

    /// Numeric encoding for atomic storage
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Connecting => 1,
            Self::Ready => 2,
            Self::TransientFailure => 3,
            Self::Shutdown => 4,
        }
    }

    /// Decode a value produced by [`as_u8`](Self::as_u8)
    ///
    /// Unknown values decode to `Shutdown`, the conservative choice.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Connecting,
            2 => Self::Ready,
            3 => Self::TransientFailure,
            _ => Self::Shutdown,
        }
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "IDLE",
            Self::Connecting => "CONNECTING",
            Self::Ready => "READY",
            Self::TransientFailure => "TRANSIENT_FAILURE",
            Self::Shutdown => "SHUTDOWN",
        };
        f.write_str(name)
    }
}

/// A live transport connection managed by the pool
///
/// All three methods are non-blocking: `connect` only nudges the transport to
/// start an attempt, and `close` only requests shutdown. The pool observes
/// progress through `state`.
pub trait Channel: Send + Sync {
    /// Current connectivity state
    fn state(&self) -> ConnState;

    /// Nudge the transport to start connecting (no-op unless it is idle or
    /// retrying)
    fn connect(&self);

    /// Request shutdown without waiting for in-flight work
    fn close(&self) -> io::Result<()>;
}

/// Dials new channels for the pool
///
/// Implementations carry their own transport options (socket flags, TLS,
/// credentials); the pool hands them nothing but the address and bounds the
/// attempt with its configured dial timeout.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Dial `addr` and return a channel for it
    async fn dial(&self, addr: &str) -> io::Result<Arc<dyn Channel>>;
}

/// A channel paired with the address it was dialed to
///
/// Immutable once constructed; a slot retires a `PoolConn` by swapping in a
/// replacement, never by mutating it.
pub struct PoolConn {
    channel: Arc<dyn Channel>,
    addr: String,
}

impl PoolConn {
    /// Wrap a freshly dialed channel
    #[must_use]
    pub fn new(channel: Arc<dyn Channel>, addr: impl Into<String>) -> Self {
        Self {
            channel,
            addr: addr.into(),
        }
    }

    /// Address this connection was dialed to
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The underlying channel
    #[must_use]
    pub fn channel(&self) -> Arc<dyn Channel> {
        Arc::clone(&self.channel)
    }

    /// Current connectivity state
    #[must_use]
    pub fn state(&self) -> ConnState {
        self.channel.state()
    }

    /// Classify health, nudging an idle channel to connect as a side effect
    ///
    /// Used by health checks, selection fallback, and refresh keep-checks.
    /// Dial-time acceptance is stricter (idle fresh connections are
    /// rejected); see the pool's dial path.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        let state = self.channel.state();
        if state == ConnState::Idle {
            self.channel.connect();
        }
        state.is_healthy()
    }

    /// Close gracefully, polling for the channel to reach `Shutdown`
    ///
    /// Issues a non-blocking close request on every tick (interval =
    /// `delay / 10` clamped to [5ms, 5s]) until the channel reports
    /// `Shutdown` or `delay` elapses. Running out the delay is a benign
    /// outcome and returns `Ok`; only a real close error propagates.
    pub async fn close(&self, delay: Duration) -> io::Result<()> {
        let interval = close_poll_interval(delay);

        let drained = tokio::time::timeout(delay, async {
            loop {
                match self.channel.state() {
                    ConnState::Shutdown => return Ok(()),
                    _ => self.channel.close()?,
                }
                tokio::time::sleep(interval).await;
            }
        })
        .await;

        match drained {
            Ok(result) => result,
            Err(_) => {
                debug!(addr = %self.addr, delay_ms = delay.as_millis(), "Close delay elapsed before shutdown was observed");
                Ok(())
            }
        }
    }
}

impl fmt::Debug for PoolConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConn")
            .field("addr", &self.addr)
            .field("state", &self.channel.state())
            .finish()
    }
}

/// Poll interval for graceful close: a tenth of the delay, clamped to
/// [5ms, 5s]
#[must_use]
pub(crate) fn close_poll_interval(delay: Duration) -> Duration {
    (delay / 10).clamp(MIN_CLOSE_POLL, MAX_CLOSE_POLL)
}
