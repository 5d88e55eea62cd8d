// ABOUTME: Background reconnect loop driving Pool::reconnect at an interval
//
// Opt-in: pools work without a monitor, callers drive reconnect themselves.
// The monitor owns a shutdown flag and the task handle; reconnect errors are
// logged and swallowed so a flaky resolver never kills the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::pool::Pool;

/// Default spacing between reconnect passes
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(10);

/// Periodic reconnect driver for a pool
///
/// Each tick runs a non-forced reconnect: healthy pools with unchanged DNS
/// membership are a no-op, everything else re-fans-out.
pub struct PoolMonitor {
    /// Spacing between reconnect passes
    interval: Duration,

    /// Shutdown flag for graceful termination
    shutdown: Arc<AtomicBool>,

    /// Handle to the background task
    handle: Option<JoinHandle<()>>,
}

impl PoolMonitor {
    /// Monitor with the given pass interval
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Start the background reconnect task for `pool`
    pub fn start(&mut self, pool: Pool) {
        self.shutdown.store(false, Ordering::SeqCst);

        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;

        info!(interval_ms = %interval.as_millis(), addr = pool.addr(), "Pool monitor started");
        let handle = tokio::spawn(async move {
            Self::reconnect_loop(pool, interval, shutdown).await;
        });
        self.handle = Some(handle);
    }

    /// Stop the monitor and wait briefly for the task to wind down
    pub async fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
        info!("Pool monitor stopped");
    }

    /// True while the background task is live
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_some() && !self.shutdown.load(Ordering::SeqCst)
    }

    async fn reconnect_loop(pool: Pool, interval: Duration, shutdown: Arc<AtomicBool>) {
        debug!("Reconnect loop started");

        loop {
            if shutdown.load(Ordering::SeqCst) {
                debug!("Reconnect loop received shutdown signal");
                break;
            }

            tokio::time::sleep(interval).await;

            // Check again after the sleep
            if shutdown.load(Ordering::SeqCst) {
                break;
            }

            match pool.reconnect(false).await {
                Ok(()) => debug!(addr = pool.addr(), "Reconnect pass completed"),
                Err(error) => {
                    warn!(addr = pool.addr(), error = %error, "Reconnect pass failed");
                }
            }
        }

        debug!("Reconnect loop ended");
    }
}

impl Drop for PoolMonitor {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::conn::{Channel, ConnState, Connector};
    use std::io;
    use std::sync::atomic::AtomicU8;

    struct ReadyChannel {
        state: AtomicU8,
    }

    impl ReadyChannel {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                state: AtomicU8::new(ConnState::Ready.as_u8()),
            })
        }
    }

    impl Channel for ReadyChannel {
        fn state(&self) -> ConnState {
            ConnState::from_u8(self.state.load(Ordering::SeqCst))
        }

        fn connect(&self) {}

        fn close(&self) -> io::Result<()> {
            self.state.store(ConnState::Shutdown.as_u8(), Ordering::SeqCst);
            Ok(())
        }
    }

    struct ReadyConnector;

    #[async_trait::async_trait]
    impl Connector for ReadyConnector {
        async fn dial(&self, _addr: &str) -> io::Result<Arc<dyn Channel>> {
            Ok(ReadyChannel::new())
        }
    }

    async fn test_pool() -> Pool {
        let config = PoolConfig {
            size: 2,
            dial_timeout: Duration::from_millis(200),
            old_conn_close_delay: Duration::from_millis(50),
            ..PoolConfig::new("10.0.0.1:8081")
        };
        Pool::builder(config)
            .connector(Arc::new(ReadyConnector))
            .build()
            .await
            .unwrap()
    }

    async fn settle<F: Fn() -> bool>(cond: F) -> bool {
        for _ in 0..200 {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    // ==================== Creation Tests ====================

    #[test]
    fn test_monitor_new() {
        let monitor = PoolMonitor::new(Duration::from_secs(10));
        assert_eq!(monitor.interval, Duration::from_secs(10));
        assert!(!monitor.is_running());
    }

    // ==================== Start/Stop Tests ====================

    #[tokio::test]
    async fn test_monitor_start_stop() {
        let pool = test_pool().await;
        let mut monitor = PoolMonitor::new(Duration::from_millis(20));

        monitor.start(pool.clone());
        assert!(monitor.is_running());

        // The loop connects an unconnected pool on its own
        assert!(settle(|| pool.get().is_some()).await);

        monitor.stop().await;
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_monitor_stop_without_start() {
        let mut monitor = PoolMonitor::new(Duration::from_secs(10));
        monitor.stop().await;
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_monitor_multiple_start_stop() {
        let pool = test_pool().await;
        let mut monitor = PoolMonitor::new(Duration::from_millis(20));

        monitor.start(pool.clone());
        assert!(monitor.is_running());
        monitor.stop().await;
        assert!(!monitor.is_running());

        monitor.start(pool);
        assert!(monitor.is_running());
        monitor.stop().await;
        assert!(!monitor.is_running());
    }

    // ==================== Drop Tests ====================

    #[test]
    fn test_monitor_drop_sets_shutdown() {
        let flag = Arc::new(AtomicBool::new(false));
        {
            let mut monitor = PoolMonitor::new(Duration::from_secs(10));
            monitor.shutdown = Arc::clone(&flag);
        }
        assert!(flag.load(Ordering::SeqCst));
    }
}
