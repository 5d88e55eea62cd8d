// ABOUTME: Pool manager: slot lifecycle, round-robin selection, DNS fan-out, draining
//
// Owns the slot store and the collaborator seams (connector, resolver,
// prober, task runner, retry policy, metrics) and keeps every caller-facing
// operation non-blocking: reads observe state and at most schedule background
// refreshes, they never wait on a dial.
//!
//! Self-healing connection pool over a single logical target.
//!
//! ```text
//!                 +--------------------------------------+
//!    connect ---> |  Pool                                |
//!    reconnect    |   cursor --> [slot0][slot1][slot2].. | --> Channel
//!    get/execute  |                 |        ^           |
//!                 |                 v        | swap      |
//!                 |          refresh task (runner)       |
//!                 +--------------------------------------+
//!                        |                |
//!                   Resolver/Prober   Connector (+ retry)
//! ```
//!
//! A slot holds one connection wrapper or nothing. Fan-out points every slot
//! at the target address, or spreads slots across resolved IPs when DNS
//! lookup is enabled. Refreshes run as fire-and-forget tasks; their failures
//! are logged and swallowed, so the pool degrades instead of erroring.
//!
//! # Example
//!
//! ```ignore
//! let config = PoolConfig::new("10.0.64.2:8081");
//! let pool = Pool::builder(config).build().await?;
//! pool.connect().await?;
//!
//! pool.execute(|channel| async move { rpc_search(channel).await }).await?;
//!
//! pool.disconnect().await?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::backoff::RetryPolicy;
use crate::config::{ConfigError, PoolConfig};
use crate::conn::{Channel, ConnState, Connector, PoolConn};
use crate::discovery::{
    join_host_port, lookup_reachable_ips, membership_key, scan_port, DiscoveryError, Prober,
    Resolver, SystemResolver, TcpProber,
};
use crate::metrics::MetricsRegistry;
use crate::runner::{TaskRunner, TokioRunner};
use crate::slots::Slots;
use crate::transport::TcpConnector;

/// Errors surfaced by pool operations
#[derive(Error, Debug)]
pub enum PoolError {
    /// Configuration rejected before any network activity
    #[error("invalid pool configuration: {0}")]
    Config(#[from] ConfigError),

    /// Endpoint discovery failed
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// A dial attempt failed outright
    #[error("dialing {addr} failed: {source}")]
    Dial {
        /// Address that was dialed
        addr: String,
        /// Connector error
        #[source]
        source: io::Error,
    },

    /// A dial attempt exceeded the configured budget
    #[error("dialing {addr} timed out after {timeout:?}")]
    DialTimeout {
        /// Address that was dialed
        addr: String,
        /// Budget that was exceeded
        timeout: Duration,
    },

    /// A dial produced a connection in an unusable state
    #[error("connection to {addr} reported {state} and was discarded")]
    UnhealthyConn {
        /// Address that was dialed
        addr: String,
        /// State the fresh connection reported
        state: ConnState,
        /// Error from closing the discarded connection, if any
        #[source]
        close_error: Option<io::Error>,
    },

    /// Selection found nothing usable across all passes
    #[error("no available connection for {addr}")]
    NoAvailableConn {
        /// Pool target
        addr: String,
    },

    /// The reachability probe connection could not be closed
    #[error("closing probe connection to {addr} failed: {source}")]
    ProbeClose {
        /// Address that was probed
        addr: String,
        /// Close error
        #[source]
        source: io::Error,
    },

    /// One or more connections failed to close during disconnect
    #[error("{failed}/{total} connections failed to close cleanly: {details}")]
    CloseFailures {
        /// Connections whose close errored
        failed: usize,
        /// Connections that were closed
        total: usize,
        /// Per-address error summaries, joined
        details: String,
    },
}

/// Convenience alias for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

/// Split a target into host, optional port, and an IP-literal flag
fn parse_target(addr: &str) -> (String, Option<u16>, bool) {
    if let Ok(sock) = addr.parse::<SocketAddr>() {
        return (sock.ip().to_string(), Some(sock.port()), true);
    }
    if let Ok(ip) = addr.parse::<IpAddr>() {
        return (ip.to_string(), None, true);
    }
    if let Some((host, port)) = addr.rsplit_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            let is_ip = host.parse::<IpAddr>().is_ok();
            return (host.to_string(), Some(port), is_ip);
        }
    }
    (addr.to_string(), None, false)
}

/// One dial attempt, immediately classified
///
/// Ready, Connecting, and TransientFailure channels are accepted; Idle and
/// Shutdown are closed and rejected.
async fn classify_dial(
    connector: &Arc<dyn Connector>,
    timeout: Duration,
    addr: &str,
) -> PoolResult<Arc<dyn Channel>> {
    let dialed = tokio::time::timeout(timeout, connector.dial(addr)).await;
    let channel = match dialed {
        Ok(Ok(channel)) => channel,
        Ok(Err(source)) => {
            return Err(PoolError::Dial {
                addr: addr.to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(PoolError::DialTimeout {
                addr: addr.to_string(),
                timeout,
            })
        }
    };

    let state = channel.state();
    match state {
        ConnState::Ready | ConnState::Connecting | ConnState::TransientFailure => Ok(channel),
        ConnState::Idle | ConnState::Shutdown => {
            let close_error = channel.close().err();
            Err(PoolError::UnhealthyConn {
                addr: addr.to_string(),
                state,
                close_error,
            })
        }
    }
}

struct PoolInner {
    config: PoolConfig,
    addr: String,
    host: String,
    port: u16,
    is_ip: bool,
    slots: Slots,
    cursor: AtomicU64,
    fingerprint: ArcSwap<String>,
    closing: AtomicBool,
    connector: Arc<dyn Connector>,
    resolver: Arc<dyn Resolver>,
    prober: Arc<dyn Prober>,
    runner: Arc<dyn TaskRunner>,
    retry: Option<Arc<dyn RetryPolicy>>,
    metrics: Arc<MetricsRegistry>,
}

/// Cheaply cloneable handle to a connection pool
///
/// Construct through [`Pool::builder`]; the build step normalizes the target
/// address and performs one throwaway reachability probe, so a returned pool
/// points at something that answered at least once.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

/// Configures collaborators before the pool is built
///
/// Every seam has a production default: TCP connector and prober, the
/// operating-system resolver, a tokio spawn runner, no retry policy, and the
/// process-wide metrics registry.
pub struct PoolBuilder {
    config: PoolConfig,
    connector: Option<Arc<dyn Connector>>,
    resolver: Option<Arc<dyn Resolver>>,
    prober: Option<Arc<dyn Prober>>,
    runner: Option<Arc<dyn TaskRunner>>,
    retry: Option<Arc<dyn RetryPolicy>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl PoolBuilder {
    /// Replace the transport connector
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replace the DNS resolver
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replace the reachability prober
    #[must_use]
    pub fn prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Replace the background task runner
    #[must_use]
    pub fn runner(mut self, runner: Arc<dyn TaskRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Retry dials under the given policy
    #[must_use]
    pub fn retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Record health counts into a private registry
    #[must_use]
    pub fn metrics(mut self, registry: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(registry);
        self
    }

    /// Validate, normalize the target, and probe it once
    ///
    /// When the target carries no port, the configured range is scanned.
    /// When the probe fails, the range is rescanned once and the probe
    /// retried against the rediscovered port before giving up.
    pub async fn build(self) -> PoolResult<Pool> {
        let config = self.config;
        config.validate()?;

        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(TcpConnector {
                dial_timeout: config.dial_timeout,
                nodelay: true,
            }),
        };
        let resolver: Arc<dyn Resolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(SystemResolver),
        };
        let prober: Arc<dyn Prober> = match self.prober {
            Some(prober) => prober,
            None => Arc::new(TcpProber::default()),
        };
        let runner: Arc<dyn TaskRunner> = match self.runner {
            Some(runner) => runner,
            None => Arc::new(TokioRunner),
        };
        let metrics = self.metrics.unwrap_or_else(crate::metrics::global);

        let (mut host, mut port, mut is_ip) = parse_target(&config.addr);
        if let Some(explicit) = config.host.clone() {
            is_ip = explicit.parse::<IpAddr>().is_ok();
            host = explicit;
        }
        if let Some(explicit) = config.port {
            port = Some(explicit);
        }
        if host.is_empty() {
            return Err(ConfigError::EmptyTarget.into());
        }

        let mut port = match port {
            Some(port) => port,
            None => scan_port(&connector, config.dial_timeout, &host, config.port_range).await?,
        };
        let mut addr = join_host_port(&host, port);

        // Throwaway reachability probe; one rescan on failure
        let probe = match classify_dial(&connector, config.dial_timeout, &addr).await {
            Ok(channel) => channel,
            Err(first) => {
                warn!(addr = %addr, error = %first, "Reachability probe failed, rescanning port range");
                port = scan_port(&connector, config.dial_timeout, &host, config.port_range).await?;
                addr = join_host_port(&host, port);
                classify_dial(&connector, config.dial_timeout, &addr).await?
            }
        };
        if let Err(source) = probe.close() {
            return Err(PoolError::ProbeClose { addr, source });
        }

        let size = config.effective_size();
        debug!(addr = %addr, size = size, is_ip = is_ip, "Pool built");

        Ok(Pool {
            inner: Arc::new(PoolInner {
                addr,
                host,
                port,
                is_ip,
                slots: Slots::new(size),
                cursor: AtomicU64::new(0),
                fingerprint: ArcSwap::from_pointee(String::new()),
                closing: AtomicBool::new(false),
                connector,
                resolver,
                prober,
                runner,
                retry: self.retry,
                metrics,
                config,
            }),
        })
    }
}

impl Pool {
    /// Start building a pool for the configured target
    #[must_use]
    pub fn builder(config: PoolConfig) -> PoolBuilder {
        PoolBuilder {
            config,
            connector: None,
            resolver: None,
            prober: None,
            runner: None,
            retry: None,
            metrics: None,
        }
    }

    /// Canonical target address (host:port after normalization)
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.inner.addr
    }

    /// Parsed target host
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Resolved target port
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.port
    }

    /// True when the target is an IP literal rather than a hostname
    #[must_use]
    pub fn is_ip_conn(&self) -> bool {
        self.inner.is_ip
    }

    /// Current slot count (grows with DNS membership, never shrinks)
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    /// True when the pool holds no slots
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.slots.len() == 0
    }

    /// Configured slot count
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.config.effective_size()
    }

    /// Snapshot of the health metrics registry this pool records into
    #[must_use]
    pub fn metrics(&self) -> HashMap<String, u64> {
        self.inner.metrics.snapshot()
    }

    /// Per-slot view of the pool: `(addr, state)` for filled slots, `None`
    /// for slots that have never held a connection
    #[must_use]
    pub fn slot_states(&self) -> Vec<Option<(String, ConnState)>> {
        (0..self.inner.slots.len())
            .map(|idx| {
                self.inner
                    .slots
                    .load(idx)
                    .map(|conn| (conn.addr().to_string(), conn.state()))
            })
            .collect()
    }

    fn closing(&self) -> bool {
        self.inner.closing.load(Ordering::SeqCst)
    }

    fn dns_tracking(&self) -> bool {
        self.inner.config.enable_dns_lookup && !self.inner.is_ip
    }

    /// Point every slot at the target, fanning out across resolved IPs when
    /// DNS lookup is enabled
    ///
    /// Returns once every refresh is scheduled; dials complete in the
    /// background. No-op while a disconnect is in flight.
    pub async fn connect(&self) -> PoolResult<()> {
        if self.closing() {
            return Ok(());
        }
        if !self.dns_tracking() {
            return self.single_target_connect(self.inner.addr.clone());
        }

        match lookup_reachable_ips(
            &self.inner.resolver,
            &self.inner.prober,
            &self.inner.host,
            self.inner.port,
        )
        .await
        {
            Err(error) => {
                warn!(host = %self.inner.host, error = %error, "DNS discovery failed, using target address directly");
                self.single_target_connect(self.inner.addr.clone())
            }
            Ok(ips) if ips.len() == 1 => {
                self.single_target_connect(join_host_port(&ips[0], self.inner.port))
            }
            Ok(ips) => {
                let key = membership_key(&ips);
                self.multi_ip_connect(&ips, key)
            }
        }
    }

    /// Re-assert connectivity, re-resolving DNS membership when tracked
    ///
    /// `force` always performs a full connect, as does a missing fingerprint
    /// or an unhealthy pool. Otherwise an unchanged membership is a no-op, a
    /// changed one re-fans-out, and a failed re-resolution leaves a healthy
    /// pool untouched.
    pub async fn reconnect(&self, force: bool) -> PoolResult<()> {
        if self.closing() {
            return Ok(());
        }
        let prior = self.inner.fingerprint.load_full();
        if force || prior.is_empty() || !self.is_healthy() {
            return self.connect().await;
        }
        if !self.dns_tracking() {
            return self.single_target_connect(self.inner.addr.clone());
        }

        match lookup_reachable_ips(
            &self.inner.resolver,
            &self.inner.prober,
            &self.inner.host,
            self.inner.port,
        )
        .await
        {
            Err(error) => {
                // A resolver blip must not tear down working connections
                if self.is_healthy() {
                    debug!(host = %self.inner.host, error = %error, "DNS re-resolution failed, keeping current connections");
                    return Ok(());
                }
                warn!(host = %self.inner.host, error = %error, "DNS re-resolution failed, using target address directly");
                self.single_target_connect(self.inner.addr.clone())
            }
            Ok(ips) if ips.len() == 1 => {
                self.single_target_connect(join_host_port(&ips[0], self.inner.port))
            }
            Ok(ips) => {
                let key = membership_key(&ips);
                if key == **prior {
                    return Ok(());
                }
                debug!(host = %self.inner.host, members = %key, "DNS membership changed, refanning out");
                self.multi_ip_connect(&ips, key)
            }
        }
    }

    /// Drain every slot and flush the store
    ///
    /// Close errors are collected across slots rather than aborting at the
    /// first; the store is flushed regardless.
    pub async fn disconnect(&self) -> PoolResult<()> {
        self.inner.closing.store(true, Ordering::SeqCst);
        let result = self.drain().await;
        self.inner.closing.store(false, Ordering::SeqCst);
        result
    }

    async fn drain(&self) -> PoolResult<()> {
        let delay = self.inner.config.old_conn_close_delay;
        let mut total = 0usize;
        let mut failures: Vec<String> = Vec::new();

        for idx in 0..self.inner.slots.len() {
            if let Some(conn) = self.inner.slots.swap(idx, None) {
                total += 1;
                if let Err(error) = conn.close(delay).await {
                    failures.push(format!("{}: {error}", conn.addr()));
                }
            }
        }
        self.inner.slots.flush();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PoolError::CloseFailures {
                failed: failures.len(),
                total,
                details: failures.join("; "),
            })
        }
    }

    /// Borrow a healthy channel, or `None` when every pass came up empty
    #[must_use]
    pub fn get(&self) -> Option<Arc<dyn Channel>> {
        self.pick().map(|conn| conn.channel())
    }

    /// Run `f` with a healthy channel
    ///
    /// Selection failure surfaces as [`PoolError::NoAvailableConn`] converted
    /// into the caller's error type; otherwise the callback's result is
    /// returned untouched.
    pub async fn execute<T, E, F, Fut>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(Arc<dyn Channel>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<PoolError>,
    {
        let Some(conn) = self.pick() else {
            return Err(E::from(PoolError::NoAvailableConn {
                addr: self.inner.addr.clone(),
            }));
        };
        f(conn.channel()).await
    }

    /// Health verdict across all slots
    ///
    /// IP-literal targets are strict (every slot must be healthy); hostname
    /// targets are lenient (one healthy slot suffices). Empty slots trigger a
    /// background refresh and health counts are recorded into the metrics
    /// registry when enabled.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        let len = self.inner.slots.len();
        if len == 0 {
            return false;
        }

        let mut healthy: u64 = 0;
        let mut unhealthy: u64 = 0;
        for idx in 0..len {
            match self.inner.slots.load(idx) {
                Some(conn) => {
                    if conn.is_healthy() {
                        healthy += 1;
                    } else {
                        unhealthy += 1;
                    }
                }
                None => {
                    unhealthy += 1;
                    self.schedule_refresh(idx, self.inner.addr.clone());
                }
            }
        }

        if self.inner.config.enable_metrics {
            self.inner.metrics.record_health(&self.inner.addr, healthy);
        }
        if healthy == 0 {
            return false;
        }
        if self.inner.is_ip {
            unhealthy == 0
        } else {
            true
        }
    }

    /// Round-robin selection with health fallback, three bounded passes
    fn pick(&self) -> Option<Arc<PoolConn>> {
        let len = self.inner.slots.len();
        if len == 0 {
            return None;
        }
        let modulus = u64::try_from(len).unwrap_or(u64::MAX);
        let ticket = self.inner.cursor.fetch_add(1, Ordering::Relaxed);
        let start = usize::try_from(ticket % modulus).unwrap_or(0);

        // Pass 1: first usable slot from the cursor; remember a transient
        // failure instead of returning it
        let mut recorded: Option<Arc<PoolConn>> = None;
        for i in 0..len {
            let idx = (start + i) % len;
            if let Some(conn) = self.inner.slots.load(idx) {
                match conn.state() {
                    ConnState::Ready | ConnState::Connecting => return Some(conn),
                    ConnState::Idle => {
                        conn.channel().connect();
                        return Some(conn);
                    }
                    ConnState::TransientFailure => {
                        if recorded.is_none() {
                            recorded = Some(conn);
                        }
                    }
                    ConnState::Shutdown => {}
                }
            }
        }

        // Pass 2: schedule refreshes for dead slots; a transient failure is
        // good enough as a last resort
        let mut refreshed: Vec<usize> = Vec::new();
        for i in 0..len {
            let idx = (start + i) % len;
            match self.inner.slots.load(idx) {
                Some(conn) if conn.state() != ConnState::Shutdown => {
                    if conn.state() == ConnState::TransientFailure {
                        return Some(recorded.unwrap_or(conn));
                    }
                }
                _ => {
                    self.schedule_refresh(idx, self.inner.addr.clone());
                    refreshed.push(idx);
                }
            }
        }

        // Pass 3: a scheduled refresh may already have landed
        for idx in refreshed {
            if let Some(conn) = self.inner.slots.load(idx) {
                if conn.state() != ConnState::Shutdown {
                    return Some(conn);
                }
            }
        }
        None
    }

    /// Point every slot at one address
    fn single_target_connect(&self, addr: String) -> PoolResult<()> {
        self.inner.fingerprint.store(Arc::new(addr.clone()));
        for idx in 0..self.inner.slots.len() {
            self.refresh_slot(idx, addr.clone());
        }
        Ok(())
    }

    /// Spread slots across resolved IPs, growing the store when membership
    /// outnumbers the slots
    fn multi_ip_connect(&self, ips: &[String], key: String) -> PoolResult<()> {
        self.inner.fingerprint.store(Arc::new(key));
        if ips.len() > self.inner.slots.len() {
            self.inner.slots.grow(ips.len());
        }
        let len = self.inner.slots.len();
        for idx in 0..len {
            let addr = join_host_port(&ips[idx % ips.len()], self.inner.port);
            self.refresh_slot(idx, addr);
        }
        Ok(())
    }

    /// Bring one slot to the desired address without disturbing a live conn
    ///
    /// Same address: Ready/Connecting/TransientFailure are left alone, Idle
    /// is nudged. Shutdown, empty, or a different address schedules a
    /// replacement dial.
    fn refresh_slot(&self, idx: usize, addr: String) {
        if let Some(existing) = self.inner.slots.load(idx) {
            if existing.addr() == addr {
                match existing.state() {
                    ConnState::Ready | ConnState::Connecting | ConnState::TransientFailure => {
                        return
                    }
                    ConnState::Idle => {
                        existing.channel().connect();
                        return;
                    }
                    ConnState::Shutdown => {}
                }
            }
        }
        self.schedule_refresh(idx, addr);
    }

    /// Fire-and-forget replacement dial for one slot
    fn schedule_refresh(&self, idx: usize, addr: String) {
        if self.closing() {
            return;
        }
        let pool = self.clone();
        self.inner.runner.go(Box::pin(async move {
            pool.replace_slot(idx, addr).await;
        }));
    }

    /// Dial and swap in a fresh connection; never propagates errors
    ///
    /// On dial failure a still-healthy occupant is kept; a dead one is
    /// retired and the slot emptied.
    async fn replace_slot(&self, idx: usize, addr: String) {
        let prior = self.inner.slots.load(idx);
        match self.dial(&addr).await {
            Ok(channel) => {
                let fresh = Arc::new(PoolConn::new(channel, addr.clone()));
                if let Some(old) = self.inner.slots.swap(idx, Some(fresh)) {
                    self.schedule_close(old);
                }
                debug!(slot = idx, addr = %addr, "Slot refreshed");
            }
            Err(error) => {
                warn!(slot = idx, addr = %addr, error = %error, "Slot refresh dial failed");
                match prior {
                    Some(old) if old.is_healthy() => {}
                    Some(_) => {
                        if let Some(old) = self.inner.slots.swap(idx, None) {
                            self.schedule_close(old);
                        }
                    }
                    None => {}
                }
            }
        }
    }

    /// Graceful close in the background with the configured delay
    fn schedule_close(&self, conn: Arc<PoolConn>) {
        let delay = self.inner.config.old_conn_close_delay;
        self.inner.runner.go(Box::pin(async move {
            if let Err(error) = conn.close(delay).await {
                debug!(addr = %conn.addr(), error = %error, "Retired connection close failed");
            }
        }));
    }

    /// Dial with the configured budget, retried under the retry policy
    async fn dial(&self, addr: &str) -> PoolResult<Arc<dyn Channel>> {
        let mut attempt: u32 = 0;
        loop {
            match self.dial_once(addr).await {
                Ok(channel) => return Ok(channel),
                Err(error) => {
                    let delay = self
                        .inner
                        .retry
                        .as_ref()
                        .and_then(|policy| policy.next_delay(attempt));
                    match delay {
                        Some(delay) => {
                            debug!(
                                addr = %addr,
                                attempt = attempt,
                                delay_ms = delay.as_millis(),
                                error = %error,
                                "Dial failed, backing off"
                            );
                            tokio::time::sleep(delay).await;
                            attempt = attempt.saturating_add(1);
                        }
                        None => return Err(error),
                    }
                }
            }
        }
    }

    async fn dial_once(&self, addr: &str) -> PoolResult<Arc<dyn Channel>> {
        classify_dial(&self.inner.connector, self.inner.config.dial_timeout, addr).await
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.inner.slots.len();
        let mut healthy = 0usize;
        for idx in 0..len {
            if let Some(conn) = self.inner.slots.load(idx) {
                if conn.state().is_healthy() {
                    healthy += 1;
                }
            }
        }
        write!(
            f,
            "addr: {}, host: {}, port: {}, is_ip: {}, dns_lookup: {}, dial_timeout: {:?}, old_conn_close_delay: {:?}, port_range: {}-{}, size: {}, len: {}, healthy: {}, closing: {}",
            self.inner.addr,
            self.inner.host,
            self.inner.port,
            self.inner.is_ip,
            self.inner.config.enable_dns_lookup,
            self.inner.config.dial_timeout,
            self.inner.config.old_conn_close_delay,
            self.inner.config.port_range.0,
            self.inner.config.port_range.1,
            self.size(),
            len,
            healthy,
            self.closing(),
        )
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("addr", &self.inner.addr)
            .field("size", &self.size())
            .field("len", &self.len())
            .field("is_ip", &self.inner.is_ip)
            .finish_non_exhaustive()
    }
}
