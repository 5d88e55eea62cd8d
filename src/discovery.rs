// ABOUTME: Endpoint discovery: DNS resolution, TCP reachability probes, port scanning
//
// Resolver and Prober are trait seams so the pool can be tested without
// touching a real network. lookup_reachable_ips filters resolved records down
// to addresses that answer a short TCP probe; scan_port walks a port range
// until a dial produces a healthy channel.

use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::debug;

use crate::conn::{Channel, Connector};

/// Reachability probes answer within this budget or the address is skipped
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(10);

/// Discovery failures
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The resolver could not produce records for the host
    #[error("DNS lookup for {host} failed: {source}")]
    Lookup {
        /// Host passed to the resolver
        host: String,
        /// Underlying resolver error
        #[source]
        source: io::Error,
    },

    /// Every resolved record failed the reachability probe
    #[error("no reachable address for {host}")]
    NoReachableAddr {
        /// Host whose records were all unreachable
        host: String,
    },

    /// No port in the scanned range accepted a connection
    #[error("no listening port for {host} in range {start}-{end}")]
    NoAvailablePort {
        /// Host that was scanned
        host: String,
        /// First port tried
        start: u16,
        /// Last port tried
        end: u16,
    },
}

/// Name resolution seam
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve a hostname to its address records
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Reachability probe seam
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Prober: Send + Sync {
    /// True when the address accepts a connection within the probe budget
    async fn probe(&self, addr: &str) -> bool;
}

/// Resolver backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let mut ips: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
            .await?
            .map(|sock| sock.ip())
            .collect();
        ips.dedup();
        Ok(ips)
    }
}

/// Prober that opens and immediately drops a TCP connection
#[derive(Debug, Clone)]
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    /// Prober with an explicit per-address budget
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, addr: &str) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                true
            }
            Ok(Err(_)) | Err(_) => false,
        }
    }
}

/// Join host and port, bracketing IPv6 literals
pub(crate) fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Membership key for a resolved address set; input must already be sorted
pub(crate) fn membership_key(ips: &[String]) -> String {
    ips.join(",")
}

/// Resolve a host and keep only addresses that answer a probe on `port`
///
/// The returned list is sorted and deduplicated so callers can derive a
/// stable membership key from it.
pub(crate) async fn lookup_reachable_ips(
    resolver: &Arc<dyn Resolver>,
    prober: &Arc<dyn Prober>,
    host: &str,
    port: u16,
) -> Result<Vec<String>, DiscoveryError> {
    let records = resolver
        .lookup(host)
        .await
        .map_err(|source| DiscoveryError::Lookup {
            host: host.to_string(),
            source,
        })?;

    let mut ips = Vec::with_capacity(records.len());
    for ip in records {
        let addr = join_host_port(&ip.to_string(), port);
        if prober.probe(&addr).await {
            ips.push(ip.to_string());
        } else {
            debug!(host = host, addr = %addr, "Dropping unreachable record");
        }
    }

    ips.sort();
    ips.dedup();

    if ips.is_empty() {
        return Err(DiscoveryError::NoReachableAddr {
            host: host.to_string(),
        });
    }
    Ok(ips)
}

/// Walk `range` until a dial on `host` yields a healthy channel
///
/// Probe channels are closed whether or not they win; only the port number
/// survives the scan.
///
/// # Errors
///
/// Returns [`DiscoveryError::NoAvailablePort`] when the whole range is
/// exhausted without a healthy dial.
pub async fn scan_port(
    connector: &Arc<dyn Connector>,
    dial_timeout: Duration,
    host: &str,
    range: (u16, u16),
) -> Result<u16, DiscoveryError> {
    let (start, end) = range;
    for port in start..=end {
        let addr = join_host_port(host, port);
        let dialed = tokio::time::timeout(dial_timeout, connector.dial(&addr)).await;
        match dialed {
            Ok(Ok(channel)) => {
                let healthy = channel.state().is_healthy();
                if let Err(error) = channel.close() {
                    debug!(addr = %addr, error = %error, "Closing scan probe failed");
                }
                if healthy {
                    debug!(host = host, port = port, "Port scan hit");
                    return Ok(port);
                }
            }
            Ok(Err(_)) | Err(_) => {}
        }
    }
    Err(DiscoveryError::NoAvailablePort {
        host: host.to_string(),
        start,
        end,
    })
}
