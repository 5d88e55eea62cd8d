// ABOUTME: Library crate for tidepool exposing the connection pool public API

#![allow(missing_docs)]

pub mod backoff;
pub mod config;
pub mod conn;
pub mod discovery;
pub mod metrics;
pub mod monitor;
pub mod pool;
pub mod runner;
mod slots;
pub mod transport;

pub use backoff::{ExponentialBackoff, RetryPolicy};
pub use config::{ConfigError, PoolConfig};
pub use conn::{Channel, ConnState, Connector, PoolConn};
pub use discovery::{DiscoveryError, Prober, Resolver, SystemResolver, TcpProber};
pub use metrics::{global, HealthRecord, MetricsRegistry};
pub use monitor::PoolMonitor;
pub use pool::{Pool, PoolBuilder, PoolError, PoolResult};
pub use runner::{TaskRunner, TokioRunner};
pub use transport::{TcpChannel, TcpConnector};
