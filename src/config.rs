// ABOUTME: Configuration for the connection pool
//
// Defines PoolConfig with all tunable parameters for a pool:
// - Target address and optional explicit host/port override
// - Slot count, dial timeout, retired-connection close delay
// - DNS lookup toggle for multi-replica targets
// - Port-scan range for targets with an unknown listening port

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Default number of connection slots per pool
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Default port range scanned when the target carries no port
pub const DEFAULT_PORT_RANGE: (u16, u16) = (80, 65535);

/// Errors produced while building or loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Target address is empty
    #[error("Target address is empty")]
    EmptyTarget,

    /// Invalid port scan range
    #[error("Invalid port range: start ({start}) must be less than or equal to end ({end})")]
    InvalidPortRange { start: u16, end: u16 },

    /// Failed to read a configuration file
    #[error("Failed to read config file: {0}")]
    Read(#[source] std::io::Error),

    /// Failed to parse a configuration file
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for a connection pool
///
/// All fields have defaults; a pool for `"localhost:8081"` needs nothing but
/// the address. Immutable once handed to the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Target address: `host:port`, a bare host, or an IP literal
    pub addr: String,

    /// Explicit host override; skips address parsing when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Explicit port override; skips port discovery when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    // === Sizing ===
    /// Number of connection slots (0 falls back to DEFAULT_POOL_SIZE)
    pub size: usize,

    // === Timeouts ===
    /// Per-attempt dial timeout
    #[serde(with = "duration_ms")]
    pub dial_timeout: Duration,

    /// Grace period for draining a replaced or retired connection
    #[serde(with = "duration_ms")]
    pub old_conn_close_delay: Duration,

    // === Discovery ===
    /// Resolve the host through DNS and fan slots out across the answers
    pub enable_dns_lookup: bool,

    /// Port range tried when no port can be determined (start, end inclusive)
    pub port_range: (u16, u16),

    // === Observability ===
    /// Record healthy-slot counts into the metrics registry on health checks
    pub enable_metrics: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            host: None,
            port: None,

            size: DEFAULT_POOL_SIZE,

            dial_timeout: Duration::from_secs(1),
            old_conn_close_delay: Duration::from_secs(120), // 2 minutes

            enable_dns_lookup: false,
            port_range: DEFAULT_PORT_RANGE,

            enable_metrics: true,
        }
    }
}

impl PoolConfig {
    /// Create a configuration for the given target with all defaults
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    ///
    /// Missing fields take their defaults, so a file may set only the keys
    /// it cares about.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `EmptyTarget` when neither `addr` nor `host` is set, and
    /// `InvalidPortRange` when the scan range is inverted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.addr.is_empty() && self.host.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::EmptyTarget);
        }

        let (start, end) = self.port_range;
        if start > end {
            return Err(ConfigError::InvalidPortRange { start, end });
        }

        Ok(())
    }

    /// Slot count with the zero-means-default rule applied
    #[must_use]
    pub const fn effective_size(&self) -> usize {
        if self.size == 0 {
            DEFAULT_POOL_SIZE
        } else {
            self.size
        }
    }
}

/// Serde helper for Duration as milliseconds (u64)
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.size, DEFAULT_POOL_SIZE);
        assert_eq!(config.dial_timeout, Duration::from_secs(1));
        assert_eq!(config.old_conn_close_delay, Duration::from_secs(120));
        assert!(!config.enable_dns_lookup);
        assert_eq!(config.port_range, (80, 65535));
        assert!(config.enable_metrics);
    }

    #[test]
    fn test_new_sets_addr() {
        let config = PoolConfig::new("search-agent.default.svc:8081");
        assert_eq!(config.addr, "search-agent.default.svc:8081");
        assert_eq!(config.size, DEFAULT_POOL_SIZE);
    }

    #[test]
    fn test_validate_empty_target() {
        let config = PoolConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyTarget)));
    }

    #[test]
    fn test_validate_host_without_addr() {
        let config = PoolConfig {
            host: Some("localhost".to_string()),
            ..PoolConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_inverted_port_range() {
        let config = PoolConfig {
            addr: "localhost:8081".to_string(),
            port_range: (9000, 8000),
            ..PoolConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidPortRange {
                start: 9000,
                end: 8000
            }
        ));
        assert!(err.to_string().contains("9000"));
    }

    #[test]
    fn test_effective_size_zero_falls_back() {
        let config = PoolConfig {
            size: 0,
            ..PoolConfig::default()
        };
        assert_eq!(config.effective_size(), DEFAULT_POOL_SIZE);

        let config = PoolConfig {
            size: 16,
            ..PoolConfig::default()
        };
        assert_eq!(config.effective_size(), 16);
    }

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pool.toml");
        std::fs::write(
            &path,
            r#"
addr = "10.0.0.3:8081"
size = 8
dial_timeout = 500
"#,
        )
        .unwrap();

        let config = PoolConfig::from_file(&path).unwrap();
        assert_eq!(config.addr, "10.0.0.3:8081");
        assert_eq!(config.size, 8);
        assert_eq!(config.dial_timeout, Duration::from_millis(500));
        // Unspecified keys keep their defaults
        assert_eq!(config.old_conn_close_delay, Duration::from_secs(120));
        assert_eq!(config.port_range, (80, 65535));
    }

    #[test]
    fn test_from_file_missing() {
        let err = PoolConfig::from_file("/nonexistent/pool.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }

    #[test]
    fn test_from_file_invalid_range_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pool.toml");
        std::fs::write(&path, "addr = \"localhost:1\"\nport_range = [9000, 80]\n").unwrap();

        assert!(matches!(
            PoolConfig::from_file(&path),
            Err(ConfigError::InvalidPortRange { .. })
        ));
    }

    #[test]
    fn test_duration_roundtrip_via_toml() {
        let config = PoolConfig {
            addr: "localhost:8081".to_string(),
            dial_timeout: Duration::from_millis(1500),
            ..PoolConfig::default()
        };

        let encoded = toml::to_string(&config).unwrap();
        let decoded: PoolConfig = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded.dial_timeout, Duration::from_millis(1500));
    }
}
