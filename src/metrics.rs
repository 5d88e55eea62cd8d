// ABOUTME: Per-address health metrics recorded by pool health checks
//
// A registry is injected into each pool (the process-wide default via
// global()); health checks overwrite the entry for their address, and the
// entry stays until the process exits. Snapshots are plain maps so callers
// never hold a registry lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use lazy_static::lazy_static;
use serde::Serialize;

lazy_static! {
    static ref GLOBAL: Arc<MetricsRegistry> = Arc::new(MetricsRegistry::new());
}

/// Process-wide registry used by pools that are not given their own
#[must_use]
pub fn global() -> Arc<MetricsRegistry> {
    Arc::clone(&GLOBAL)
}

/// Latest health observation for one address
#[derive(Debug, Clone, Serialize)]
pub struct HealthRecord {
    /// Healthy connections seen by the most recent check
    pub healthy: u64,

    /// When the check ran
    pub observed_at: DateTime<Utc>,
}

/// Concurrent addr -> health map
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    records: DashMap<String, HealthRecord>,
}

impl MetricsRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the record for an address
    pub fn record_health(&self, addr: &str, healthy: u64) {
        self.records.insert(
            addr.to_string(),
            HealthRecord {
                healthy,
                observed_at: Utc::now(),
            },
        );
    }

    /// Copy of the current addr -> healthy-count map
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().healthy))
            .collect()
    }

    /// Full records sorted by address, for diagnostic output
    #[must_use]
    pub fn records(&self) -> Vec<(String, HealthRecord)> {
        let mut out: Vec<(String, HealthRecord)> = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Number of tracked addresses
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_empty() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_record_then_snapshot() {
        let registry = MetricsRegistry::new();
        registry.record_health("10.0.0.1:8081", 3);
        registry.record_health("10.0.0.2:8081", 4);

        let snap = registry.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.get("10.0.0.1:8081"), Some(&3));
        assert_eq!(snap.get("10.0.0.2:8081"), Some(&4));
    }

    #[test]
    fn test_record_overwrites_previous() {
        let registry = MetricsRegistry::new();
        registry.record_health("10.0.0.1:8081", 4);
        registry.record_health("10.0.0.1:8081", 1);

        assert_eq!(registry.snapshot().get("10.0.0.1:8081"), Some(&1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_records_sorted_by_address() {
        let registry = MetricsRegistry::new();
        registry.record_health("10.0.0.2:8081", 1);
        registry.record_health("10.0.0.1:8081", 2);

        let records = registry.records();
        assert_eq!(records[0].0, "10.0.0.1:8081");
        assert_eq!(records[1].0, "10.0.0.2:8081");
    }

    #[test]
    fn test_global_is_shared() {
        let a = global();
        let b = global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_record_serializes_to_json() {
        let registry = MetricsRegistry::new();
        registry.record_health("10.0.0.1:8081", 2);

        let records = registry.records();
        let json = serde_json::to_value(&records[0].1).unwrap();
        assert_eq!(json["healthy"], 2);
        assert!(json["observed_at"].is_string());
    }
}
