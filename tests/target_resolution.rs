// ABOUTME: Integration tests for target normalization, port scanning, and DNS fan-out

use std::io::Write;
use std::time::Duration;
use tidepool::{ConnState, DiscoveryError, Pool, PoolConfig, PoolError};
use tokio::net::TcpListener;

async fn listener() -> (TcpListener, String, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local = listener.local_addr().unwrap();
    (listener, local.to_string(), local.port())
}

async fn settle<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

fn all_ready(pool: &Pool) -> bool {
    let slots = pool.slot_states();
    !slots.is_empty()
        && slots
            .iter()
            .all(|slot| matches!(slot, Some((_, ConnState::Ready))))
}

#[tokio::test]
async fn test_build_scans_port_range_for_bare_ip() {
    let (_listener, _, port) = listener().await;

    let mut config = PoolConfig::new("127.0.0.1");
    config.size = 2;
    config.dial_timeout = Duration::from_millis(500);
    config.port_range = (port, port);

    let pool = Pool::builder(config).build().await.unwrap();

    assert_eq!(pool.port(), port);
    assert_eq!(pool.addr(), format!("127.0.0.1:{port}"));
    assert!(pool.is_ip_conn());
}

#[tokio::test]
async fn test_build_fails_when_nothing_listens() {
    // Bind and release so the port is known to be closed.
    let port = {
        let (listener, _, port) = listener().await;
        drop(listener);
        port
    };

    let mut config = PoolConfig::new("127.0.0.1");
    config.dial_timeout = Duration::from_millis(200);
    config.port_range = (port, port);

    let result = Pool::builder(config).build().await;
    assert!(matches!(
        result,
        Err(PoolError::Discovery(DiscoveryError::NoAvailablePort { .. }))
    ));
}

#[tokio::test]
async fn test_build_rejects_empty_target() {
    let result = Pool::builder(PoolConfig::new("")).build().await;
    assert!(matches!(result, Err(PoolError::Config(_))));
}

#[tokio::test]
async fn test_explicit_host_and_port_override_target() {
    let (_listener, _, port) = listener().await;

    let mut config = PoolConfig::new("stale.internal:1");
    config.host = Some("127.0.0.1".to_string());
    config.port = Some(port);
    config.dial_timeout = Duration::from_millis(500);

    let pool = Pool::builder(config).build().await.unwrap();

    assert_eq!(pool.host(), "127.0.0.1");
    assert_eq!(pool.port(), port);
    assert_eq!(pool.addr(), format!("127.0.0.1:{port}"));
    assert!(pool.is_ip_conn());
}

#[tokio::test]
async fn test_dns_lookup_resolves_hostname_target() {
    let (_listener, _, port) = listener().await;

    let mut config = PoolConfig::new("localhost");
    config.size = 2;
    config.port = Some(port);
    config.dial_timeout = Duration::from_millis(500);
    config.enable_dns_lookup = true;

    let pool = Pool::builder(config).build().await.unwrap();
    assert!(!pool.is_ip_conn());

    pool.connect().await.unwrap();
    assert!(settle(|| all_ready(&pool)).await, "slots never became ready");
    assert!(pool.is_healthy());

    let suffix = format!(":{port}");
    for slot in pool.slot_states() {
        let (slot_addr, _) = slot.unwrap();
        assert!(
            slot_addr.ends_with(&suffix),
            "slot points at unexpected address {slot_addr}"
        );
    }
}

#[tokio::test]
async fn test_config_file_drives_pool_build() {
    let (_listener, addr, _) = listener().await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
addr = "{addr}"
size = 2
dial_timeout = 500
old_conn_close_delay = 50
"#
    )
    .unwrap();

    let config = PoolConfig::from_file(file.path()).unwrap();
    assert_eq!(config.addr, addr);
    assert_eq!(config.size, 2);
    assert_eq!(config.dial_timeout, Duration::from_millis(500));

    let pool = Pool::builder(config).build().await.unwrap();
    pool.connect().await.unwrap();
    assert!(settle(|| all_ready(&pool)).await);
    assert!(pool.is_healthy());
}
