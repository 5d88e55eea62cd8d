// ABOUTME: Diagnostic CLI for the tidepool connection pool
//
// Binary: tidepool
// Usage: tidepool <COMMAND>
// - check: build a pool against a target and report per-slot health
// - scan: walk a port range on a host and print the first responding port

#![allow(missing_docs)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tidepool::{discovery, Connector, Pool, PoolConfig, TcpConnector};

/// Connection pool diagnostics - dial targets the way the pool would
#[derive(Parser)]
#[command(name = "tidepool")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Build a pool against a target and report slot states
    Check(CheckArgs),

    /// Scan a port range and print the first port that answers
    Scan(ScanArgs),
}

/// Arguments for the check command
#[derive(clap::Args)]
struct CheckArgs {
    /// Target address (host, host:port, ip, or ip:port)
    target: String,

    /// Number of pool slots
    #[arg(long)]
    size: Option<usize>,

    /// Dial timeout in milliseconds
    #[arg(long)]
    dial_timeout_ms: Option<u64>,

    /// Resolve the host through DNS and fan out across its records
    #[arg(long)]
    dns: bool,

    /// Port range to scan when the target carries no port (start-end)
    #[arg(long, value_parser = parse_range)]
    range: Option<(u16, u16)>,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the scan command
#[derive(clap::Args)]
struct ScanArgs {
    /// Host to scan
    host: String,

    /// Port range to walk (start-end)
    #[arg(long, value_parser = parse_range)]
    range: (u16, u16),

    /// Dial timeout in milliseconds
    #[arg(long, default_value = "1000")]
    dial_timeout_ms: u64,

    /// Emit the result as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let args = Cli::parse();

    match args.command {
        Commands::Check(check_args) => run_check(check_args).await,
        Commands::Scan(scan_args) => run_scan(scan_args).await,
    }
}

/// One slot's address and connectivity state
#[derive(Debug, Serialize)]
struct SlotReport {
    index: usize,
    addr: Option<String>,
    state: String,
}

/// Full pool report emitted by the check command
#[derive(Debug, Serialize)]
struct CheckReport {
    target: String,
    host: String,
    port: u16,
    is_ip: bool,
    dns_lookup: bool,
    size: usize,
    len: usize,
    healthy: bool,
    slots: Vec<SlotReport>,
    metrics: HashMap<String, u64>,
}

impl CheckReport {
    fn gather(pool: &Pool, dns_lookup: bool) -> Self {
        let slots = pool
            .slot_states()
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Some((addr, state)) => SlotReport {
                    index,
                    addr: Some(addr),
                    state: state.to_string(),
                },
                None => SlotReport {
                    index,
                    addr: None,
                    state: "EMPTY".to_string(),
                },
            })
            .collect();

        // is_healthy also records the healthy count into the registry, so it
        // runs before the metrics snapshot is taken.
        let healthy = pool.is_healthy();

        Self {
            target: pool.addr().to_string(),
            host: pool.host().to_string(),
            port: pool.port(),
            is_ip: pool.is_ip_conn(),
            dns_lookup,
            size: pool.size(),
            len: pool.len(),
            healthy,
            slots,
            metrics: pool.metrics(),
        }
    }
}

/// Execute the check command
async fn run_check(args: CheckArgs) -> Result<()> {
    let mut config = PoolConfig::new(&args.target);
    if let Some(size) = args.size {
        config.size = size;
    }
    if let Some(ms) = args.dial_timeout_ms {
        config.dial_timeout = Duration::from_millis(ms);
    }
    if let Some(range) = args.range {
        config.port_range = range;
    }
    config.enable_dns_lookup = args.dns;

    let settle = config.dial_timeout;

    let pool = Pool::builder(config)
        .build()
        .await
        .with_context(|| format!("failed to reach target '{}'", args.target))?;
    pool.connect()
        .await
        .with_context(|| format!("failed to connect pool to '{}'", args.target))?;

    // Slot dials run in the background; give them one dial timeout to land
    // before reading the states.
    tokio::time::sleep(settle).await;

    let report = CheckReport::gather(&pool, args.dns);
    pool.disconnect().await.context("pool teardown failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output_check_text(&report);
    }

    if !report.healthy {
        std::process::exit(1);
    }
    Ok(())
}

/// Output the check report as a text table
fn output_check_text(report: &CheckReport) {
    println!(
        "target: {} (host: {}, port: {}, is_ip: {}, dns_lookup: {})",
        report.target, report.host, report.port, report.is_ip, report.dns_lookup
    );
    println!("slots: {} of {} configured", report.len, report.size);
    println!();
    println!("{:<6} {:<28} STATE", "SLOT", "ADDR");
    let separator = "-".repeat(52);
    println!("{separator}");
    for slot in &report.slots {
        let addr = slot.addr.as_deref().unwrap_or("-");
        println!("{:<6} {:<28} {}", slot.index, addr, slot.state);
    }
    println!();
    println!("healthy: {}", report.healthy);

    if !report.metrics.is_empty() {
        println!();
        println!("metrics:");
        let mut entries: Vec<_> = report.metrics.iter().collect();
        entries.sort();
        for (addr, count) in entries {
            println!("  {addr}: {count} healthy");
        }
    }
}

/// Result emitted by the scan command
#[derive(Debug, Serialize)]
struct ScanReport {
    host: String,
    port: u16,
}

/// Execute the scan command
async fn run_scan(args: ScanArgs) -> Result<()> {
    let dial_timeout = Duration::from_millis(args.dial_timeout_ms);
    let connector: Arc<dyn Connector> = Arc::new(TcpConnector {
        dial_timeout,
        nodelay: true,
    });

    let port = discovery::scan_port(&connector, dial_timeout, &args.host, args.range)
        .await
        .with_context(|| format!("no responding port on '{}'", args.host))?;

    if args.json {
        let report = ScanReport {
            host: args.host,
            port,
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{}:{}", args.host, port);
    }
    Ok(())
}

/// Parse a `start-end` port range
fn parse_range(raw: &str) -> Result<(u16, u16), String> {
    let (start, end) = raw
        .split_once('-')
        .ok_or_else(|| format!("expected start-end, got '{raw}'"))?;
    let start: u16 = start
        .trim()
        .parse()
        .map_err(|_| format!("invalid start port '{start}'"))?;
    let end: u16 = end
        .trim()
        .parse()
        .map_err(|_| format!("invalid end port '{end}'"))?;
    if start > end {
        return Err(format!("start port {start} exceeds end port {end}"));
    }
    Ok((start, end))
}

fn setup_logging() {
    use tracing_subscriber::prelude::*;

    // Reports go to stdout; logs stay on stderr so --json output pipes clean.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tidepool=info".into()),
        )
        .init();
}
