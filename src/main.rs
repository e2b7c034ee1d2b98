//! MilletDB server entry point.
//!
//! Wires the pieces together: parse flags, initialize logging, restore
//! the latest snapshot, start the background tasks, accept connections,
//! and unwind cleanly on ctrl-c (final snapshot included).

use milletdb::commands::CommandHandler;
use milletdb::connection::{handle_connection, ConnectionStats};
use milletdb::snapshot::SnapshotManager;
use milletdb::storage::{BackgroundSweeper, ShardedStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Server configuration
struct Config {
    host: String,
    port: u16,
    shards: usize,
    capacity_per_shard: usize,
    max_key_bytes: Option<usize>,
    max_value_bytes: Option<usize>,
    snapshot_dir: String,
    snapshot_interval: Duration,
    sweep_interval: Duration,
    snapshots_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: milletdb::DEFAULT_HOST.to_string(),
            port: milletdb::DEFAULT_PORT,
            shards: 8,
            capacity_per_shard: 10_000,
            max_key_bytes: Some(4 * 1024),
            max_value_bytes: Some(1024 * 1024),
            snapshot_dir: "./snapshots".to_string(),
            snapshot_interval: Duration::from_secs(30),
            sweep_interval: Duration::from_millis(1000),
            snapshots_enabled: true,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    config.host = take_value(&args, &mut i, "--host");
                }
                "--port" | "-p" => {
                    config.port = parse_or_exit(&take_value(&args, &mut i, "--port"), "port");
                }
                "--shards" => {
                    config.shards =
                        parse_or_exit(&take_value(&args, &mut i, "--shards"), "shard count");
                }
                "--capacity" => {
                    config.capacity_per_shard = parse_or_exit(
                        &take_value(&args, &mut i, "--capacity"),
                        "capacity per shard",
                    );
                }
                "--max-key-bytes" => {
                    config.max_key_bytes = Some(parse_or_exit(
                        &take_value(&args, &mut i, "--max-key-bytes"),
                        "max key bytes",
                    ));
                }
                "--max-value-bytes" => {
                    config.max_value_bytes = Some(parse_or_exit(
                        &take_value(&args, &mut i, "--max-value-bytes"),
                        "max value bytes",
                    ));
                }
                "--snapshot-dir" => {
                    config.snapshot_dir = take_value(&args, &mut i, "--snapshot-dir");
                }
                "--snapshot-interval" => {
                    let secs: u64 = parse_or_exit(
                        &take_value(&args, &mut i, "--snapshot-interval"),
                        "snapshot interval",
                    );
                    config.snapshot_interval = Duration::from_secs(secs);
                }
                "--sweep-interval" => {
                    let millis: u64 = parse_or_exit(
                        &take_value(&args, &mut i, "--sweep-interval"),
                        "sweep interval",
                    );
                    config.sweep_interval = Duration::from_millis(millis);
                }
                "--no-snapshots" => {
                    config.snapshots_enabled = false;
                    i += 1;
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("MilletDB version {}", milletdb::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {}", other);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        if !config.shards.is_power_of_two() {
            eprintln!("Error: --shards must be a power of two");
            std::process::exit(1);
        }
        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Consumes the value following a flag, advancing the cursor past both.
fn take_value(args: &[String], i: &mut usize, flag: &str) -> String {
    if *i + 1 >= args.len() {
        eprintln!("Error: {} requires a value", flag);
        std::process::exit(1);
    }
    let value = args[*i + 1].clone();
    *i += 2;
    value
}

fn parse_or_exit<T: std::str::FromStr>(raw: &str, what: &str) -> T {
    raw.parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid {}: {}", what, raw);
        std::process::exit(1);
    })
}

fn print_help() {
    println!(
        r#"
MilletDB - A Sharded In-Memory Key-Value Store

USAGE:
    milletdb [OPTIONS]

OPTIONS:
    -h, --host <HOST>              Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>              Port to listen on (default: 7379)
        --shards <N>               Shard count, power of two (default: 8)
        --capacity <N>             Capacity per shard (default: 10000)
        --max-key-bytes <N>        Maximum key size (default: 4096)
        --max-value-bytes <N>      Maximum value size (default: 1048576)
        --snapshot-dir <PATH>      Snapshot directory (default: ./snapshots)
        --snapshot-interval <SECS> Seconds between snapshots (default: 30)
        --sweep-interval <MS>      Milliseconds between expiry sweeps (default: 1000)
        --no-snapshots             Disable snapshot persistence
    -v, --version                  Print version information
        --help                     Print this help message

CONNECTING:
    Any line-oriented TCP client works:
    $ nc 127.0.0.1 7379
    SET name pavan
    +OK
    GET name
    $5
    pavan
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
        ╔╦╗╦╦  ╦  ╔═╗╔╦╗╔╦╗╔╗
        ║║║║║  ║  ║╣  ║  ║║╠╩╗
        ╩ ╩╩╩═╝╩═╝╚═╝ ╩ ═╩╝╚═╝

MilletDB v{} - Sharded In-Memory Key-Value Store
────────────────────────────────────────────────
Listening on {}
Shards: {} x {} entries
Snapshots: {}

Use Ctrl+C to shut down gracefully.
"#,
        milletdb::VERSION,
        config.bind_address(),
        config.shards,
        config.capacity_per_shard,
        if config.snapshots_enabled {
            config.snapshot_dir.as_str()
        } else {
            "disabled"
        },
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    print_banner(&config);

    let store = Arc::new(ShardedStore::new(
        config.shards,
        config.capacity_per_shard,
        config.max_key_bytes,
        config.max_value_bytes,
    ));
    info!(
        shards = config.shards,
        capacity_per_shard = config.capacity_per_shard,
        "storage engine initialized"
    );

    let snapshot_manager = if config.snapshots_enabled {
        let manager = Arc::new(SnapshotManager::new(&config.snapshot_dir)?);
        if manager.load_latest_snapshot(&store)? {
            info!(size = store.size(), "restored latest snapshot");
        } else {
            info!("no snapshot found, starting with an empty store");
        }
        manager.start_periodic(Arc::clone(&store), config.snapshot_interval)?;
        Some(manager)
    } else {
        info!("snapshot persistence disabled");
        None
    };

    let sweeper = BackgroundSweeper::new(Arc::clone(&store));
    sweeper.start(config.sweep_interval)?;

    let stats = Arc::new(ConnectionStats::new());
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(addr = %config.bind_address(), "listening");

    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
        info!("shutdown signal received");
    };

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&store), Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    // Orderly teardown: stop the schedules, then persist a final image.
    sweeper.stop().await?;
    if let Some(manager) = snapshot_manager {
        manager.stop_periodic().await?;
        match manager.save_snapshot(&store) {
            Ok(path) => info!(path = %path.display(), "final snapshot saved"),
            Err(err) => error!(error = %err, "final snapshot failed"),
        }
    }
    info!(
        connections = stats.total_connections(),
        commands = stats.total_commands(),
        size = store.size(),
        "server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    store: Arc<ShardedStore>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&store), Arc::clone(&stats));
                let stats = Arc::clone(&stats);
                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(err) => {
                error!(error = %err, "failed to accept connection");
            }
        }
    }
}
