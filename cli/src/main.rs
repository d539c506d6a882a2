//! auctionindex CLI — run and manage the Velax auction indexer.
//!
//! Usage:
//! ```bash
//! SUI_RPC_URL=https://fullnode.testnet.sui.io:443 \
//! AUCTION_PACKAGE_ID=0xd1c3... \
//!   auctionindex run
//!
//! auctionindex status
//! auctionindex reset --stream 0xd1c3...::auction::BidPlaced
//! ```
//!
//! Configuration is environment-driven:
//!
//! | Variable             | Default               | Purpose                       |
//! |----------------------|-----------------------|-------------------------------|
//! | `SUI_RPC_URL`        | (required for `run`)  | Fullnode JSON-RPC endpoint    |
//! | `AUCTION_PACKAGE_ID` | (required)            | Published auction package id  |
//! | `INDEXER_DB`         | `./auctionindex.db`   | SQLite database path          |
//! | `POLL_INTERVAL_MS`   | `2000`                | Sleep between cycles          |
//! | `BATCH_LIMIT`        | `100`                 | Events per query page         |
//! | `LOG_JSON`           | unset                 | Set to `1` for JSON logs      |
//! | `RUST_LOG`           | `info`                | Tracing filter directives     |

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auctionindex_core::{
    AuctionStore, CursorStore, EventStreamFilter, IndexLoop, IndexerConfig, Reconciler,
};
use auctionindex_storage::SqliteStorage;
use auctionindex_sui::SuiEventSource;

/// Event names emitted by the on-chain auction module, one loop each.
const TRACKED_EVENTS: [(&str, &str); 3] = [
    ("auction-created", "AuctionCreated"),
    ("auction-bid", "BidPlaced"),
    ("auction-ended", "AuctionEnded"),
];

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "run" => cmd_run().await,
        "status" => cmd_status().await,
        "reset" => cmd_reset(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("auctionindex {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("auctionindex {}", env!("CARGO_PKG_VERSION"));
    println!("Materializes Velax auction events from a Sui fullnode into SQLite\n");
    println!("USAGE:");
    println!("    auctionindex <COMMAND>\n");
    println!("COMMANDS:");
    println!("    run                      Tail all auction event streams until Ctrl-C");
    println!("    status                   Show per-stream cursors and row count");
    println!("    reset --stream <KEY>     Delete one stream's cursor (re-scan from genesis)");
    println!("    version                  Print version");
    println!("    help                     Print this help");
}

// ─── Configuration ────────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{key} is not a valid number: '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_JSON").map(|v| v == "1").unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn cmd_run() -> Result<()> {
    init_tracing();

    let rpc_url = require_env("SUI_RPC_URL")?;
    let package_id = require_env("AUCTION_PACKAGE_ID")?;
    let db_path = env_or("INDEXER_DB", "./auctionindex.db");
    let poll_interval_ms: u64 = parse_env("POLL_INTERVAL_MS", 2000)?;
    let batch_limit: usize = parse_env("BATCH_LIMIT", 100)?;

    let storage = Arc::new(SqliteStorage::open(&db_path).await?);
    info!(db = %db_path, rpc = %rpc_url, package = %package_id, "indexer starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::with_capacity(TRACKED_EVENTS.len());
    for (loop_id, event_name) in TRACKED_EVENTS {
        let filter = EventStreamFilter::move_event(&package_id, event_name);
        let mut config = IndexerConfig::new(loop_id, filter);
        config.poll_interval_ms = poll_interval_ms;
        config.batch_limit = batch_limit;

        let source = SuiEventSource::new(rpc_url.clone())?;
        let reconciler = Reconciler::new(storage.clone() as Arc<dyn AuctionStore>);
        let mut index_loop = IndexLoop::new(
            config,
            source,
            reconciler,
            storage.clone() as Arc<dyn CursorStore>,
        );

        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(
            async move { (loop_id, index_loop.run(rx).await) },
        ));
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutdown signal received, draining loops");
    let _ = shutdown_tx.send(true);

    let mut failed = false;
    for task in tasks {
        match task.await {
            Ok((_, Ok(()))) => {}
            Ok((loop_id, Err(e))) => {
                error!(stream = loop_id, error = %e, "loop halted on fatal error");
                failed = true;
            }
            Err(e) => {
                error!(error = %e, "loop task panicked");
                failed = true;
            }
        }
    }

    if failed {
        bail!("one or more index loops halted abnormally");
    }
    info!("indexer stopped cleanly");
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let package_id = require_env("AUCTION_PACKAGE_ID")?;
    let db_path = env_or("INDEXER_DB", "./auctionindex.db");
    let storage = SqliteStorage::open(&db_path).await?;

    println!("database: {db_path}");
    println!("auctions: {}", storage.count().await?);
    println!();

    for (loop_id, event_name) in TRACKED_EVENTS {
        let filter = EventStreamFilter::move_event(&package_id, event_name);
        let key = filter.stream_key();
        println!("{loop_id:<16} {key}");
        match storage.load(key).await? {
            Some(cursor) => {
                println!("    at {} (saved {})", cursor.position, cursor.updated_at);
            }
            None => {
                println!("    no cursor (will scan from genesis)");
            }
        }
    }
    Ok(())
}

async fn cmd_reset(args: &[String]) -> Result<()> {
    let key = match args {
        [flag, key] if flag == "--stream" => key,
        _ => bail!("usage: auctionindex reset --stream <STREAM_KEY>"),
    };

    let db_path = env_or("INDEXER_DB", "./auctionindex.db");
    let storage = SqliteStorage::open(&db_path).await?;

    if storage.load(key).await?.is_none() {
        println!("no cursor stored for stream '{key}'");
        return Ok(());
    }

    storage.delete(key).await?;
    println!("cursor deleted for stream '{key}'; next run re-scans from genesis");
    Ok(())
}
