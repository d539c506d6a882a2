//! auctionindex-storage — durable backends for the auction indexer.
//!
//! One SQLite file holds both the materialized `auctions` table and the
//! per-stream `cursors` table, so a single storage handle serves every
//! loop. In-memory reference implementations live in `auctionindex-core`.

pub mod sqlite;

pub use sqlite::SqliteStorage;
