//! SQLite storage backend.
//!
//! Persists the materialized auction table and stream cursors to a single
//! SQLite file. Uses `sqlx` with WAL mode for concurrent read performance.
//!
//! The merge rules (fill-if-empty, max-merge, sticky close) are expressed
//! as one `INSERT ... ON CONFLICT DO UPDATE` statement, so concurrent
//! loops upserting the same `auction_id` serialize on the statement itself
//! and no read-modify-write window exists.
//!
//! # Usage
//! ```rust,no_run
//! use auctionindex_storage::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./auctions.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use auctionindex_core::cursor::{Cursor, CursorStore};
use auctionindex_core::error::IndexerError;
use auctionindex_core::record::{ApplyResult, AuctionPatch, AuctionRecord};
use auctionindex_core::store::AuctionStore;
use auctionindex_core::types::EventPosition;

/// SQLite-backed auction store + cursor store.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./auctions.db"`) or a full
    /// SQLite URL (`"sqlite:./auctions.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// All data is lost when the pool is dropped. Ideal for tests.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        // A second pooled connection would see its own distinct in-memory
        // database, so the pool is pinned to one connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS auctions (
                auction_id      TEXT    PRIMARY KEY,
                seller          TEXT    NOT NULL DEFAULT '',
                name            TEXT    NOT NULL DEFAULT '',
                description     TEXT    NOT NULL DEFAULT '',
                image_reference TEXT    NOT NULL DEFAULT '',
                end_time_ms     INTEGER NOT NULL DEFAULT 0,
                highest_bid     INTEGER NOT NULL DEFAULT 0,
                highest_bidder  TEXT    NOT NULL DEFAULT '',
                is_active       INTEGER NOT NULL DEFAULT 1,
                created_at      INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_auctions_seller ON auctions (seller);",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_auctions_bidder ON auctions (highest_bidder);",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cursors (
                stream_key TEXT    PRIMARY KEY,
                tx_digest  TEXT    NOT NULL,
                event_seq  INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> AuctionRecord {
        AuctionRecord {
            auction_id: row.get("auction_id"),
            seller: row.get("seller"),
            name: row.get("name"),
            description: row.get("description"),
            image_reference: row.get("image_reference"),
            end_time_ms: row.get("end_time_ms"),
            highest_bid: row.get::<i64, _>("highest_bid") as u64,
            highest_bidder: row.get("highest_bidder"),
            is_active: row.get::<i64, _>("is_active") != 0,
            created_at: row.get("created_at"),
        }
    }

    async fn records(&self, sql: &str, bind: Option<&str>) -> Result<Vec<AuctionRecord>, IndexerError> {
        let mut query = sqlx::query(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(rows.iter().map(Self::row_to_record).collect())
    }
}

// ─── AuctionStore impl ────────────────────────────────────────────────────────

/// The whole merge as one atomic upsert. Expression order does not matter:
/// every right-hand side reads the pre-update row.
const MERGE_SQL: &str = "INSERT INTO auctions
    (auction_id, seller, name, description, image_reference,
     end_time_ms, highest_bid, highest_bidder, is_active, created_at)
 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
 ON CONFLICT(auction_id) DO UPDATE SET
    seller          = CASE WHEN auctions.seller = ''          THEN excluded.seller          ELSE auctions.seller END,
    name            = CASE WHEN auctions.name = ''            THEN excluded.name            ELSE auctions.name END,
    description     = CASE WHEN auctions.description = ''     THEN excluded.description     ELSE auctions.description END,
    image_reference = CASE WHEN auctions.image_reference = '' THEN excluded.image_reference ELSE auctions.image_reference END,
    end_time_ms     = CASE WHEN auctions.end_time_ms = 0      THEN excluded.end_time_ms     ELSE auctions.end_time_ms END,
    highest_bidder  = CASE WHEN excluded.highest_bid > auctions.highest_bid
                           THEN excluded.highest_bidder ELSE auctions.highest_bidder END,
    highest_bid     = MAX(auctions.highest_bid, excluded.highest_bid),
    is_active       = MIN(auctions.is_active, excluded.is_active)";

#[async_trait]
impl AuctionStore for SqliteStorage {
    async fn merge(&self, patch: AuctionPatch) -> Result<ApplyResult, IndexerError> {
        let existed = self.get(&patch.auction_id).await?.is_some();

        let (bid_amount, bidder) = match &patch.bid {
            Some(bid) => (bid.amount as i64, bid.bidder.as_str()),
            None => (0, ""),
        };

        sqlx::query(MERGE_SQL)
            .bind(&patch.auction_id)
            .bind(patch.seller.as_deref().unwrap_or(""))
            .bind(patch.name.as_deref().unwrap_or(""))
            .bind(patch.description.as_deref().unwrap_or(""))
            .bind(patch.image_reference.as_deref().unwrap_or(""))
            .bind(patch.end_time_ms.unwrap_or(0))
            .bind(bid_amount)
            .bind(bidder)
            .bind(if patch.close { 0i64 } else { 1i64 })
            .bind(chrono::Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        debug!(auction_id = %patch.auction_id, existed, "merged patch");
        Ok(if existed {
            ApplyResult::Merged
        } else {
            ApplyResult::Inserted
        })
    }

    async fn get(&self, auction_id: &str) -> Result<Option<AuctionRecord>, IndexerError> {
        let row = sqlx::query("SELECT * FROM auctions WHERE auction_id = ?")
            .bind(auction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(row.as_ref().map(Self::row_to_record))
    }

    async fn by_seller(&self, seller: &str) -> Result<Vec<AuctionRecord>, IndexerError> {
        self.records(
            "SELECT * FROM auctions WHERE seller = ?
             ORDER BY created_at DESC, auction_id DESC",
            Some(seller),
        )
        .await
    }

    async fn by_highest_bidder(&self, bidder: &str) -> Result<Vec<AuctionRecord>, IndexerError> {
        self.records(
            "SELECT * FROM auctions WHERE highest_bidder = ?
             ORDER BY created_at DESC, auction_id DESC",
            Some(bidder),
        )
        .await
    }

    async fn all(&self) -> Result<Vec<AuctionRecord>, IndexerError> {
        self.records(
            "SELECT * FROM auctions ORDER BY created_at DESC, auction_id DESC",
            None,
        )
        .await
    }

    async fn count(&self) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM auctions")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }
}

// ─── CursorStore impl ─────────────────────────────────────────────────────────

#[async_trait]
impl CursorStore for SqliteStorage {
    async fn load(&self, stream_key: &str) -> Result<Option<Cursor>, IndexerError> {
        let row = sqlx::query(
            "SELECT tx_digest, event_seq, updated_at FROM cursors WHERE stream_key = ?",
        )
        .bind(stream_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(row.map(|r| Cursor {
            position: EventPosition::new(
                r.get::<String, _>("tx_digest"),
                r.get::<i64, _>("event_seq") as u64,
            ),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn save(&self, stream_key: &str, cursor: Cursor) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT OR REPLACE INTO cursors (stream_key, tx_digest, event_seq, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(stream_key)
        .bind(&cursor.position.tx_digest)
        .bind(cursor.position.event_seq as i64)
        .bind(cursor.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        debug!(
            stream = stream_key,
            cursor = %cursor.position,
            "cursor saved"
        );
        Ok(())
    }

    async fn delete(&self, stream_key: &str) -> Result<(), IndexerError> {
        sqlx::query("DELETE FROM cursors WHERE stream_key = ?")
            .bind(stream_key)
            .execute(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
