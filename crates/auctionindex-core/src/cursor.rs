//! Cursor store — persists each stream's resume position.
//!
//! A cursor records the position of the last event whose batch was fully
//! reconciled. On restart, a loop resumes from its saved cursor rather than
//! re-scanning from genesis. The save is awaited before the next batch is
//! requested, so a crash between applying a batch and saving its cursor can
//! only cause re-processing of an already-applied (idempotent) batch,
//! never a skip.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::types::EventPosition;

/// A persisted resume position for one event-type stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Position of the last fully reconciled event.
    pub position: EventPosition,
    /// Unix timestamp (seconds) of when this cursor was saved.
    pub updated_at: i64,
}

impl Cursor {
    pub fn new(position: EventPosition) -> Self {
        Self {
            position,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Trait for storing and loading stream cursors.
///
/// Each tracked event type owns a disjoint `stream_key`, so concurrent loops
/// never contend on the same entry.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Load the saved cursor for a stream (`None` on first run).
    async fn load(&self, stream_key: &str) -> Result<Option<Cursor>, IndexerError>;

    /// Durably save (upsert) a stream's cursor.
    async fn save(&self, stream_key: &str, cursor: Cursor) -> Result<(), IndexerError>;

    /// Delete a stream's cursor (operator reset to genesis).
    async fn delete(&self, stream_key: &str) -> Result<(), IndexerError>;
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory cursor store for tests and ephemeral indexers.
#[derive(Default)]
pub struct MemoryCursorStore {
    data: Mutex<HashMap<String, Cursor>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self, stream_key: &str) -> Result<Option<Cursor>, IndexerError> {
        Ok(self.data.lock().unwrap().get(stream_key).cloned())
    }

    async fn save(&self, stream_key: &str, cursor: Cursor) -> Result<(), IndexerError> {
        self.data.lock().unwrap().insert(stream_key.to_string(), cursor);
        Ok(())
    }

    async fn delete(&self, stream_key: &str) -> Result<(), IndexerError> {
        self.data.lock().unwrap().remove(stream_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryCursorStore::new();
        let key = "0xd1c3::auction::BidPlaced";

        // No cursor on first run
        assert!(store.load(key).await.unwrap().is_none());

        store
            .save(key, Cursor::new(EventPosition::new("9yGk", 2)))
            .await
            .unwrap();

        let cursor = store.load(key).await.unwrap().unwrap();
        assert_eq!(cursor.position, EventPosition::new("9yGk", 2));
    }

    #[tokio::test]
    async fn save_overwrites_previous() {
        let store = MemoryCursorStore::new();
        let key = "0xd1c3::auction::AuctionCreated";

        store
            .save(key, Cursor::new(EventPosition::new("old", 0)))
            .await
            .unwrap();
        store
            .save(key, Cursor::new(EventPosition::new("new", 5)))
            .await
            .unwrap();

        let cursor = store.load(key).await.unwrap().unwrap();
        assert_eq!(cursor.position.tx_digest, "new");
        assert_eq!(cursor.position.event_seq, 5);
    }

    #[tokio::test]
    async fn streams_are_isolated() {
        let store = MemoryCursorStore::new();
        store
            .save("stream-a", Cursor::new(EventPosition::new("a", 1)))
            .await
            .unwrap();

        assert!(store.load("stream-b").await.unwrap().is_none());

        store.delete("stream-a").await.unwrap();
        assert!(store.load("stream-a").await.unwrap().is_none());
    }
}
