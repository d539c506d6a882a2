//! Materialized store — the queryable projection of auction state.
//!
//! The write path is a single `merge` operation; backends must apply it
//! atomically per `auction_id`, since the creation and bid loops may upsert
//! the same row concurrently. Rows are never deleted by the indexer.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::record::{ApplyResult, AuctionPatch, AuctionRecord};

/// Trait for the off-chain auction table.
#[async_trait]
pub trait AuctionStore: Send + Sync {
    /// Atomically upsert-merge a patch into the row for `patch.auction_id`.
    async fn merge(&self, patch: AuctionPatch) -> Result<ApplyResult, IndexerError>;

    /// Fetch one row by id.
    async fn get(&self, auction_id: &str) -> Result<Option<AuctionRecord>, IndexerError>;

    /// All auctions listed by a seller, newest first.
    async fn by_seller(&self, seller: &str) -> Result<Vec<AuctionRecord>, IndexerError>;

    /// All auctions currently led by a bidder, newest first.
    async fn by_highest_bidder(&self, bidder: &str) -> Result<Vec<AuctionRecord>, IndexerError>;

    /// Every row, newest first.
    async fn all(&self) -> Result<Vec<AuctionRecord>, IndexerError>;

    /// Total number of rows.
    async fn count(&self) -> Result<u64, IndexerError>;
}

// ─── In-memory store ──────────────────────────────────────────────────────────

use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory auction store for tests and ephemeral indexers.
///
/// The mutex serializes concurrent merges, matching the atomicity the
/// SQLite backend gets from its upsert statement.
#[derive(Default)]
pub struct MemoryAuctionStore {
    rows: Mutex<HashMap<String, AuctionRecord>>,
}

impl MemoryAuctionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_newest_first(mut rows: Vec<AuctionRecord>) -> Vec<AuctionRecord> {
        // auction_id as tiebreaker keeps the order deterministic
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.auction_id.cmp(&a.auction_id))
        });
        rows
    }
}

#[async_trait]
impl AuctionStore for MemoryAuctionStore {
    async fn merge(&self, patch: AuctionPatch) -> Result<ApplyResult, IndexerError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&patch.auction_id) {
            Some(row) => {
                row.merge(&patch);
                Ok(ApplyResult::Merged)
            }
            None => {
                let now = chrono::Utc::now().timestamp_millis();
                let mut row = AuctionRecord::new(patch.auction_id.clone(), now);
                row.merge(&patch);
                rows.insert(patch.auction_id.clone(), row);
                Ok(ApplyResult::Inserted)
            }
        }
    }

    async fn get(&self, auction_id: &str) -> Result<Option<AuctionRecord>, IndexerError> {
        Ok(self.rows.lock().unwrap().get(auction_id).cloned())
    }

    async fn by_seller(&self, seller: &str) -> Result<Vec<AuctionRecord>, IndexerError> {
        let rows = self.rows.lock().unwrap();
        let matching = rows.values().filter(|r| r.seller == seller).cloned().collect();
        Ok(Self::sorted_newest_first(matching))
    }

    async fn by_highest_bidder(&self, bidder: &str) -> Result<Vec<AuctionRecord>, IndexerError> {
        let rows = self.rows.lock().unwrap();
        let matching = rows
            .values()
            .filter(|r| r.highest_bidder == bidder)
            .cloned()
            .collect();
        Ok(Self::sorted_newest_first(matching))
    }

    async fn all(&self) -> Result<Vec<AuctionRecord>, IndexerError> {
        let rows = self.rows.lock().unwrap();
        Ok(Self::sorted_newest_first(rows.values().cloned().collect()))
    }

    async fn count(&self) -> Result<u64, IndexerError> {
        Ok(self.rows.lock().unwrap().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Bid;

    fn created(id: &str, seller: &str) -> AuctionPatch {
        AuctionPatch {
            seller: Some(seller.into()),
            end_time_ms: Some(1000),
            ..AuctionPatch::empty(id)
        }
    }

    fn bid(id: &str, bidder: &str, amount: u64) -> AuctionPatch {
        AuctionPatch {
            bid: Some(Bid {
                bidder: bidder.into(),
                amount,
            }),
            ..AuctionPatch::empty(id)
        }
    }

    #[tokio::test]
    async fn merge_inserts_then_updates() {
        let store = MemoryAuctionStore::new();
        assert_eq!(store.merge(created("a1", "s1")).await.unwrap(), ApplyResult::Inserted);
        assert_eq!(store.merge(bid("a1", "b1", 500)).await.unwrap(), ApplyResult::Merged);

        let row = store.get("a1").await.unwrap().unwrap();
        assert_eq!(row.seller, "s1");
        assert_eq!(row.highest_bid, 500);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bid_before_created_makes_placeholder() {
        let store = MemoryAuctionStore::new();
        assert_eq!(store.merge(bid("a2", "b3", 100)).await.unwrap(), ApplyResult::Inserted);

        let row = store.get("a2").await.unwrap().unwrap();
        assert_eq!(row.highest_bid, 100);
        assert_eq!(row.highest_bidder, "b3");
        assert!(row.seller.is_empty());
        assert!(row.is_active);

        // Created arrives late and backfills metadata
        store.merge(created("a2", "s2")).await.unwrap();
        let row = store.get("a2").await.unwrap().unwrap();
        assert_eq!(row.seller, "s2");
        assert_eq!(row.highest_bid, 100);
    }

    #[tokio::test]
    async fn queries_filter_and_order() {
        let store = MemoryAuctionStore::new();
        store.merge(created("a1", "s1")).await.unwrap();
        store.merge(created("a2", "s1")).await.unwrap();
        store.merge(created("a3", "s2")).await.unwrap();
        store.merge(bid("a1", "b1", 10)).await.unwrap();
        store.merge(bid("a2", "b2", 20)).await.unwrap();

        let s1 = store.by_seller("s1").await.unwrap();
        assert_eq!(s1.len(), 2);

        let b1 = store.by_highest_bidder("b1").await.unwrap();
        assert_eq!(b1.len(), 1);
        assert_eq!(b1[0].auction_id, "a1");

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 3);
        // Newest first; created_at ties broken by id descending
        assert!(all[0].created_at >= all[2].created_at);
    }
}
