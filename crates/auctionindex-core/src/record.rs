//! The materialized auction row and its declarative merge rules.
//!
//! Every ledger event reduces to an [`AuctionPatch`] with three rule
//! classes, each safe under at-least-once delivery and reordering:
//!
//! - **fill-if-empty** — display metadata and `end_time_ms` are written only
//!   while still at their defaults, so duplicate `Created` deliveries never
//!   clobber values observed (or externally backfilled) in the meantime;
//! - **max-merge** — `highest_bid` only ever increases, and the bidder
//!   travels with the amount that raised it, so replaying an older bid can
//!   never erase a newer, higher one;
//! - **sticky close** — `is_active` goes false once and is never reset by a
//!   replayed `Created`.
//!
//! [`AuctionRecord::merge`] is the single implementation of these rules; the
//! SQLite backend expresses the same rules in its upsert statement.

use serde::{Deserialize, Serialize};

// ─── AuctionRecord ────────────────────────────────────────────────────────────

/// One row of the materialized store, keyed by `auction_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRecord {
    /// Stable identifier assigned by the ledger (Sui object id).
    pub auction_id: String,
    /// Seller address. Empty until a `Created` event is observed.
    pub seller: String,
    /// Display metadata; may arrive empty and be backfilled later.
    pub name: String,
    pub description: String,
    pub image_reference: String,
    /// Auction end, ledger clock, milliseconds. 0 until observed.
    pub end_time_ms: i64,
    /// Highest observed bid. Monotonically non-decreasing.
    pub highest_bid: u64,
    /// Address that placed `highest_bid`. Empty until a bid is observed.
    pub highest_bidder: String,
    /// Mirrors ledger-observed lifecycle; advisory to the application.
    pub is_active: bool,
    /// Unix milliseconds of first observation (store clock).
    pub created_at: i64,
}

impl AuctionRecord {
    /// A fresh row as first observed, before any patch is applied.
    pub fn new(auction_id: impl Into<String>, created_at: i64) -> Self {
        Self {
            auction_id: auction_id.into(),
            seller: String::new(),
            name: String::new(),
            description: String::new(),
            image_reference: String::new(),
            end_time_ms: 0,
            highest_bid: 0,
            highest_bidder: String::new(),
            is_active: true,
            created_at,
        }
    }

    /// Apply a patch in place. Returns `true` if anything changed.
    ///
    /// Idempotent and commutative: applying the same patch twice, or two
    /// patches in either order, converges to the same row.
    pub fn merge(&mut self, patch: &AuctionPatch) -> bool {
        debug_assert_eq!(self.auction_id, patch.auction_id);
        let mut changed = false;

        changed |= fill(&mut self.seller, &patch.seller);
        changed |= fill(&mut self.name, &patch.name);
        changed |= fill(&mut self.description, &patch.description);
        changed |= fill(&mut self.image_reference, &patch.image_reference);

        if self.end_time_ms == 0 {
            if let Some(end) = patch.end_time_ms {
                if end != 0 {
                    self.end_time_ms = end;
                    changed = true;
                }
            }
        }

        if let Some(bid) = &patch.bid {
            if bid.amount > self.highest_bid {
                self.highest_bid = bid.amount;
                self.highest_bidder = bid.bidder.clone();
                changed = true;
            }
        }

        if patch.close && self.is_active {
            self.is_active = false;
            changed = true;
        }

        changed
    }
}

fn fill(slot: &mut String, value: &Option<String>) -> bool {
    match value {
        Some(v) if slot.is_empty() && !v.is_empty() => {
            *slot = v.clone();
            true
        }
        _ => false,
    }
}

// ─── AuctionPatch ─────────────────────────────────────────────────────────────

/// A bid carried by a patch: amount and the address that placed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub bidder: String,
    pub amount: u64,
}

/// The declarative update derived from one domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionPatch {
    pub auction_id: String,
    /// fill-if-empty fields.
    pub seller: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_reference: Option<String>,
    pub end_time_ms: Option<i64>,
    /// max-merge: applied only when it raises `highest_bid`.
    pub bid: Option<Bid>,
    /// sticky: sets `is_active = false`.
    pub close: bool,
}

impl AuctionPatch {
    /// An empty patch for the given auction.
    pub fn empty(auction_id: impl Into<String>) -> Self {
        Self {
            auction_id: auction_id.into(),
            seller: None,
            name: None,
            description: None,
            image_reference: None,
            end_time_ms: None,
            bid: None,
            close: false,
        }
    }
}

/// Outcome of merging a patch into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// No row existed for the auction; one was created.
    Inserted,
    /// An existing row absorbed the patch (possibly a no-op replay).
    Merged,
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn created_patch(id: &str) -> AuctionPatch {
        AuctionPatch {
            seller: Some("0xseller".into()),
            image_reference: Some("ipfs://cid".into()),
            end_time_ms: Some(1000),
            ..AuctionPatch::empty(id)
        }
    }

    fn bid_patch(id: &str, bidder: &str, amount: u64) -> AuctionPatch {
        AuctionPatch {
            bid: Some(Bid {
                bidder: bidder.into(),
                amount,
            }),
            ..AuctionPatch::empty(id)
        }
    }

    fn close_patch(id: &str) -> AuctionPatch {
        AuctionPatch {
            close: true,
            ..AuctionPatch::empty(id)
        }
    }

    #[test]
    fn created_fills_defaults() {
        let mut row = AuctionRecord::new("a1", 0);
        assert!(row.merge(&created_patch("a1")));
        assert_eq!(row.seller, "0xseller");
        assert_eq!(row.end_time_ms, 1000);
        assert!(row.is_active);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut once = AuctionRecord::new("a1", 0);
        once.merge(&created_patch("a1"));
        once.merge(&bid_patch("a1", "b1", 500));

        let mut twice = once.clone();
        assert!(!twice.merge(&created_patch("a1")));
        assert!(!twice.merge(&bid_patch("a1", "b1", 500)));
        assert_eq!(once, twice);
    }

    #[test]
    fn duplicate_created_never_regresses_bid() {
        let mut row = AuctionRecord::new("a1", 0);
        row.merge(&created_patch("a1"));
        row.merge(&bid_patch("a1", "b1", 500));

        // Redelivered Created must not touch the bid
        row.merge(&created_patch("a1"));
        assert_eq!(row.highest_bid, 500);
        assert_eq!(row.highest_bidder, "b1");
    }

    #[test]
    fn duplicate_created_does_not_overwrite_backfilled_metadata() {
        let mut row = AuctionRecord::new("a1", 0);
        row.merge(&created_patch("a1"));
        // Metadata backfilled out of band
        row.name = "Velax Item".into();
        row.merge(&created_patch("a1"));
        assert_eq!(row.name, "Velax Item");
        assert_eq!(row.image_reference, "ipfs://cid");
    }

    #[test]
    fn bids_max_merge_in_any_order() {
        // Ledger order: b1=500 then b2=300; replayed out of order.
        let mut row = AuctionRecord::new("a1", 0);
        row.merge(&created_patch("a1"));
        row.merge(&bid_patch("a1", "b2", 300));
        row.merge(&bid_patch("a1", "b1", 500));
        assert_eq!(row.highest_bid, 500);
        assert_eq!(row.highest_bidder, "b1");

        // Same events, opposite arrival order
        let mut other = AuctionRecord::new("a1", 0);
        other.merge(&created_patch("a1"));
        other.merge(&bid_patch("a1", "b1", 500));
        other.merge(&bid_patch("a1", "b2", 300));
        assert_eq!(other.highest_bid, 500);
        assert_eq!(other.highest_bidder, "b1");
    }

    #[test]
    fn equal_amount_keeps_first_bidder() {
        let mut row = AuctionRecord::new("a1", 0);
        row.merge(&bid_patch("a1", "b1", 500));
        assert!(!row.merge(&bid_patch("a1", "b2", 500)));
        assert_eq!(row.highest_bidder, "b1");
    }

    #[test]
    fn close_is_sticky() {
        let mut row = AuctionRecord::new("a1", 0);
        row.merge(&created_patch("a1"));
        assert!(row.merge(&close_patch("a1")));
        assert!(!row.merge(&close_patch("a1"))); // idempotent

        // Replayed Created must not reactivate
        row.merge(&created_patch("a1"));
        assert!(!row.is_active);
    }

    #[test]
    fn bid_still_merges_after_close() {
        // A bid redelivered after the end event was applied first
        let mut row = AuctionRecord::new("a1", 0);
        row.merge(&close_patch("a1"));
        row.merge(&bid_patch("a1", "b1", 100));
        assert_eq!(row.highest_bid, 100);
        assert!(!row.is_active);
    }
}
