//! Reconciler — applies one decoded event to the materialized store.
//!
//! Each event variant reduces to an [`AuctionPatch`]; the store merges it
//! atomically. A `BidPlaced` (or `Ended`) for an auction the store has not
//! seen yet creates a minimal placeholder row immediately — the creation
//! and bid streams are cursored independently, so bids routinely race ahead
//! of their `Created` event, which backfills the metadata later.

use std::sync::Arc;

use tracing::debug;

use crate::decode::DomainEvent;
use crate::error::IndexerError;
use crate::record::{ApplyResult, AuctionPatch, Bid};
use crate::store::AuctionStore;

/// Applies decoded events to the store under idempotent merge rules.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn AuctionStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn AuctionStore>) -> Self {
        Self { store }
    }

    /// Apply a single event. Safe to call any number of times with the same
    /// event, in any order relative to other events for the same auction.
    pub async fn apply(&self, event: &DomainEvent) -> Result<ApplyResult, IndexerError> {
        let patch = Self::patch_for(event);
        let result = self.store.merge(patch).await?;
        debug!(
            auction_id = event.auction_id(),
            kind = event.kind(),
            inserted = matches!(result, ApplyResult::Inserted),
            "event reconciled"
        );
        Ok(result)
    }

    fn patch_for(event: &DomainEvent) -> AuctionPatch {
        match event {
            DomainEvent::Created {
                auction_id,
                seller,
                image_reference,
                end_time_ms,
            } => AuctionPatch {
                seller: Some(seller.clone()),
                image_reference: Some(image_reference.clone()),
                end_time_ms: Some(*end_time_ms),
                ..AuctionPatch::empty(auction_id.clone())
            },
            DomainEvent::BidPlaced {
                auction_id,
                bidder,
                amount,
            } => AuctionPatch {
                bid: Some(Bid {
                    bidder: bidder.clone(),
                    amount: *amount,
                }),
                ..AuctionPatch::empty(auction_id.clone())
            },
            DomainEvent::Ended { auction_id } => AuctionPatch {
                close: true,
                ..AuctionPatch::empty(auction_id.clone())
            },
        }
    }
}
