//! auctionindex-core — foundation for the Velax auction event indexer.
//!
//! # Architecture
//!
//! ```text
//! IndexLoop (one per event stream)
//!     ├── EventSource   (fetch batch since cursor, ledger order)
//!     ├── decode        (RawEvent → DomainEvent, skip on malformed)
//!     ├── Reconciler    (idempotent, order-tolerant merge into the store)
//!     ├── CursorStore   (durable resume position, saved after each batch)
//!     └── BackoffPolicy (capped exponential retry on transient errors)
//! ```

pub mod backoff;
pub mod cursor;
pub mod decode;
pub mod error;
pub mod indexer;
pub mod reconcile;
pub mod record;
pub mod source;
pub mod store;
pub mod types;

pub use backoff::{BackoffConfig, BackoffPolicy};
pub use cursor::{Cursor, CursorStore, MemoryCursorStore};
pub use decode::{decode, DecodeError, DomainEvent};
pub use error::IndexerError;
pub use indexer::{IndexLoop, IndexerConfig, LoopState};
pub use reconcile::Reconciler;
pub use record::{ApplyResult, AuctionPatch, AuctionRecord, Bid};
pub use source::{EventPage, EventSource};
pub use store::{AuctionStore, MemoryAuctionStore};
pub use types::{EventPosition, EventStreamFilter, RawEvent};
