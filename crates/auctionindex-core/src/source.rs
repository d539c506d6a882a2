//! Event source — the pull contract against the ledger's event stream.

use async_trait::async_trait;

use crate::cursor::Cursor;
use crate::error::IndexerError;
use crate::types::{EventStreamFilter, RawEvent};

/// One fetched batch of raw events.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    /// Events in strict ledger order for the queried stream.
    pub events: Vec<RawEvent>,
    /// Cursor to resume from after this page is fully reconciled.
    /// `None` when the page is empty.
    pub next_cursor: Option<Cursor>,
    /// Whether the source has more events past this page.
    pub has_next_page: bool,
}

/// Trait for querying the ledger's event stream.
///
/// Implementations must return events strictly in ledger order for a given
/// filter, raise a retryable [`IndexerError::Source`] on transient failure,
/// and the distinct [`IndexerError::CursorInvalid`] when the source no
/// longer recognizes the cursor (pruned history), so the caller can decide
/// whether to resume from genesis or halt.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_since(
        &self,
        filter: &EventStreamFilter,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<EventPage, IndexerError>;
}
