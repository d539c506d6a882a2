//! Error types for the auction indexing pipeline.

use thiserror::Error;

/// Errors that can occur during indexing.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Transient event-source failure (network, rate limit, 5xx). Retried
    /// with backoff, never fatal.
    #[error("Source error: {0}")]
    Source(String),

    /// The event source no longer recognizes the saved cursor (history
    /// pruned or rotated). Fatal to the owning loop — an operator must
    /// explicitly choose a new starting position.
    #[error("Cursor no longer valid for stream '{stream}': {reason}")]
    CursorInvalid { stream: String, reason: String },

    /// Materialized-store or cursor-store write failure. Aborts the current
    /// batch without advancing the cursor; the batch is retried whole.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The loop was asked to stop before the batch could be committed.
    #[error("Indexer aborted: {reason}")]
    Aborted { reason: String },

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` if the error is transient and the batch should be
    /// retried from the same cursor after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Source(_) | Self::Storage(_))
    }

    /// Returns `true` if the owning loop must halt and surface the error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CursorInvalid { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(IndexerError::Source("timeout".into()).is_retryable());
        assert!(IndexerError::Storage("locked".into()).is_retryable());

        let invalid = IndexerError::CursorInvalid {
            stream: "0x1::auction::BidPlaced".into(),
            reason: "pruned".into(),
        };
        assert!(invalid.is_fatal());
        assert!(!invalid.is_retryable());
    }
}
