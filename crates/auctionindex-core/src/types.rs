//! Shared types for the indexing pipeline.

use serde::{Deserialize, Serialize};

// ─── EventPosition ────────────────────────────────────────────────────────────

/// The ledger-native position of a single event within its stream.
///
/// Sui identifies every emitted event by the digest of the transaction that
/// produced it plus the event's sequence number inside that transaction.
/// Positions are totally ordered within one event-type stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventPosition {
    /// Digest of the emitting transaction (base58).
    pub tx_digest: String,
    /// Sequence number of the event within the transaction.
    pub event_seq: u64,
}

impl EventPosition {
    pub fn new(tx_digest: impl Into<String>, event_seq: u64) -> Self {
        Self {
            tx_digest: tx_digest.into(),
            event_seq,
        }
    }
}

impl std::fmt::Display for EventPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.tx_digest, self.event_seq)
    }
}

// ─── RawEvent ─────────────────────────────────────────────────────────────────

/// A raw, undecoded ledger event as returned by the event source.
///
/// This is the input to [`crate::decode::decode`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Position of this event within its stream (the per-event cursor token).
    pub position: EventPosition,
    /// Fully qualified Move event type, e.g. `0xd1c…::auction::BidPlaced`.
    pub event_type: String,
    /// Ledger timestamp of the emitting transaction (milliseconds).
    pub timestamp_ms: i64,
    /// Decoded Move event fields as JSON.
    pub payload: serde_json::Value,
}

impl RawEvent {
    /// Returns the unqualified event name (the part after the last `::`).
    pub fn event_name(&self) -> &str {
        self.event_type.rsplit("::").next().unwrap_or(&self.event_type)
    }
}

// ─── EventStreamFilter ────────────────────────────────────────────────────────

/// Identifies one tracked event-type stream.
///
/// Each filter owns a disjoint cursor key, so loops for different streams
/// never contend on the cursor store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStreamFilter {
    /// Fully qualified Move event type to query for.
    pub event_type: String,
}

impl EventStreamFilter {
    /// Create a filter for a single fully-qualified event type.
    pub fn event_type(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
        }
    }

    /// Create a filter for an event emitted by the auction module of the
    /// given package, e.g. `move_event(pkg, "AuctionCreated")`.
    pub fn move_event(package_id: &str, event_name: &str) -> Self {
        Self {
            event_type: format!("{package_id}::auction::{event_name}"),
        }
    }

    /// The cursor-store key for this stream.
    pub fn stream_key(&self) -> &str {
        &self.event_type
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_name_strips_module_path() {
        let raw = RawEvent {
            position: EventPosition::new("9yGk", 0),
            event_type: "0xd1c3::auction::BidPlaced".into(),
            timestamp_ms: 0,
            payload: serde_json::Value::Null,
        };
        assert_eq!(raw.event_name(), "BidPlaced");
    }

    #[test]
    fn event_name_without_path_is_identity() {
        let raw = RawEvent {
            position: EventPosition::new("9yGk", 0),
            event_type: "BidPlaced".into(),
            timestamp_ms: 0,
            payload: serde_json::Value::Null,
        };
        assert_eq!(raw.event_name(), "BidPlaced");
    }

    #[test]
    fn move_event_filter_key() {
        let f = EventStreamFilter::move_event("0xd1c3", "AuctionCreated");
        assert_eq!(f.stream_key(), "0xd1c3::auction::AuctionCreated");
    }

    #[test]
    fn position_display() {
        let pos = EventPosition::new("9yGkPq", 3);
        assert_eq!(pos.to_string(), "9yGkPq#3");
    }
}
