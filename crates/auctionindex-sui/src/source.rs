//! `EventSource` implementation over `suix_queryEvents`.
//!
//! One query per tracked `MoveEventType`, ascending ledger order, paged by
//! the fullnode's native `(txDigest, eventSeq)` cursor.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use auctionindex_core::{
    Cursor, EventPage, EventPosition, EventSource, EventStreamFilter, IndexerError, RawEvent,
};

use crate::rpc::{JsonRpcClient, JsonRpcError};

/// Default per-request timeout against the fullnode.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─── Wire types ───────────────────────────────────────────────────────────────

/// Event id as returned by the fullnode. `eventSeq` arrives as a decimal
/// string, like every u64 in the Sui JSON-RPC surface.
#[derive(Debug, Clone, Deserialize)]
struct SuiEventId {
    #[serde(rename = "txDigest")]
    tx_digest: String,
    #[serde(rename = "eventSeq")]
    event_seq: String,
}

impl SuiEventId {
    fn into_position(self) -> Result<EventPosition, IndexerError> {
        let seq = self
            .event_seq
            .parse::<u64>()
            .map_err(|_| IndexerError::Source(format!("unparseable eventSeq '{}'", self.event_seq)))?;
        Ok(EventPosition::new(self.tx_digest, seq))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SuiEvent {
    id: SuiEventId,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(rename = "parsedJson", default)]
    parsed_json: Value,
    #[serde(rename = "timestampMs", default)]
    timestamp_ms: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct QueryEventsPage {
    data: Vec<SuiEvent>,
    #[serde(rename = "nextCursor")]
    next_cursor: Option<SuiEventId>,
    #[serde(rename = "hasNextPage", default)]
    has_next_page: bool,
}

// ─── SuiEventSource ───────────────────────────────────────────────────────────

/// Event source backed by a Sui fullnode.
pub struct SuiEventSource {
    client: JsonRpcClient,
}

impl SuiEventSource {
    /// Create a source against the given fullnode RPC URL.
    pub fn new(rpc_url: impl Into<String>) -> Result<Self, IndexerError> {
        Ok(Self {
            client: JsonRpcClient::new(rpc_url, DEFAULT_REQUEST_TIMEOUT)?,
        })
    }

    pub fn with_client(client: JsonRpcClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventSource for SuiEventSource {
    async fn fetch_since(
        &self,
        filter: &EventStreamFilter,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<EventPage, IndexerError> {
        let query = json!({ "MoveEventType": filter.event_type });
        let cursor_param = match cursor {
            Some(c) => json!({
                "txDigest": c.position.tx_digest,
                "eventSeq": c.position.event_seq.to_string(),
            }),
            None => Value::Null,
        };
        // params: query, cursor, limit, descending_order
        let params = vec![query, cursor_param, json!(limit), json!(false)];

        let result = self
            .client
            .call("suix_queryEvents", params)
            .await?
            .map_err(|e| classify_rpc_error(filter.stream_key(), e))?;

        let page = parse_page(result)?;
        debug!(
            stream = filter.stream_key(),
            url = self.client.url(),
            events = page.events.len(),
            has_next_page = page.has_next_page,
            "queried events"
        );
        Ok(page)
    }
}

/// Convert a `suix_queryEvents` result value into a core [`EventPage`].
fn parse_page(result: Value) -> Result<EventPage, IndexerError> {
    let page: QueryEventsPage = serde_json::from_value(result)
        .map_err(|e| IndexerError::Source(format!("malformed queryEvents page: {e}")))?;

    let mut events = Vec::with_capacity(page.data.len());
    for event in page.data {
        let timestamp_ms = event
            .timestamp_ms
            .as_deref()
            .and_then(|t| t.parse::<i64>().ok())
            .unwrap_or(0);
        events.push(RawEvent {
            position: event.id.into_position()?,
            event_type: event.event_type,
            timestamp_ms,
            payload: event.parsed_json,
        });
    }

    let next_cursor = match page.next_cursor {
        Some(id) => Some(Cursor::new(id.into_position()?)),
        None => None,
    };

    Ok(EventPage {
        events,
        next_cursor,
        has_next_page: page.has_next_page,
    })
}

/// Map a node-side JSON-RPC error to the indexer taxonomy.
///
/// A rejected cursor is the only non-retryable case: the request shape is
/// otherwise constant, so an "invalid params" (-32602) or any complaint
/// mentioning the cursor means our saved position is no longer usable
/// (history pruned or rotated).
fn classify_rpc_error(stream: &str, err: JsonRpcError) -> IndexerError {
    let mentions_cursor = err.message.to_ascii_lowercase().contains("cursor");
    if err.code == -32602 || mentions_cursor {
        IndexerError::CursorInvalid {
            stream: stream.to_string(),
            reason: err.to_string(),
        }
    } else {
        IndexerError::Source(err.to_string())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> Value {
        json!({
            "data": [
                {
                    "id": { "txDigest": "9yGkPqTx", "eventSeq": "0" },
                    "packageId": "0xd1c3",
                    "transactionModule": "auction",
                    "sender": "0xseller",
                    "type": "0xd1c3::auction::AuctionCreated",
                    "parsedJson": {
                        "auction_id": "0xa1",
                        "seller": "0xseller",
                        "image_url": "ipfs://cid",
                        "end_time": "1700000100000"
                    },
                    "timestampMs": "1700000000000"
                },
                {
                    "id": { "txDigest": "9yGkPqTx", "eventSeq": "1" },
                    "type": "0xd1c3::auction::BidPlaced",
                    "parsedJson": { "auction_id": "0xa1", "bidder": "0xb1", "amount": "500" },
                    "timestampMs": "1700000000000"
                }
            ],
            "nextCursor": { "txDigest": "9yGkPqTx", "eventSeq": "1" },
            "hasNextPage": false
        })
    }

    #[test]
    fn parse_page_maps_events_and_cursor() {
        let page = parse_page(sample_page()).unwrap();
        assert_eq!(page.events.len(), 2);
        assert!(!page.has_next_page);

        let first = &page.events[0];
        assert_eq!(first.position, EventPosition::new("9yGkPqTx", 0));
        assert_eq!(first.event_name(), "AuctionCreated");
        assert_eq!(first.timestamp_ms, 1_700_000_000_000);
        assert_eq!(first.payload["seller"], "0xseller");

        let cursor = page.next_cursor.unwrap();
        assert_eq!(cursor.position, EventPosition::new("9yGkPqTx", 1));
    }

    #[test]
    fn parse_empty_page() {
        let page = parse_page(json!({ "data": [], "nextCursor": null, "hasNextPage": false }))
            .unwrap();
        assert!(page.events.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn parse_page_rejects_garbage() {
        let err = parse_page(json!({ "unexpected": true })).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn invalid_params_classified_as_cursor_invalid() {
        let err = classify_rpc_error(
            "0xd1c3::auction::BidPlaced",
            JsonRpcError {
                code: -32602,
                message: "Invalid params".into(),
                data: None,
            },
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn cursor_message_classified_as_cursor_invalid() {
        let err = classify_rpc_error(
            "s",
            JsonRpcError {
                code: -32000,
                message: "Could not find the referenced cursor".into(),
                data: None,
            },
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn other_rpc_errors_are_retryable() {
        let err = classify_rpc_error(
            "s",
            JsonRpcError {
                code: -32000,
                message: "Node is overloaded".into(),
                data: None,
            },
        );
        assert!(err.is_retryable());
    }
}
