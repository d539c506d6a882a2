//! Event decoder — maps raw ledger events into domain events.
//!
//! Decoding is pure and side-effect-free. A malformed or unknown payload
//! yields a [`DecodeError`]; the index loop logs it and skips the record
//! without blocking cursor advancement, so a single bad event can never
//! wedge the pipeline.

use serde_json::Value;
use thiserror::Error;

use crate::types::RawEvent;

/// A decoded auction domain event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// A new auction was opened on-chain.
    Created {
        auction_id: String,
        seller: String,
        image_reference: String,
        end_time_ms: i64,
    },
    /// A bid was accepted by the auction contract.
    BidPlaced {
        auction_id: String,
        bidder: String,
        amount: u64,
    },
    /// The auction was settled or closed.
    Ended { auction_id: String },
}

impl DomainEvent {
    /// The auction this event belongs to.
    pub fn auction_id(&self) -> &str {
        match self {
            Self::Created { auction_id, .. }
            | Self::BidPlaced { auction_id, .. }
            | Self::Ended { auction_id } => auction_id,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::BidPlaced { .. } => "bid",
            Self::Ended { .. } => "ended",
        }
    }
}

/// Why a raw event could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Missing required field '{field}' in {event}")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },

    #[error("Field '{field}' in {event} is not a valid {expected}")]
    InvalidField {
        event: &'static str,
        field: &'static str,
        expected: &'static str,
    },
}

/// Decode a raw ledger event into a [`DomainEvent`].
pub fn decode(raw: &RawEvent) -> Result<DomainEvent, DecodeError> {
    match raw.event_name() {
        "AuctionCreated" => Ok(DomainEvent::Created {
            auction_id: require_str(&raw.payload, "AuctionCreated", "auction_id")?,
            seller: require_str(&raw.payload, "AuctionCreated", "seller")?,
            // The contract emits the image reference as `image_url`.
            image_reference: optional_str(&raw.payload, "image_url"),
            end_time_ms: require_u64(&raw.payload, "AuctionCreated", "end_time")? as i64,
        }),
        "BidPlaced" => Ok(DomainEvent::BidPlaced {
            auction_id: require_str(&raw.payload, "BidPlaced", "auction_id")?,
            bidder: require_str(&raw.payload, "BidPlaced", "bidder")?,
            amount: require_u64(&raw.payload, "BidPlaced", "amount")?,
        }),
        "AuctionEnded" => Ok(DomainEvent::Ended {
            auction_id: require_str(&raw.payload, "AuctionEnded", "auction_id")?,
        }),
        other => Err(DecodeError::UnknownEventType(other.to_string())),
    }
}

fn require_str(payload: &Value, event: &'static str, field: &'static str) -> Result<String, DecodeError> {
    match payload.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(_) => Err(DecodeError::InvalidField {
            event,
            field,
            expected: "string",
        }),
        None => Err(DecodeError::MissingField { event, field }),
    }
}

fn optional_str(payload: &Value, field: &str) -> String {
    payload
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Move u64 values arrive as JSON numbers or, more commonly on Sui, as
/// decimal strings. Accept both.
fn require_u64(payload: &Value, event: &'static str, field: &'static str) -> Result<u64, DecodeError> {
    let invalid = DecodeError::InvalidField {
        event,
        field,
        expected: "u64",
    };
    match payload.get(field) {
        Some(Value::Number(n)) => n.as_u64().ok_or(invalid),
        Some(Value::String(s)) => s.parse::<u64>().map_err(|_| invalid),
        Some(_) => Err(invalid),
        None => Err(DecodeError::MissingField { event, field }),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventPosition;
    use serde_json::json;

    fn raw(event_type: &str, payload: Value) -> RawEvent {
        RawEvent {
            position: EventPosition::new("9yGk", 0),
            event_type: event_type.into(),
            timestamp_ms: 1_700_000_000_000,
            payload,
        }
    }

    #[test]
    fn decode_created() {
        let ev = decode(&raw(
            "0xd1c3::auction::AuctionCreated",
            json!({
                "auction_id": "0xa1",
                "seller": "0xseller",
                "image_url": "ipfs://cid",
                "end_time": "1700000100000",
            }),
        ))
        .unwrap();

        assert_eq!(
            ev,
            DomainEvent::Created {
                auction_id: "0xa1".into(),
                seller: "0xseller".into(),
                image_reference: "ipfs://cid".into(),
                end_time_ms: 1_700_000_100_000,
            }
        );
    }

    #[test]
    fn decode_created_without_image() {
        let ev = decode(&raw(
            "0xd1c3::auction::AuctionCreated",
            json!({ "auction_id": "0xa1", "seller": "0xs", "end_time": 1000 }),
        ))
        .unwrap();
        match ev {
            DomainEvent::Created { image_reference, .. } => assert!(image_reference.is_empty()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decode_bid_with_string_amount() {
        let ev = decode(&raw(
            "0xd1c3::auction::BidPlaced",
            json!({ "auction_id": "0xa1", "bidder": "0xb1", "amount": "500" }),
        ))
        .unwrap();
        assert_eq!(
            ev,
            DomainEvent::BidPlaced {
                auction_id: "0xa1".into(),
                bidder: "0xb1".into(),
                amount: 500,
            }
        );
    }

    #[test]
    fn decode_bid_with_numeric_amount() {
        let ev = decode(&raw(
            "0xd1c3::auction::BidPlaced",
            json!({ "auction_id": "0xa1", "bidder": "0xb1", "amount": 300 }),
        ))
        .unwrap();
        assert_eq!(
            ev,
            DomainEvent::BidPlaced {
                auction_id: "0xa1".into(),
                bidder: "0xb1".into(),
                amount: 300,
            }
        );
    }

    #[test]
    fn decode_ended() {
        let ev = decode(&raw(
            "0xd1c3::auction::AuctionEnded",
            json!({ "auction_id": "0xa2" }),
        ))
        .unwrap();
        assert_eq!(ev, DomainEvent::Ended { auction_id: "0xa2".into() });
        assert_eq!(ev.auction_id(), "0xa2");
    }

    #[test]
    fn unknown_event_type_is_error() {
        let err = decode(&raw("0xd1c3::auction::NftMinted", json!({}))).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownEventType(name) if name == "NftMinted"));
    }

    #[test]
    fn missing_field_is_error() {
        let err = decode(&raw(
            "0xd1c3::auction::BidPlaced",
            json!({ "auction_id": "0xa1", "bidder": "0xb1" }),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingField { field: "amount", .. }
        ));
    }

    #[test]
    fn malformed_amount_is_error() {
        let err = decode(&raw(
            "0xd1c3::auction::BidPlaced",
            json!({ "auction_id": "0xa1", "bidder": "0xb1", "amount": "-5" }),
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidField { field: "amount", .. }
        ));
    }
}
