//! auctionindex-sui — Sui fullnode event source.
//!
//! Implements the core [`EventSource`](auctionindex_core::EventSource)
//! contract over JSON-RPC `suix_queryEvents`, with the `MoveEventType`
//! filter and `(txDigest, eventSeq)` cursors the fullnode natively pages
//! by.

pub mod rpc;
pub mod source;

pub use rpc::{JsonRpcClient, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use source::SuiEventSource;
