use chrono::{DateTime, Utc};
use crawler_primitives::RequestId;
use serde::{Deserialize, Serialize};

/// Whether a persisted event has been delivered to subscribers yet
/// (spec §3.1, §4.3 step 4 — publish is at-least-once and happens
/// asynchronously after the commit that made the event durable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Unpublished,
    Published,
}

/// A single event applied to an aggregate. `payload` is an opaque,
/// JSON-serializable blob — the core never interprets user event
/// payloads, only network/mempool ones (spec §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub aggregate_id: String,
    pub version: u64,
    pub request_id: RequestId,
    pub event_type: String,
    pub block_height: i64,
    pub payload: serde_json::Value,
    pub status: EventStatus,
    pub timestamp: DateTime<Utc>,
}

/// A serialized aggregate state tagged with the version and block
/// height it was taken at, used to shortcut replay (spec §3.1, §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub aggregate_id: String,
    pub version: u64,
    pub block_height: i64,
    pub state: Vec<u8>,
}
