use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Identifying attribute of a record, immutable post-creation
pub const KEY_FIELD: &str = "beaconid";
/// Creation timestamp, stamped server-side, immutable post-creation
pub const CREATED_AT: &str = "createdAt";
/// Last-write timestamp, refreshed server-side on every update
pub const UPDATED_AT: &str = "updatedAt";

/// A stored item: the key field plus arbitrary extra attributes.
///
/// The record shape is open-ended on purpose. A statically-known subset
/// (`beaconid`, `name`, the timestamps) is validated or stamped by the
/// handlers; everything else passes through untouched, including nested
/// structures. Coordinates and the like are stored as provided, never
/// interpreted.
pub type Record = Map<String, JsonValue>;

/// RFC 3339 timestamp with millisecond precision, e.g.
/// `2026-08-06T12:30:45.123Z`
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Generate a fresh key: `beacon-<millis>-<random base36 suffix>`.
///
/// The random 9-character suffix keeps two creates within the same
/// millisecond from colliding.
pub fn generate_beaconid() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("beacon-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Query parameters for the list endpoint
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ListQuery {
    pub limit: Option<i64>,
    #[serde(rename = "lastKey")]
    pub last_key: Option<String>,
}

/// Response type for successful create and update operations
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct MutationResponse {
    pub message: String,
    pub item: JsonValue,
}

/// Response type for successful GET operations
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct GetResponse {
    pub item: JsonValue,
}

/// Response type for the list endpoint.
///
/// `lastEvaluatedKey` is a URL-encoded JSON blob round-tripping the store's
/// native cursor, or the null sentinel once the enumeration is exhausted.
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct ListResponse {
    pub items: Vec<JsonValue>,
    pub count: i64,
    #[serde(rename = "scannedCount")]
    pub scanned_count: i64,
    #[serde(rename = "lastEvaluatedKey")]
    pub last_evaluated_key: Option<String>,
}

/// Response type for successful DELETE operations
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct DeleteResponse {
    pub message: String,
    pub beaconid: String,
}
