//! Sync source fetchers
//!
//! One bounded-window fetch against one sync source. Fetchers perform no
//! internal retry: any transport, decompression, or decode error surfaces
//! as-is and the controller retries at whole-window granularity.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub mod http;

pub use http::HttpShardSource;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Source unreachable or request failed below the HTTP layer
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status from the source
    #[error("HTTP status {0}")]
    Http(u16),

    /// Response body could not be gunzipped
    #[error("decompressing response: {0}")]
    Decompress(String),

    /// Response body could not be decoded as fingerprint records
    #[error("decoding response: {0}")]
    Decode(String),

    /// Fetch task aborted before producing a result
    #[error("fetch task failed: {0}")]
    Task(String),
}

/// Result type for fetcher operations
pub type FetchResult<T> = Result<T, FetchError>;

/// One shard-presence record as reported by a sync source: a shard observed
/// on a node within the query window. Immutable once fetched.
///
/// The wire format is the source's JSON with Go-style field names; the
/// fingerprint travels base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRecord {
    /// Record id assigned by the source
    #[serde(rename = "_id")]
    pub record_id: i64,

    /// Storage node the shard was observed on
    #[serde(rename = "nid")]
    pub node_id: u32,

    /// Opaque fingerprint of the shard's content
    #[serde(rename = "VHF", with = "base64_bytes")]
    pub fingerprint: Bytes,

    /// Block the shard belongs to
    #[serde(rename = "bid")]
    pub block_id: i64,
}

/// Seam between the controller and the transport to one sync source.
#[async_trait]
pub trait ShardSource: Send + Sync {
    /// Fetch all fingerprint records the source observed in `[from, to)`.
    async fn fetch_window(&self, from: i64, to: i64) -> FetchResult<Vec<ShardRecord>>;

    /// Human-readable identity of the source, for logging.
    fn endpoint(&self) -> &str;
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
