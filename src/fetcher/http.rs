//! HTTP transport to a sync source
//!
//! Issues `GET {base}/sync/GetStoredShards?from={s}&to={s}` with gzip
//! accepted on the wire. Decompression is handled here so the decoder always
//! sees plain JSON.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
use reqwest::Client;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

use crate::fetcher::{FetchError, FetchResult, ShardRecord, ShardSource};

/// Query path exposed by every sync source.
const STORED_SHARDS_PATH: &str = "/sync/GetStoredShards";

/// Fetches fingerprint records from one sync source over HTTP.
pub struct HttpShardSource {
    client: Arc<Client>,
    base_url: String,
}

impl HttpShardSource {
    /// Create a source fetcher for `base_url`.
    ///
    /// The client is shared across all sources so connection pools are
    /// reused between cycles.
    pub fn new(client: Arc<Client>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn query_url(&self) -> String {
        format!("{}{}", self.base_url, STORED_SHARDS_PATH)
    }
}

#[async_trait]
impl ShardSource for HttpShardSource {
    async fn fetch_window(&self, from: i64, to: i64) -> FetchResult<Vec<ShardRecord>> {
        let url = self.query_url();
        debug!(url = %url, from, to, "fetching stored shards");

        let response = self
            .client
            .get(&url)
            .query(&[("from", from), ("to", to)])
            .header(ACCEPT_ENCODING, "gzip")
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let gzipped = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("gzip"))
            .unwrap_or(false);

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let records = decode_body(&body, gzipped)?;
        debug!(url = %url, records = records.len(), "stored shards fetched");
        Ok(records)
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}

/// Decode a (possibly gzipped) response body into fingerprint records.
fn decode_body(body: &[u8], gzipped: bool) -> FetchResult<Vec<ShardRecord>> {
    if gzipped {
        let mut decoder = GzDecoder::new(body);
        let mut plain = Vec::new();
        decoder
            .read_to_end(&mut plain)
            .map_err(|e| FetchError::Decompress(e.to_string()))?;
        serde_json::from_slice(&plain).map_err(|e| FetchError::Decode(e.to_string()))
    } else {
        serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
