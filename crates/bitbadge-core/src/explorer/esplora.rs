use std::num::{NonZeroU32, NonZeroUsize};

use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use lru::LruCache;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ApiError, CoreError};
use crate::header::BlockHeaderFields;
use crate::http::{build_client, parse_base_url, read_body};
use crate::merkle::MerkleProof;
use crate::types::{BlockHeight, TxStatus, Utxo};

use super::BlockExplorer;

/// Maximum number of block headers cached in memory.
const HEADER_CACHE_CAP: usize = 256;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Esplora (Blockstream / mempool.space style) REST client.
///
/// Headers are immutable once a block hash is known, so they are kept in a
/// bounded LRU cache; nothing else is cached because confirmation status
/// and UTXO sets change between polls.
pub struct EsploraClient {
    client: reqwest::Client,
    base_url: String,
    limiter: Option<DirectRateLimiter>,
    header_cache: Mutex<LruCache<BlockHash, BlockHeaderFields>>,
}

impl EsploraClient {
    /// Create a client for `base_url` (e.g. `https://blockstream.info/testnet/api`).
    ///
    /// If `requests_per_second` is set, every outbound request waits for the
    /// rate limiter first; public explorers throttle aggressively.
    pub fn new(base_url: &str, requests_per_second: Option<u32>) -> Result<Self, CoreError> {
        let base_url = parse_base_url(base_url)?;
        let client = build_client().map_err(CoreError::Explorer)?;

        let limiter = match requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or_else(|| {
                    CoreError::InvalidConfig("requests_per_second must be at least 1".to_owned())
                })?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        Ok(Self {
            client,
            base_url,
            limiter,
            header_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(HEADER_CACHE_CAP).unwrap_or(NonZeroUsize::MIN),
            )),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    async fn get_text(&self, path: &str) -> Result<String, CoreError> {
        self.wait_for_rate_limit().await;
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "explorer request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CoreError::Explorer(ApiError::Transport(e)))?;
        let body = read_body(&url, response)
            .await
            .map_err(CoreError::Explorer)?;
        Ok(body.trim().to_owned())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CoreError> {
        let body = self.get_text(path).await?;
        serde_json::from_str(&body).map_err(|e| {
            CoreError::Explorer(ApiError::InvalidResponse(format!(
                "decode {path}: {e}; body={body}"
            )))
        })
    }
}

#[async_trait]
impl BlockExplorer for EsploraClient {
    async fn tx_status(&self, txid: &Txid) -> Result<TxStatus, CoreError> {
        self.get_json(&format!("/tx/{txid}/status")).await
    }

    async fn tx_hex(&self, txid: &Txid) -> Result<String, CoreError> {
        self.get_text(&format!("/tx/{txid}/hex")).await
    }

    async fn merkle_proof(&self, txid: &Txid) -> Result<MerkleProof, CoreError> {
        self.get_json(&format!("/tx/{txid}/merkle-proof")).await
    }

    async fn block_hash_at_height(&self, height: BlockHeight) -> Result<BlockHash, CoreError> {
        let body = self.get_text(&format!("/block-height/{height}")).await?;
        body.parse().map_err(|e| {
            CoreError::Explorer(ApiError::InvalidResponse(format!(
                "invalid block hash `{body}`: {e}"
            )))
        })
    }

    async fn block_header(&self, hash: &BlockHash) -> Result<BlockHeaderFields, CoreError> {
        if let Some(header) = self.header_cache.lock().await.get(hash).cloned() {
            return Ok(header);
        }

        let body = self.get_text(&format!("/block/{hash}/header")).await?;
        let header = BlockHeaderFields::from_hex(&body)?;
        self.header_cache.lock().await.put(*hash, header.clone());
        Ok(header)
    }

    async fn address_utxos(&self, address: &str) -> Result<Vec<Utxo>, CoreError> {
        self.get_json(&format!("/address/{address}/utxo")).await
    }
}
