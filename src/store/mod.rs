//! Persistence of priced batches
//!
//! A batch becomes two record sets: token metadata (decimals, supply and
//! authority state, first write wins) and price records (append only).
//! [`PriceStore`] implementations take both in one call; [`DurableWriteQueue`]
//! drives them with ordered retries.

pub mod jsonl;
pub mod memory;
pub mod queue;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::batch::Batch;
use crate::core::{Platform, PricePoint, StoreError};

pub use jsonl::{FallbackSpool, JsonlStore};
pub use memory::MemoryStore;
pub use queue::{DriveOutcome, DurableWriteQueue, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRecord {
    pub mint: String,
    pub decimals: u8,
    pub supply: u64,
    pub mint_burnt: bool,
    pub freeze_burnt: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub mint: String,
    pub price: f64,
    pub platform: Platform,
    pub signature: String,
    pub slot: u64,
    pub created_at_ms: i64,
    /// RFC 3339 rendering of `created_at_ms`.
    pub created_at: String,
}

impl From<&PricePoint> for PriceRecord {
    fn from(point: &PricePoint) -> Self {
        let created_at = chrono::DateTime::from_timestamp_millis(point.metadata.timestamp_ms)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        Self {
            mint: point.mint.to_string(),
            price: point.price,
            platform: point.platform,
            signature: point.metadata.signature.to_string(),
            slot: point.metadata.slot,
            created_at_ms: point.metadata.timestamp_ms,
            created_at,
        }
    }
}

/// Token records of a batch, one per mint, in first-seen order.
pub fn token_records(batch: &Batch) -> Vec<TokenRecord> {
    let mut seen = HashSet::new();
    batch
        .records
        .iter()
        .filter(|p| seen.insert(p.mint))
        .map(|p| TokenRecord {
            mint: p.mint.to_string(),
            decimals: p.decimals,
            supply: p.supply,
            mint_burnt: p.mint_burnt,
            freeze_burnt: p.freeze_burnt,
        })
        .collect()
}

pub fn price_records(batch: &Batch) -> Vec<PriceRecord> {
    batch.records.iter().map(PriceRecord::from).collect()
}

#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Persist one batch. Token records that already exist are left untouched.
    async fn upsert(&self, tokens: &[TokenRecord], prices: &[PriceRecord]) -> Result<(), StoreError>;
}
