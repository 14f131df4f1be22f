//! In-memory store for tests and dry runs

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{PriceRecord, PriceStore, TokenRecord};
use crate::core::StoreError;

#[derive(Default)]
pub struct MemoryStore {
    tokens: Mutex<HashMap<String, TokenRecord>>,
    prices: Mutex<Vec<PriceRecord>>,
    /// Upserts to reject before accepting again.
    failures_left: AtomicUsize,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` upserts.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn token(&self, mint: &str) -> Option<TokenRecord> {
        self.tokens.lock().get(mint).cloned()
    }

    pub fn token_count(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn prices(&self) -> Vec<PriceRecord> {
        self.prices.lock().clone()
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn upsert(&self, tokens: &[TokenRecord], prices: &[PriceRecord]) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rejected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(StoreError::Rejected("injected failure".to_string()));
        }

        let mut stored = self.tokens.lock();
        for token in tokens {
            stored.entry(token.mint.clone()).or_insert_with(|| token.clone());
        }
        drop(stored);
        self.prices.lock().extend_from_slice(prices);
        Ok(())
    }
}
