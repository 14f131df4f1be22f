//! Price resolution
//!
//! A swap names two vaults. Reading both token accounts gives their mints and
//! balances; when exactly one side holds the reference mint, the other mint is
//! priced as `reference_ui_amount / other_ui_amount`.
//!
//! Reads go through [`AccountStateReader`] so the resolver can run against
//! RPC ([`RpcAccountReader`]) or a fixture in tests.

pub mod rpc;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};
use solana_sdk::pubkey::Pubkey;

use crate::core::{DecodedSwap, PricePoint, ResolveError};

pub use rpc::RpcAccountReader;

/// Token account state needed for pricing, joined with its mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenAccountState {
    pub mint: Pubkey,
    pub amount: u64,
    pub decimals: u8,
    pub supply: u64,
    pub mint_burnt: bool,
    pub freeze_burnt: bool,
}

impl TokenAccountState {
    #[inline]
    pub fn ui_amount(&self) -> f64 {
        self.amount as f64 / 10f64.powi(self.decimals as i32)
    }
}

/// Batch read of token account states. The result has one entry per
/// requested address; `None` marks a missing or non-token account.
#[async_trait]
pub trait AccountStateReader: Send + Sync {
    async fn read_token_accounts(
        &self,
        accounts: &[Pubkey],
    ) -> Result<Vec<Option<TokenAccountState>>, ResolveError>;
}

/// The non-reference side and its price, or `None` when the pair cannot be priced.
pub fn compute_price<'a>(
    x: &'a TokenAccountState,
    y: &'a TokenAccountState,
    reference_mint: &Pubkey,
) -> Option<(&'a TokenAccountState, f64)> {
    let (reference, other) = match (x.mint == *reference_mint, y.mint == *reference_mint) {
        (true, false) => (x, y),
        (false, true) => (y, x),
        _ => return None,
    };
    if reference.amount == 0 || other.amount == 0 {
        return None;
    }
    let price = reference.ui_amount() / other.ui_amount();
    price.is_finite().then_some((other, price))
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub reference_mint: Pubkey,
    /// Swaps per account read.
    pub fetch_batch_size: usize,
    pub timeout: Duration,
}

pub struct PriceResolver<R: AccountStateReader> {
    reader: Arc<R>,
    config: ResolverConfig,
}

impl<R: AccountStateReader> PriceResolver<R> {
    pub fn new(reader: Arc<R>, config: ResolverConfig) -> Self {
        Self { reader, config }
    }

    pub fn reference_mint(&self) -> &Pubkey {
        &self.config.reference_mint
    }

    pub async fn resolve(&self, swap: &DecodedSwap) -> Result<Option<PricePoint>, ResolveError> {
        let points = self.resolve_chunk(std::slice::from_ref(swap)).await?;
        Ok(points.into_iter().next())
    }

    /// Resolve a set of swaps in chunks of `fetch_batch_size`, reading all
    /// chunks concurrently. A failed or timed-out chunk only drops its own swaps.
    pub async fn resolve_batch(&self, swaps: &[DecodedSwap]) -> Vec<PricePoint> {
        if swaps.is_empty() {
            return Vec::new();
        }
        let chunk_size = self.config.fetch_batch_size.max(1);
        let results = join_all(swaps.chunks(chunk_size).map(|chunk| self.resolve_chunk(chunk))).await;

        let mut points = Vec::with_capacity(swaps.len());
        for (chunk, result) in swaps.chunks(chunk_size).zip(results) {
            match result {
                Ok(p) => points.extend(p),
                Err(e) => warn!("dropping {} swaps, price resolution failed: {}", chunk.len(), e),
            }
        }
        points
    }

    async fn resolve_chunk(&self, swaps: &[DecodedSwap]) -> Result<Vec<PricePoint>, ResolveError> {
        let accounts: Vec<Pubkey> = swaps.iter().flat_map(|s| [s.vault_x, s.vault_y]).collect();

        let timeout_ms = self.config.timeout.as_millis() as u64;
        let states = tokio::time::timeout(self.config.timeout, self.reader.read_token_accounts(&accounts))
            .await
            .map_err(|_| ResolveError::Timeout(timeout_ms))??;

        if states.len() != accounts.len() {
            return Err(ResolveError::Rpc(format!(
                "expected {} account states, got {}",
                accounts.len(),
                states.len()
            )));
        }

        let mut points = Vec::new();
        for (swap, pair) in swaps.iter().zip(states.chunks(2)) {
            let (Some(x), Some(y)) = (pair[0], pair[1]) else {
                debug!("vault state missing for swap {}", swap.metadata.signature);
                continue;
            };
            match compute_price(&x, &y, &self.config.reference_mint) {
                Some((token, price)) => points.push(PricePoint {
                    metadata: swap.metadata,
                    platform: swap.platform,
                    mint: token.mint,
                    decimals: token.decimals,
                    supply: token.supply,
                    mint_burnt: token.mint_burnt,
                    freeze_burnt: token.freeze_burnt,
                    price,
                }),
                None => debug!(
                    "swap {} not priced against reference ({} / {})",
                    swap.metadata.signature, x.mint, y.mint
                ),
            }
        }
        Ok(points)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::{Platform, SwapMetadata};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reader backed by a fixed account map.
    pub(crate) struct FixtureReader {
        pub states: HashMap<Pubkey, TokenAccountState>,
        pub calls: AtomicUsize,
        pub fail: bool,
        pub delay: Option<Duration>,
    }

    impl FixtureReader {
        pub fn new(states: HashMap<Pubkey, TokenAccountState>) -> Self {
            Self { states, calls: AtomicUsize::new(0), fail: false, delay: None }
        }
    }

    #[async_trait]
    impl AccountStateReader for FixtureReader {
        async fn read_token_accounts(
            &self,
            accounts: &[Pubkey],
        ) -> Result<Vec<Option<TokenAccountState>>, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(ResolveError::Rpc("unavailable".to_string()));
            }
            Ok(accounts.iter().map(|a| self.states.get(a).copied()).collect())
        }
    }

    fn swap(vault_x: Pubkey, vault_y: Pubkey) -> DecodedSwap {
        DecodedSwap {
            metadata: SwapMetadata { timestamp_ms: 99, ..Default::default() },
            platform: Platform::OrcaWhirlpool,
            vault_x,
            vault_y,
            instruction_index: 0,
            inner_instruction_index: None,
        }
    }

    fn config(reference_mint: Pubkey) -> ResolverConfig {
        ResolverConfig { reference_mint, fetch_batch_size: 2, timeout: Duration::from_secs(1) }
    }

    #[test]
    fn test_compute_price_either_orientation() {
        let wsol = Pubkey::new_unique();
        let token = Pubkey::new_unique();
        let reference = TokenAccountState { mint: wsol, amount: 100_000_000_000, decimals: 9, ..Default::default() };
        let other = TokenAccountState { mint: token, amount: 20_000_000, decimals: 6, ..Default::default() };

        let (priced, price) = compute_price(&reference, &other, &wsol).unwrap();
        assert_eq!(priced.mint, token);
        assert_eq!(priced.decimals, 6);
        assert!((price - 5.0).abs() < 1e-12);

        let (_, flipped) = compute_price(&other, &reference, &wsol).unwrap();
        assert!((flipped - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_compute_price_requires_exactly_one_reference_side() {
        let wsol = Pubkey::new_unique();
        let a = TokenAccountState { mint: Pubkey::new_unique(), amount: 10, decimals: 0, ..Default::default() };
        let b = TokenAccountState { mint: Pubkey::new_unique(), amount: 10, decimals: 0, ..Default::default() };
        assert!(compute_price(&a, &b, &wsol).is_none());

        let r = TokenAccountState { mint: wsol, amount: 10, decimals: 0, ..Default::default() };
        assert!(compute_price(&r, &r, &wsol).is_none());
    }

    #[test]
    fn test_compute_price_zero_balance() {
        let wsol = Pubkey::new_unique();
        let r = TokenAccountState { mint: wsol, amount: 10, decimals: 9, ..Default::default() };
        let empty = TokenAccountState { mint: Pubkey::new_unique(), amount: 0, decimals: 6, ..Default::default() };
        assert!(compute_price(&r, &empty, &wsol).is_none());
        assert!(compute_price(&empty, &r, &wsol).is_none());
    }

    #[tokio::test]
    async fn test_resolve_batch_prices_only_reference_pairs() {
        let wsol = Pubkey::new_unique();
        let token = Pubkey::new_unique();
        let (v1, v2, v3, v4) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());

        let mut states = HashMap::new();
        states.insert(v1, TokenAccountState { mint: wsol, amount: 2_000_000_000, decimals: 9, ..Default::default() });
        states.insert(v2, TokenAccountState { mint: token, amount: 1_000_000, decimals: 6, ..Default::default() });
        states.insert(v3, TokenAccountState { mint: Pubkey::new_unique(), amount: 5, decimals: 0, ..Default::default() });
        states.insert(v4, TokenAccountState { mint: Pubkey::new_unique(), amount: 5, decimals: 0, ..Default::default() });

        let reader = Arc::new(FixtureReader::new(states));
        let resolver = PriceResolver::new(reader.clone(), config(wsol));

        let swaps = vec![swap(v1, v2), swap(v3, v4), swap(v2, v1)];
        let points = resolver.resolve_batch(&swaps).await;

        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.mint == token && (p.price - 2.0).abs() < 1e-12));
        assert_eq!(points[0].metadata.timestamp_ms, 99);
        // 3 swaps in chunks of 2
        assert_eq!(reader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let wsol = Pubkey::new_unique();
        let (v1, v2) = (Pubkey::new_unique(), Pubkey::new_unique());
        let mut states = HashMap::new();
        states.insert(v1, TokenAccountState { mint: wsol, amount: 3_000_000_000, decimals: 9, ..Default::default() });
        states.insert(v2, TokenAccountState { mint: Pubkey::new_unique(), amount: 1_000, decimals: 3, ..Default::default() });

        let resolver = PriceResolver::new(Arc::new(FixtureReader::new(states)), config(wsol));
        let s = swap(v1, v2);
        let first = resolver.resolve(&s).await.unwrap();
        let second = resolver.resolve(&s).await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[tokio::test]
    async fn test_point_carries_mint_state() {
        let wsol = Pubkey::new_unique();
        let token = Pubkey::new_unique();
        let (v1, v2) = (Pubkey::new_unique(), Pubkey::new_unique());
        let mut states = HashMap::new();
        states.insert(v1, TokenAccountState { mint: wsol, amount: 1_000_000_000, decimals: 9, ..Default::default() });
        states.insert(
            v2,
            TokenAccountState {
                mint: token,
                amount: 4_000_000,
                decimals: 6,
                supply: 1_000_000_000_000_000,
                mint_burnt: true,
                freeze_burnt: false,
            },
        );

        let resolver = PriceResolver::new(Arc::new(FixtureReader::new(states)), config(wsol));
        let point = resolver.resolve(&swap(v1, v2)).await.unwrap().unwrap();
        assert_eq!(point.mint, token);
        assert_eq!(point.supply, 1_000_000_000_000_000);
        assert!(point.mint_burnt);
        assert!(!point.freeze_burnt);
    }

    #[tokio::test]
    async fn test_missing_account_yields_no_price() {
        let wsol = Pubkey::new_unique();
        let resolver = PriceResolver::new(Arc::new(FixtureReader::new(HashMap::new())), config(wsol));
        let s = swap(Pubkey::new_unique(), Pubkey::new_unique());
        assert_eq!(resolver.resolve(&s).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reader_failure_drops_batch_without_error() {
        let mut reader = FixtureReader::new(HashMap::new());
        reader.fail = true;
        let resolver = PriceResolver::new(Arc::new(reader), config(Pubkey::new_unique()));
        let swaps = vec![swap(Pubkey::new_unique(), Pubkey::new_unique())];
        assert!(resolver.resolve_batch(&swaps).await.is_empty());
        assert!(resolver.resolve(&swaps[0]).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_reader_times_out() {
        let mut reader = FixtureReader::new(HashMap::new());
        reader.delay = Some(Duration::from_secs(5));
        let resolver = PriceResolver::new(Arc::new(reader), config(Pubkey::new_unique()));
        let s = swap(Pubkey::new_unique(), Pubkey::new_unique());
        assert!(matches!(resolver.resolve(&s).await, Err(ResolveError::Timeout(1000))));
    }
}
