//! Pipeline wiring
//!
//! ```text
//! notifications -> normalize -> dispatch -> log check -> resolver tasks
//!     -> BatchAccumulator -> DurableWriteQueue -> PriceStore
//! ```
//!
//! Decoding runs inline on the notification loop and never waits on the
//! network. Price resolution runs on spawned tasks bounded by a semaphore.
//! When the notification channel closes, the stages shut down in order:
//! outstanding resolutions finish, the accumulator is flushed, and the write
//! queue drains (spooling whatever still fails) before [`SwapPipeline::run`]
//! returns.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;

use crate::batch::BatchAccumulator;
use crate::config::IndexerConfig;
use crate::core::{clock, CanonicalTransaction, DecodedSwap, LogParseError};
use crate::instr::SwapDispatcher;
use crate::logs::{failed_instructions, parse_logs};
use crate::normalizer::{normalize, RawNotification};
use crate::price::{AccountStateReader, PriceResolver};
use crate::store::{DurableWriteQueue, FallbackSpool, PriceStore, RetryPolicy};

/// Decode the swaps of one normalized transaction. Logs are parsed only when
/// a swap was found; swaps under a top-level instruction whose invocation
/// tree recorded an error are dropped.
pub fn decode_transaction(
    dispatcher: &SwapDispatcher,
    tx: &CanonicalTransaction,
) -> Result<Vec<DecodedSwap>, LogParseError> {
    let swaps = dispatcher.dispatch(tx);
    if swaps.is_empty() {
        return Ok(swaps);
    }
    let contexts = parse_logs(&tx.log_messages)?;
    let failed = failed_instructions(&contexts);
    if failed.is_empty() {
        return Ok(swaps);
    }
    debug!("{}: dropping swaps of failed instructions {:?}", tx.signature(), failed);
    Ok(swaps.into_iter().filter(|s| !failed.contains(&s.instruction_index)).collect())
}

/// Normalize and decode one notification. Malformed input, failed
/// transactions and unparsable logs yield no swaps.
pub fn process_notification(
    dispatcher: &SwapDispatcher,
    raw: RawNotification,
    captured_at_ms: i64,
) -> Vec<DecodedSwap> {
    let tx = match normalize(raw, captured_at_ms) {
        Ok(tx) => tx,
        Err(e) => {
            debug!("dropping transaction: {}", e);
            return Vec::new();
        }
    };
    if tx.failed {
        trace!("{} failed on chain, skipped", tx.signature());
        return Vec::new();
    }
    match decode_transaction(dispatcher, &tx) {
        Ok(swaps) => swaps,
        Err(e) => {
            debug!("dropping {}: log parse failed: {}", tx.signature(), e);
            Vec::new()
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_batch_size: usize,
    pub min_batch_interval: Duration,
    /// Swaps gathered into one resolution task.
    pub fetch_batch_size: usize,
    pub max_inflight_resolutions: usize,
    pub retry_policy: RetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            min_batch_interval: Duration::from_secs(1),
            fetch_batch_size: 50,
            max_inflight_resolutions: 8,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl From<&IndexerConfig> for PipelineSettings {
    fn from(config: &IndexerConfig) -> Self {
        Self {
            max_batch_size: config.max_batch_size,
            min_batch_interval: config.min_batch_interval(),
            fetch_batch_size: config.fetch_batch_size,
            max_inflight_resolutions: config.max_inflight_resolutions,
            retry_policy: config.retry_policy(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub notifications: u64,
    pub swaps: u64,
    pub prices: u64,
}

pub struct SwapPipeline<R: AccountStateReader, S: PriceStore> {
    dispatcher: SwapDispatcher,
    resolver: Arc<PriceResolver<R>>,
    store: Arc<S>,
    settings: PipelineSettings,
    spool: Option<FallbackSpool>,
}

impl<R, S> SwapPipeline<R, S>
where
    R: AccountStateReader + 'static,
    S: PriceStore + 'static,
{
    pub fn new(resolver: PriceResolver<R>, store: Arc<S>, settings: PipelineSettings) -> Self {
        Self {
            dispatcher: SwapDispatcher::all(),
            resolver: Arc::new(resolver),
            store,
            settings,
            spool: None,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: SwapDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_spool(mut self, spool: FallbackSpool) -> Self {
        self.spool = Some(spool);
        self
    }

    /// Run until `notifications` closes, then shut every stage down in order.
    pub async fn run(self, mut notifications: mpsc::Receiver<RawNotification>) -> PipelineStats {
        let Self { dispatcher, resolver, store, settings, spool } = self;

        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        let accumulator = Arc::new(BatchAccumulator::new(
            settings.max_batch_size,
            settings.min_batch_interval,
            batch_tx,
        ));
        let (timer_stop_tx, timer_stop_rx) = watch::channel(false);
        let timer = accumulator.spawn_timer(timer_stop_rx);

        let writer = tokio::spawn(DurableWriteQueue::new(store, settings.retry_policy).run(batch_rx, spool));

        let (swap_tx, swap_rx) = mpsc::unbounded_channel();
        let resolving = tokio::spawn(resolve_loop(
            resolver,
            swap_rx,
            Arc::clone(&accumulator),
            settings.fetch_batch_size.max(1),
            settings.max_inflight_resolutions.max(1),
        ));

        let mut stats = PipelineStats::default();
        while let Some(raw) = notifications.recv().await {
            stats.notifications += 1;
            let swaps = process_notification(&dispatcher, raw, clock::now_ms());
            if swaps.is_empty() {
                continue;
            }
            stats.swaps += swaps.len() as u64;
            if swap_tx.send(swaps).is_err() {
                error!("price resolver stopped, ending notification loop");
                break;
            }
        }
        info!("notification stream closed, shutting down pipeline");

        drop(swap_tx);
        match resolving.await {
            Ok(prices) => stats.prices = prices,
            Err(e) => error!("price resolver task failed: {}", e),
        }

        accumulator.flush();
        let _ = timer_stop_tx.send(true);
        if let Err(e) = timer.await {
            error!("batch timer task failed: {}", e);
        }
        // last sender of the batch channel; the queue drains once it is gone
        drop(accumulator);
        if let Err(e) = writer.await {
            error!("write queue task failed: {}", e);
        }

        info!(
            "pipeline stopped: {} notifications, {} swaps, {} prices",
            stats.notifications, stats.swaps, stats.prices
        );
        stats
    }
}

async fn resolve_loop<R: AccountStateReader + 'static>(
    resolver: Arc<PriceResolver<R>>,
    mut swaps: mpsc::UnboundedReceiver<Vec<DecodedSwap>>,
    accumulator: Arc<BatchAccumulator>,
    fetch_batch_size: usize,
    max_inflight: usize,
) -> u64 {
    let permits = Arc::new(Semaphore::new(max_inflight));
    let mut tasks: JoinSet<u64> = JoinSet::new();
    let mut prices = 0u64;

    while let Some(mut pending) = swaps.recv().await {
        while pending.len() < fetch_batch_size {
            match swaps.try_recv() {
                Ok(more) => pending.extend(more),
                Err(_) => break,
            }
        }
        while let Some(done) = tasks.try_join_next() {
            prices += done.unwrap_or_default();
        }

        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let resolver = Arc::clone(&resolver);
        let accumulator = Arc::clone(&accumulator);
        tasks.spawn(async move {
            let _permit = permit;
            let points = resolver.resolve_batch(&pending).await;
            let n = points.len() as u64;
            accumulator.append(points);
            n
        });
    }

    while let Some(done) = tasks.join_next().await {
        match done {
            Ok(n) => prices += n,
            Err(e) => error!("resolution task failed: {}", e),
        }
    }
    prices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CanonicalInstruction, Platform};
    use crate::instr::orca_whirlpool::discriminators;
    use crate::instr::program_ids::ORCA_WHIRLPOOL_PROGRAM_ID;
    use crate::price::tests::FixtureReader;
    use crate::price::{ResolverConfig, TokenAccountState};
    use crate::store::MemoryStore;
    use solana_sdk::pubkey::Pubkey;
    use std::collections::HashMap;
    use yellowstone_grpc_proto::prelude::{
        CompiledInstruction, Message, SubscribeUpdateTransaction, SubscribeUpdateTransactionInfo,
        Transaction, TransactionStatusMeta,
    };

    const ORCA: &str = "whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc";

    fn orca_logs(failed: bool) -> Vec<String> {
        let mut logs = vec![
            format!("Program {} invoke [1]", ORCA),
            "Program log: Instruction: Swap".to_string(),
        ];
        if failed {
            logs.push(format!("Program {} failed: custom program error: 0x1771", ORCA));
        } else {
            logs.push(format!("Program {} consumed 41000 of 200000 compute units", ORCA));
            logs.push(format!("Program {} success", ORCA));
        }
        logs
    }

    fn swap_data() -> Vec<u8> {
        let mut data = discriminators::SWAP.to_vec();
        data.extend_from_slice(&[0u8; 34]);
        data
    }

    /// Orca `swap` over eleven accounts; vaults sit at positions 4 and 6.
    fn orca_swap(vault_a: Pubkey, vault_b: Pubkey, logs: Vec<String>) -> RawNotification {
        let mut keys = vec![ORCA_WHIRLPOOL_PROGRAM_ID];
        keys.extend((0..11).map(|_| Pubkey::new_unique()));
        keys[5] = vault_a;
        keys[7] = vault_b;
        RawNotification::Grpc(SubscribeUpdateTransaction {
            slot: 300,
            transaction: Some(SubscribeUpdateTransactionInfo {
                signature: vec![1u8; 64],
                transaction: Some(Transaction {
                    signatures: vec![vec![1u8; 64]],
                    message: Some(Message {
                        account_keys: keys.iter().map(|k| k.to_bytes().to_vec()).collect(),
                        instructions: vec![CompiledInstruction {
                            program_id_index: 0,
                            accounts: (1..=11).collect(),
                            data: swap_data(),
                        }],
                        ..Default::default()
                    }),
                }),
                meta: Some(TransactionStatusMeta { log_messages: logs, ..Default::default() }),
                ..Default::default()
            }),
        })
    }

    struct Pool {
        wsol_vault: Pubkey,
        token_vault: Pubkey,
        token_mint: Pubkey,
        wsol: Pubkey,
    }

    fn pool() -> (Pool, HashMap<Pubkey, TokenAccountState>) {
        let pool = Pool {
            wsol_vault: Pubkey::new_unique(),
            token_vault: Pubkey::new_unique(),
            token_mint: Pubkey::new_unique(),
            wsol: Pubkey::new_unique(),
        };
        let mut states = HashMap::new();
        states.insert(pool.wsol_vault, TokenAccountState { mint: pool.wsol, amount: 2_000_000_000, decimals: 9, ..Default::default() });
        states.insert(pool.token_vault, TokenAccountState { mint: pool.token_mint, amount: 1_000_000, decimals: 6, ..Default::default() });
        (pool, states)
    }

    #[test]
    fn test_decode_keeps_successful_swap() {
        let (pool, _) = pool();
        let dispatcher = SwapDispatcher::all();
        let swaps = process_notification(&dispatcher, orca_swap(pool.wsol_vault, pool.token_vault, orca_logs(false)), 5);
        assert_eq!(swaps.len(), 1);
        assert_eq!(swaps[0].platform, Platform::OrcaWhirlpool);
        assert_eq!((swaps[0].vault_x, swaps[0].vault_y), (pool.wsol_vault, pool.token_vault));
        assert_eq!(swaps[0].metadata.timestamp_ms, 5);
        assert_eq!(swaps[0].metadata.slot, 300);
    }

    #[test]
    fn test_decode_drops_swap_with_failed_invocation() {
        let (pool, _) = pool();
        let swaps = process_notification(
            &SwapDispatcher::all(),
            orca_swap(pool.wsol_vault, pool.token_vault, orca_logs(true)),
            5,
        );
        assert!(swaps.is_empty());
    }

    #[test]
    fn test_unrecognized_logs_drop_transaction() {
        let (pool, _) = pool();
        let logs = vec!["something the runtime never prints".to_string()];
        let swaps = process_notification(&SwapDispatcher::all(), orca_swap(pool.wsol_vault, pool.token_vault, logs), 5);
        assert!(swaps.is_empty());
    }

    #[test]
    fn test_logs_not_parsed_without_swaps() {
        let tx = CanonicalTransaction {
            instructions: vec![CanonicalInstruction {
                program_id: Pubkey::new_unique(),
                accounts: vec![],
                data: vec![],
                stack_height: None,
            }],
            log_messages: vec!["garbage".to_string()],
            ..Default::default()
        };
        assert_eq!(decode_transaction(&SwapDispatcher::all(), &tx), Ok(Vec::new()));
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            max_batch_size: 2,
            min_batch_interval: Duration::from_secs(60),
            fetch_batch_size: 4,
            max_inflight_resolutions: 2,
            retry_policy: RetryPolicy { max_attempts: 2, backoff_base: Duration::from_millis(10) },
        }
    }

    fn resolver(states: HashMap<Pubkey, TokenAccountState>, wsol: Pubkey) -> PriceResolver<FixtureReader> {
        PriceResolver::new(
            Arc::new(FixtureReader::new(states)),
            ResolverConfig { reference_mint: wsol, fetch_batch_size: 4, timeout: Duration::from_secs(1) },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_persists_every_price_before_returning() {
        let (pool, states) = pool();
        let store = Arc::new(MemoryStore::new());
        let pipeline = SwapPipeline::new(resolver(states, pool.wsol), store.clone(), settings());

        let (tx, rx) = mpsc::channel(16);
        for _ in 0..3 {
            tx.send(orca_swap(pool.wsol_vault, pool.token_vault, orca_logs(false))).await.unwrap();
        }
        tx.send(orca_swap(pool.wsol_vault, pool.token_vault, orca_logs(true))).await.unwrap();
        drop(tx);

        let stats = pipeline.run(rx).await;
        assert_eq!(stats, PipelineStats { notifications: 4, swaps: 3, prices: 3 });

        let prices = store.prices();
        assert_eq!(prices.len(), 3);
        assert!(prices.iter().all(|p| p.mint == pool.token_mint.to_string() && (p.price - 2.0).abs() < 1e-9));
        assert_eq!(store.token_count(), 1);
        assert_eq!(store.token(&pool.token_mint.to_string()).map(|t| t.decimals), Some(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_spools_when_store_keeps_failing() {
        let (pool, states) = pool();
        let store = Arc::new(MemoryStore::new());
        store.fail_next(usize::MAX);
        let path = std::env::temp_dir().join(format!("pipeline-spool-{}.jsonl", Pubkey::new_unique()));
        let pipeline = SwapPipeline::new(resolver(states, pool.wsol), store.clone(), settings())
            .with_spool(FallbackSpool::new(&path));

        let (tx, rx) = mpsc::channel(4);
        tx.send(orca_swap(pool.wsol_vault, pool.token_vault, orca_logs(false))).await.unwrap();
        drop(tx);
        pipeline.run(rx).await;

        assert!(store.prices().is_empty());
        let spooled = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(spooled.lines().count(), 1);
        let _ = tokio::fs::remove_file(&path).await;
    }
}
