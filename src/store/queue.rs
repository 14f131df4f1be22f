//! Durable write queue
//!
//! Batches are written strictly one at a time in FIFO order. A failed write is
//! retried in place with exponential backoff; after `max_attempts` the item
//! moves to the tail with its attempt counter reset, so a persistently failing
//! batch cannot block the ones behind it and is still retried later. On
//! shutdown the remaining items get one more full round of attempts and
//! whatever still fails is spooled to disk.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;

use super::{price_records, token_records, FallbackSpool, PriceStore};
use crate::batch::Batch;
use crate::core::clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Wait after failed attempt number `attempt` (1-based): base, 2*base, 4*base, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, backoff_base: Duration::from_secs(1) }
    }
}

#[derive(Debug)]
struct QueueItem {
    id: u64,
    batch: Batch,
    attempts: u32,
    requeues: u32,
    not_before: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    Idle,
    Persisted { id: u64 },
    RetryScheduled { id: u64, attempt: u32, delay: Duration },
    Requeued { id: u64, requeues: u32 },
}

pub struct DurableWriteQueue<S: PriceStore> {
    store: Arc<S>,
    policy: RetryPolicy,
    items: VecDeque<QueueItem>,
    next_id: u64,
}

impl<S: PriceStore> DurableWriteQueue<S> {
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self { store, policy, items: VecDeque::new(), next_id: 0 }
    }

    pub fn enqueue(&mut self, batch: Batch) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        debug!("enqueued batch {} ({} records, {} pending)", id, batch.len(), self.items.len() + 1);
        self.items.push_back(QueueItem { id, batch, attempts: 0, requeues: 0, not_before: Instant::now() });
        id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids in queue order.
    pub fn pending_ids(&self) -> Vec<u64> {
        self.items.iter().map(|i| i.id).collect()
    }

    /// One write attempt for the head item, waiting out its backoff first.
    pub async fn drive_once(&mut self) -> DriveOutcome {
        let Some(head) = self.items.front_mut() else {
            return DriveOutcome::Idle;
        };
        tokio::time::sleep_until(head.not_before).await;

        head.attempts += 1;
        let tokens = token_records(&head.batch);
        let prices = price_records(&head.batch);
        let result = self.store.upsert(&tokens, &prices).await;

        match result {
            Ok(()) => {
                let id = head.id;
                let latency_ms = head.batch.oldest_timestamp_ms().map(clock::elapsed_ms_since);
                self.items.pop_front();
                info!(
                    "persisted batch {}: {} tokens, {} prices, latency {:.3}s, {} pending",
                    id,
                    tokens.len(),
                    prices.len(),
                    latency_ms.unwrap_or_default() as f64 / 1000.0,
                    self.items.len()
                );
                DriveOutcome::Persisted { id }
            }
            Err(e) if head.attempts < self.policy.max_attempts => {
                let delay = self.policy.backoff(head.attempts);
                head.not_before = Instant::now() + delay;
                warn!(
                    "batch {} write attempt {}/{} failed: {}; retrying in {:?}",
                    head.id, head.attempts, self.policy.max_attempts, e, delay
                );
                DriveOutcome::RetryScheduled { id: head.id, attempt: head.attempts, delay }
            }
            Err(e) => {
                error!(
                    "batch {} failed {} attempts: {}; moving to tail",
                    head.id, head.attempts, e
                );
                let Some(mut item) = self.items.pop_front() else {
                    return DriveOutcome::Idle;
                };
                item.attempts = 0;
                item.requeues += 1;
                item.not_before = Instant::now() + self.policy.backoff(self.policy.max_attempts);
                let outcome = DriveOutcome::Requeued { id: item.id, requeues: item.requeues };
                self.items.push_back(item);
                outcome
            }
        }
    }

    /// Consume batches from `rx` until it closes, then [`drain`](Self::drain).
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Batch>, spool: Option<FallbackSpool>) {
        loop {
            if self.items.is_empty() {
                match rx.recv().await {
                    Some(batch) => {
                        self.enqueue(batch);
                    }
                    None => break,
                }
            }
            let mut closed = false;
            loop {
                match rx.try_recv() {
                    Ok(batch) => {
                        self.enqueue(batch);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }
            if closed {
                break;
            }
            self.drive_once().await;
        }
        self.drain(spool.as_ref()).await;
    }

    /// Final round: each remaining item gets up to `max_attempts` writes;
    /// failures go to `spool` when one is configured.
    pub async fn drain(&mut self, spool: Option<&FallbackSpool>) -> usize {
        if self.items.is_empty() {
            return 0;
        }
        info!("draining {} pending batches", self.items.len());
        for item in self.items.iter_mut() {
            item.attempts = 0;
        }

        let mut spooled = 0;
        while !self.items.is_empty() {
            match self.drive_once().await {
                DriveOutcome::Requeued { .. } => {
                    let Some(item) = self.items.pop_back() else { break };
                    spooled += 1;
                    match spool {
                        Some(spool) => match spool.append(&item.batch).await {
                            Ok(()) => error!("batch {} spooled to {}", item.id, spool.path().display()),
                            Err(e) => error!("batch {} lost, spool write failed: {}", item.id, e),
                        },
                        None => error!("batch {} lost, no fallback spool configured", item.id),
                    }
                }
                DriveOutcome::Idle => break,
                _ => {}
            }
        }
        spooled
    }
}
