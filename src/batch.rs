//! 批次缓冲区 - price points are grouped into batches before persistence
//!
//! A batch is released when the buffer reaches `max_size` (exactly that many
//! records go out) or when the periodic tick finds a non-empty buffer and at
//! least `min_interval` has passed since the previous release. Appends and
//! releases share one lock, so a record is never in two batches and batches
//! reach the sink in release order.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, trace};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::core::PricePoint;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    pub records: Vec<PricePoint>,
}

impl Batch {
    pub fn new(records: Vec<PricePoint>) -> Self {
        Self { records }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Capture time of the oldest record, UTC milliseconds.
    pub fn oldest_timestamp_ms(&self) -> Option<i64> {
        self.records.iter().map(|r| r.metadata.timestamp_ms).min()
    }
}

struct BufferState {
    records: Vec<PricePoint>,
    last_release: Instant,
}

pub struct BatchAccumulator {
    state: Mutex<BufferState>,
    max_size: usize,
    min_interval: Duration,
    sink: mpsc::UnboundedSender<Batch>,
}

impl BatchAccumulator {
    pub fn new(max_size: usize, min_interval: Duration, sink: mpsc::UnboundedSender<Batch>) -> Self {
        let max_size = max_size.max(1);
        Self {
            state: Mutex::new(BufferState {
                records: Vec::with_capacity(max_size),
                last_release: Instant::now(),
            }),
            max_size,
            min_interval,
            sink,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, state: &mut BufferState, records: Vec<PricePoint>, reason: &str) {
        state.last_release = Instant::now();
        debug!("releasing batch of {} price points ({})", records.len(), reason);
        if self.sink.send(Batch::new(records)).is_err() {
            error!("batch sink closed, batch dropped");
        }
    }

    /// Add records; returns the number of batches released by size.
    pub fn append(&self, records: impl IntoIterator<Item = PricePoint>) -> usize {
        let mut state = self.state.lock();
        let mut released = 0;
        for record in records {
            state.records.push(record);
            if state.records.len() >= self.max_size {
                let full = std::mem::replace(&mut state.records, Vec::with_capacity(self.max_size));
                self.release(&mut state, full, "size");
                released += 1;
            }
        }
        trace!("{} price points buffered", state.records.len());
        released
    }

    /// Timer path: release when non-empty and the minimum interval has elapsed.
    pub fn tick(&self) -> bool {
        let mut state = self.state.lock();
        if state.records.is_empty() || state.last_release.elapsed() < self.min_interval {
            return false;
        }
        let records = std::mem::take(&mut state.records);
        self.release(&mut state, records, "interval");
        true
    }

    /// Release whatever is buffered regardless of timing.
    pub fn flush(&self) -> bool {
        let mut state = self.state.lock();
        if state.records.is_empty() {
            return false;
        }
        let records = std::mem::take(&mut state.records);
        self.release(&mut state, records, "flush");
        true
    }

    /// Spawn the periodic tick; it stops when `shutdown` flips to `true`.
    pub fn spawn_timer(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let accumulator = Arc::clone(self);
        let period = (self.min_interval / 4).max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        accumulator.tick();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}
