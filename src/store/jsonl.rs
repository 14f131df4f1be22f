//! JSON-lines file store and fallback spool
//!
//! Each upsert appends one line per new token and one per price. Token lines
//! already present in the file (from this or a previous run) are not written
//! again.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::{price_records, token_records, PriceRecord, PriceStore, TokenRecord};
use crate::batch::Batch;
use crate::core::StoreError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Row {
    Token(TokenRecord),
    Price(PriceRecord),
}

async fn append_lines(path: &Path, lines: &str) -> Result<(), StoreError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(lines.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

pub struct JsonlStore {
    path: PathBuf,
    known_mints: Mutex<HashSet<String>>,
}

impl JsonlStore {
    /// Open `path`, indexing token rows already written to it.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut known = HashSet::new();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                for line in content.lines().filter(|l| !l.trim().is_empty()) {
                    match serde_json::from_str::<Row>(line) {
                        Ok(Row::Token(token)) => {
                            known.insert(token.mint);
                        }
                        Ok(Row::Price(_)) => {}
                        Err(e) => warn!("skipping unreadable line in {}: {}", path.display(), e),
                    }
                }
                info!("opened {} with {} known tokens", path.display(), known.len());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Self { path, known_mints: Mutex::new(known) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PriceStore for JsonlStore {
    async fn upsert(&self, tokens: &[TokenRecord], prices: &[PriceRecord]) -> Result<(), StoreError> {
        let new_tokens: Vec<&TokenRecord> = {
            let known = self.known_mints.lock();
            tokens.iter().filter(|t| !known.contains(&t.mint)).collect()
        };

        let mut buf = String::new();
        for token in &new_tokens {
            buf.push_str(&serde_json::to_string(&Row::Token((*token).clone()))?);
            buf.push('\n');
        }
        for price in prices {
            buf.push_str(&serde_json::to_string(&Row::Price(price.clone()))?);
            buf.push('\n');
        }
        if buf.is_empty() {
            return Ok(());
        }

        append_lines(&self.path, &buf).await?;

        let mut known = self.known_mints.lock();
        known.extend(new_tokens.into_iter().map(|t| t.mint.clone()));
        Ok(())
    }
}

/// Batches the write queue gave up on at shutdown, one JSON object per line.
pub struct FallbackSpool {
    path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpooledBatch {
    pub tokens: Vec<TokenRecord>,
    pub prices: Vec<PriceRecord>,
}

impl FallbackSpool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn append(&self, batch: &Batch) -> Result<(), StoreError> {
        let spooled = SpooledBatch { tokens: token_records(batch), prices: price_records(batch) };
        let mut line = serde_json::to_string(&spooled)?;
        line.push('\n');
        append_lines(&self.path, &line).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
