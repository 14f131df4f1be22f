//! Runtime configuration, read from environment variables.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::core::ConfigError;
use crate::grpc::ClientConfig;
use crate::instr::program_ids::WSOL_MINT;
use crate::price::rpc::DEFAULT_MINT_CACHE_CAPACITY;
use crate::price::ResolverConfig;
use crate::store::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub grpc_endpoint: String,
    pub grpc_x_token: Option<String>,
    pub rpc_url: String,
    pub reference_mint: String,
    pub max_batch_size: usize,
    pub min_batch_interval_ms: u64,
    /// Swaps per account read; each swap needs two accounts.
    pub fetch_batch_size: usize,
    /// Resolution chunks allowed in flight at once.
    pub max_inflight_resolutions: usize,
    pub write_max_retries: u32,
    pub write_backoff_base_ms: u64,
    pub reconnect_delay_ms: u64,
    pub keep_alive_interval_ms: u64,
    pub rpc_timeout_ms: u64,
    /// Mints kept in the reader's mint cache before it is reset.
    pub mint_cache_capacity: usize,
    pub output_path: String,
    pub fallback_path: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            grpc_endpoint: String::new(),
            grpc_x_token: None,
            rpc_url: String::new(),
            reference_mint: WSOL_MINT.to_string(),
            max_batch_size: 100,
            min_batch_interval_ms: 1000,
            fetch_batch_size: 50,
            max_inflight_resolutions: 8,
            write_max_retries: 3,
            write_backoff_base_ms: 1000,
            reconnect_delay_ms: 5000,
            keep_alive_interval_ms: 30000,
            rpc_timeout_ms: 10000,
            mint_cache_capacity: DEFAULT_MINT_CACHE_CAPACITY,
            output_path: "swap-prices.jsonl".to_string(),
            fallback_path: "swap-prices.fallback.jsonl".to_string(),
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid { name, reason: format!("{:?}: {}", value, e) })
}

impl IndexerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name -> value source. Unset and empty variables take
    /// their defaults; required ones fail with [`ConfigError::Missing`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.grpc_endpoint = get("GRPC_ENDPOINT").ok_or(ConfigError::Missing("GRPC_ENDPOINT"))?;
        config.rpc_url = get("RPC_URL").ok_or(ConfigError::Missing("RPC_URL"))?;
        config.grpc_x_token = get("GRPC_X_TOKEN");

        if let Some(v) = get("REFERENCE_MINT") {
            config.reference_mint = v.trim().to_string();
        }
        if let Some(v) = get("MAX_BATCH_SIZE") {
            config.max_batch_size = parse_var("MAX_BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("MIN_BATCH_INTERVAL_MS") {
            config.min_batch_interval_ms = parse_var("MIN_BATCH_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("FETCH_BATCH_SIZE") {
            config.fetch_batch_size = parse_var("FETCH_BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("MAX_INFLIGHT_RESOLUTIONS") {
            config.max_inflight_resolutions = parse_var("MAX_INFLIGHT_RESOLUTIONS", &v)?;
        }
        if let Some(v) = get("WRITE_MAX_RETRIES") {
            config.write_max_retries = parse_var("WRITE_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("WRITE_BACKOFF_BASE_MS") {
            config.write_backoff_base_ms = parse_var("WRITE_BACKOFF_BASE_MS", &v)?;
        }
        if let Some(v) = get("RECONNECT_DELAY_MS") {
            config.reconnect_delay_ms = parse_var("RECONNECT_DELAY_MS", &v)?;
        }
        if let Some(v) = get("KEEP_ALIVE_INTERVAL_MS") {
            config.keep_alive_interval_ms = parse_var("KEEP_ALIVE_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("RPC_TIMEOUT_MS") {
            config.rpc_timeout_ms = parse_var("RPC_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("MINT_CACHE_CAPACITY") {
            config.mint_cache_capacity = parse_var("MINT_CACHE_CAPACITY", &v)?;
        }
        if let Some(v) = get("OUTPUT_PATH") {
            config.output_path = v;
        }
        if let Some(v) = get("FALLBACK_PATH") {
            config.fallback_path = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("MAX_BATCH_SIZE", self.max_batch_size as u64),
            ("MIN_BATCH_INTERVAL_MS", self.min_batch_interval_ms),
            ("FETCH_BATCH_SIZE", self.fetch_batch_size as u64),
            ("MAX_INFLIGHT_RESOLUTIONS", self.max_inflight_resolutions as u64),
            ("WRITE_MAX_RETRIES", self.write_max_retries as u64),
            ("WRITE_BACKOFF_BASE_MS", self.write_backoff_base_ms),
            ("RECONNECT_DELAY_MS", self.reconnect_delay_ms),
            ("KEEP_ALIVE_INTERVAL_MS", self.keep_alive_interval_ms),
            ("RPC_TIMEOUT_MS", self.rpc_timeout_ms),
            ("MINT_CACHE_CAPACITY", self.mint_cache_capacity as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid { name, reason: "must be greater than zero".to_string() });
            }
        }
        // 50 swaps = 100 accounts, the getMultipleAccounts limit
        if self.fetch_batch_size > 50 {
            return Err(ConfigError::Invalid {
                name: "FETCH_BATCH_SIZE",
                reason: format!("{} exceeds 50 swaps per read", self.fetch_batch_size),
            });
        }
        self.reference_mint_pubkey()?;
        Ok(())
    }

    pub fn reference_mint_pubkey(&self) -> Result<Pubkey, ConfigError> {
        Pubkey::from_str(&self.reference_mint)
            .map_err(|e| ConfigError::Invalid { name: "REFERENCE_MINT", reason: e.to_string() })
    }

    pub fn min_batch_interval(&self) -> Duration {
        Duration::from_millis(self.min_batch_interval_ms)
    }

    pub fn resolver_config(&self) -> Result<ResolverConfig, ConfigError> {
        Ok(ResolverConfig {
            reference_mint: self.reference_mint_pubkey()?,
            fetch_batch_size: self.fetch_batch_size,
            timeout: Duration::from_millis(self.rpc_timeout_ms),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.write_max_retries,
            backoff_base: Duration::from_millis(self.write_backoff_base_ms),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            reconnect_delay_ms: self.reconnect_delay_ms,
            keep_alive_interval_ms: self.keep_alive_interval_ms,
            enable_tls: self.grpc_endpoint.starts_with("https://"),
            ..ClientConfig::default()
        }
    }
}
