use serde::{Deserialize, Serialize};
use yellowstone_grpc_proto::geyser::{CommitmentLevel, SubscribeRequestFilterTransactions};

/// 订阅确认级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl From<Commitment> for CommitmentLevel {
    fn from(value: Commitment) -> Self {
        match value {
            Commitment::Processed => CommitmentLevel::Processed,
            Commitment::Confirmed => CommitmentLevel::Confirmed,
            Commitment::Finalized => CommitmentLevel::Finalized,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 连接超时时间（毫秒），0 表示不设置
    pub connection_timeout_ms: u64,
    /// 是否启用TLS
    pub enable_tls: bool,
    pub max_decoding_message_size: usize,
    /// 断线后固定的重连间隔（毫秒）
    pub reconnect_delay_ms: u64,
    pub keep_alive_interval_ms: u64,
    pub commitment: Commitment,
    /// Capacity of the notification channel handed to the decoder.
    pub buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection_timeout_ms: 8000,
            enable_tls: true,
            max_decoding_message_size: 1024 * 1024 * 1024,
            reconnect_delay_ms: 5000,
            keep_alive_interval_ms: 30000,
            commitment: Commitment::Confirmed,
            buffer_size: 8192,
        }
    }
}

impl ClientConfig {
    pub fn low_latency() -> Self {
        Self {
            connection_timeout_ms: 5000,
            reconnect_delay_ms: 1000,
            keep_alive_interval_ms: 10000,
            commitment: Commitment::Processed,
            buffer_size: 16384,
            ..Self::default()
        }
    }

    /// Plaintext connection to a node on the same host or private network.
    pub fn local() -> Self {
        Self { enable_tls: false, connection_timeout_ms: 2000, ..Self::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub account_include: Vec<String>,
    pub account_exclude: Vec<String>,
    pub account_required: Vec<String>,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_account(mut self, account: impl Into<String>) -> Self {
        self.account_include.push(account.into());
        self
    }

    pub fn exclude_account(mut self, account: impl Into<String>) -> Self {
        self.account_exclude.push(account.into());
        self
    }

    pub fn require_account(mut self, account: impl Into<String>) -> Self {
        self.account_required.push(account.into());
        self
    }

    /// 从程序ID列表创建过滤器
    pub fn from_program_ids(program_ids: Vec<String>) -> Self {
        Self { account_include: program_ids, ..Self::default() }
    }

    /// Non-vote, successful transactions touching the filter's accounts.
    pub fn to_proto(&self) -> SubscribeRequestFilterTransactions {
        SubscribeRequestFilterTransactions {
            vote: Some(false),
            failed: Some(false),
            signature: None,
            account_include: self.account_include.clone(),
            account_exclude: self.account_exclude.clone(),
            account_required: self.account_required.clone(),
        }
    }
}
