//! Error types for each pipeline stage

use thiserror::Error;

/// A notification that cannot be turned into a canonical transaction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),
}

impl NormalizeError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        NormalizeError::MalformedTransaction(reason.into())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogParseError {
    #[error("unrecognized log line {line}: {text}")]
    UnrecognizedLine { line: usize, text: String },
    #[error("line {line}: expected program {expected} on top of call stack, found {found}")]
    CallStackMismatch { line: usize, expected: String, found: String },
    #[error("line {line}: invoke depth {found} does not match call stack depth {expected}")]
    DepthMismatch { line: usize, expected: usize, found: usize },
    #[error("line {line}: no active invocation")]
    EmptyCallStack { line: usize },
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("account state read timed out after {0}ms")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("store rejected write: {0}")]
    Rejected(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("subscribe failed: {0}")]
    Subscribe(String),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("keep-alive send failed: {0}")]
    KeepAlive(String),
}

/// Fetching a transaction by signature over RPC.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}
