//! gRPC 模块 - Yellowstone 交易订阅
//!
//! Subscribes to transactions that touch the supported swap programs and
//! forwards them as [`RawNotification`](crate::normalizer::RawNotification)s,
//! reconnecting on a fixed delay and keeping the connection alive with pings.

pub mod client;
pub mod program_ids;
pub mod types;

pub use client::YellowstoneGrpc;
pub use program_ids::{all_swap_program_ids, get_program_ids_for_programs};
pub use types::{ClientConfig, Commitment, TransactionFilter};
