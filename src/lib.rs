// 核心模块 - 扁平化结构
pub mod accounts; // 账户解析器
pub mod batch;
pub mod config;
pub mod core;
pub mod instr; // 指令解析器
pub mod logs; // 日志解析器
pub mod normalizer;
pub mod pipeline;
pub mod price;
pub mod store;

// gRPC 模块 - Yellowstone 订阅
pub mod grpc;

pub use batch::{Batch, BatchAccumulator};
pub use config::IndexerConfig;
pub use crate::core::{
    CanonicalTransaction, DecodedSwap, LogParseError, NormalizeError, Platform, PricePoint,
    StoreError, SwapMetadata,
};
pub use instr::{SwapDispatcher, SwapProgram};
pub use logs::{parse_logs, LogInvocationContext};
pub use normalizer::{fetch_and_normalize, normalize, RawNotification};
pub use pipeline::{decode_transaction, process_notification, PipelineSettings, PipelineStats, SwapPipeline};
pub use price::{AccountStateReader, PriceResolver, ResolverConfig, RpcAccountReader};
pub use store::{DurableWriteQueue, FallbackSpool, JsonlStore, MemoryStore, PriceStore, RetryPolicy};
