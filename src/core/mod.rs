//! Core types shared across the pipeline

pub mod clock;
pub mod error;
pub mod events;
pub mod transaction;

pub use error::{
    ConfigError, FetchError, LogParseError, NormalizeError, ResolveError, StoreError,
    SubscriptionError,
};
pub use events::{DecodedSwap, Platform, PricePoint, SwapMetadata};
pub use transaction::{
    CanonicalInstruction, CanonicalTransaction, InnerInstructionGroup, ParsedInstruction,
    TransactionVersion,
};
