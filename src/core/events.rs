//! Swap and price records carried between pipeline stages

use std::fmt;

use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};

/// AMM that executed a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    RaydiumAmm,
    RaydiumClmm,
    RaydiumCpmm,
    OrcaWhirlpool,
    MeteoraDlmm,
    MeteoraPools,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::RaydiumAmm => "raydium_amm",
            Platform::RaydiumClmm => "raydium_clmm",
            Platform::RaydiumCpmm => "raydium_cpmm",
            Platform::OrcaWhirlpool => "orca_whirlpool",
            Platform::MeteoraDlmm => "meteora_dlmm",
            Platform::MeteoraPools => "meteora_pools",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction-level fields shared by every swap decoded from one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SwapMetadata {
    pub signature: Signature,
    pub slot: u64,
    /// Arrival time of the notification, UTC milliseconds.
    pub timestamp_ms: i64,
}

/// One swap leg: the two pool vaults whose balances define the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedSwap {
    pub metadata: SwapMetadata,
    pub platform: Platform,
    pub vault_x: Pubkey,
    pub vault_y: Pubkey,
    /// Top-level instruction that executed the swap (inner swaps report their parent).
    pub instruction_index: usize,
    /// Position among the parent's inner instructions, `None` for top-level swaps.
    pub inner_instruction_index: Option<usize>,
}

/// Priced token observation produced from a swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub metadata: SwapMetadata,
    pub platform: Platform,
    pub mint: Pubkey,
    pub decimals: u8,
    /// Raw supply of `mint` when it was read.
    pub supply: u64,
    pub mint_burnt: bool,
    pub freeze_burnt: bool,
    /// Units of the reference token per one whole token of `mint`.
    pub price: f64,
}
