//! 指令解析器模块
//!
//! Swap decoders for every supported AMM plus the dispatcher that routes a
//! transaction's instructions to them by program id.

pub mod meteora_dlmm;
pub mod meteora_pools;
pub mod orca_whirlpool;
pub mod program_ids;
pub mod raydium_amm;
pub mod raydium_clmm;
pub mod raydium_cpmm;
pub mod utils;

use std::collections::HashMap;

use log::trace;
use solana_sdk::pubkey::Pubkey;

use crate::core::{CanonicalTransaction, DecodedSwap, ParsedInstruction, Platform, SwapMetadata};
use program_ids::*;
pub use utils::VaultPair;

/// Closed set of swap decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapProgram {
    RaydiumAmm,
    RaydiumClmm,
    RaydiumCpmm,
    OrcaWhirlpool,
    MeteoraDlmm,
    MeteoraPools,
}

impl SwapProgram {
    pub const ALL: [SwapProgram; 6] = [
        SwapProgram::RaydiumAmm,
        SwapProgram::RaydiumClmm,
        SwapProgram::RaydiumCpmm,
        SwapProgram::OrcaWhirlpool,
        SwapProgram::MeteoraDlmm,
        SwapProgram::MeteoraPools,
    ];

    pub fn program_id(&self) -> Pubkey {
        match self {
            SwapProgram::RaydiumAmm => RAYDIUM_AMM_V4_PROGRAM_ID,
            SwapProgram::RaydiumClmm => RAYDIUM_CLMM_PROGRAM_ID,
            SwapProgram::RaydiumCpmm => RAYDIUM_CPMM_PROGRAM_ID,
            SwapProgram::OrcaWhirlpool => ORCA_WHIRLPOOL_PROGRAM_ID,
            SwapProgram::MeteoraDlmm => METEORA_DLMM_PROGRAM_ID,
            SwapProgram::MeteoraPools => METEORA_POOLS_PROGRAM_ID,
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            SwapProgram::RaydiumAmm => Platform::RaydiumAmm,
            SwapProgram::RaydiumClmm => Platform::RaydiumClmm,
            SwapProgram::RaydiumCpmm => Platform::RaydiumCpmm,
            SwapProgram::OrcaWhirlpool => Platform::OrcaWhirlpool,
            SwapProgram::MeteoraDlmm => Platform::MeteoraDlmm,
            SwapProgram::MeteoraPools => Platform::MeteoraPools,
        }
    }

    pub fn from_program_id(program_id: &Pubkey) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.program_id() == *program_id)
    }

    #[inline]
    fn parse_instruction(&self, data: &[u8], accounts: &[Pubkey]) -> Vec<VaultPair> {
        match self {
            SwapProgram::RaydiumAmm => raydium_amm::parse_instruction(data, accounts),
            SwapProgram::RaydiumClmm => raydium_clmm::parse_instruction(data, accounts),
            SwapProgram::RaydiumCpmm => raydium_cpmm::parse_instruction(data, accounts),
            SwapProgram::OrcaWhirlpool => orca_whirlpool::parse_instruction(data, accounts),
            SwapProgram::MeteoraDlmm => meteora_dlmm::parse_instruction(data, accounts),
            SwapProgram::MeteoraPools => meteora_pools::parse_instruction(data, accounts),
        }
    }

    /// Decode every swap among `instructions`; non-swap and short
    /// instructions are skipped.
    pub fn decode(&self, instructions: &[ParsedInstruction<'_>], metadata: SwapMetadata) -> Vec<DecodedSwap> {
        let platform = self.platform();
        instructions
            .iter()
            .flat_map(|ix| {
                self.parse_instruction(ix.data, ix.accounts).into_iter().map(move |leg| DecodedSwap {
                    metadata,
                    platform,
                    vault_x: leg.vault_x,
                    vault_y: leg.vault_y,
                    instruction_index: ix.outer_index,
                    inner_instruction_index: ix.inner_index,
                })
            })
            .collect()
    }
}

/// Routes instructions to the registered decoders.
#[derive(Debug, Clone)]
pub struct SwapDispatcher {
    registry: HashMap<Pubkey, SwapProgram>,
}

impl SwapDispatcher {
    pub fn new(programs: impl IntoIterator<Item = SwapProgram>) -> Self {
        Self { registry: programs.into_iter().map(|p| (p.program_id(), p)).collect() }
    }

    /// Dispatcher with every supported AMM registered.
    pub fn all() -> Self {
        Self::new(SwapProgram::ALL)
    }

    pub fn program_ids(&self) -> Vec<Pubkey> {
        let mut ids: Vec<Pubkey> = self.registry.keys().copied().collect();
        ids.sort();
        ids
    }

    #[inline]
    pub fn lookup(&self, program_id: &Pubkey) -> Option<SwapProgram> {
        self.registry.get(program_id).copied()
    }

    /// Decode all swaps in `tx`, top-level and inner, in instruction order.
    pub fn dispatch(&self, tx: &CanonicalTransaction) -> Vec<DecodedSwap> {
        let flat = tx.parsed_instructions();

        let mut groups: Vec<(SwapProgram, Vec<ParsedInstruction<'_>>)> = Vec::new();
        for ix in flat {
            let Some(program) = self.lookup(&ix.program_id) else { continue };
            match groups.iter_mut().find(|(p, _)| *p == program) {
                Some((_, group)) => group.push(ix),
                None => groups.push((program, vec![ix])),
            }
        }
        if groups.is_empty() {
            return Vec::new();
        }

        let metadata = SwapMetadata {
            signature: tx.signature(),
            slot: tx.slot,
            timestamp_ms: tx.captured_at_ms,
        };
        let mut swaps: Vec<DecodedSwap> = groups
            .iter()
            .flat_map(|(program, group)| program.decode(group, metadata))
            .collect();
        swaps.sort_by_key(|s| (s.instruction_index, s.inner_instruction_index.map_or(0, |i| i + 1)));

        trace!("{} swaps decoded from {}", swaps.len(), metadata.signature);
        swaps
    }
}

impl Default for SwapDispatcher {
    fn default() -> Self {
        Self::all()
    }
}
