//! Raydium CPMM 指令解析器

use solana_sdk::pubkey::Pubkey;

use super::utils::{read_discriminator, vault_pair, VaultPair};

pub mod discriminators {
    pub const SWAP_BASE_INPUT: [u8; 8] = [143, 190, 90, 218, 196, 30, 51, 222];
    pub const SWAP_BASE_OUTPUT: [u8; 8] = [55, 217, 98, 86, 163, 74, 180, 173];
}

/// payer, authority, amm_config, pool_state, input/output token accounts, then the vaults
pub const INPUT_VAULT_INDEX: usize = 6;
pub const OUTPUT_VAULT_INDEX: usize = 7;

pub fn parse_instruction(data: &[u8], accounts: &[Pubkey]) -> Vec<VaultPair> {
    match read_discriminator(data) {
        Some(discriminators::SWAP_BASE_INPUT) | Some(discriminators::SWAP_BASE_OUTPUT) => {
            vault_pair(accounts, INPUT_VAULT_INDEX, OUTPUT_VAULT_INDEX).into_iter().collect()
        }
        _ => Vec::new(),
    }
}
