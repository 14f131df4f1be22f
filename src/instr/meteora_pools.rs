//! Meteora dynamic AMM pools 指令解析器

use solana_sdk::pubkey::Pubkey;

use super::utils::{read_discriminator, vault_pair, VaultPair};

pub mod discriminators {
    pub const SWAP: [u8; 8] = [248, 198, 158, 145, 225, 117, 135, 200];
}

/// pool, user source/destination, a/b vault, then the vaults' token accounts
pub const A_TOKEN_VAULT_INDEX: usize = 5;
pub const B_TOKEN_VAULT_INDEX: usize = 6;

pub fn parse_instruction(data: &[u8], accounts: &[Pubkey]) -> Vec<VaultPair> {
    match read_discriminator(data) {
        Some(discriminators::SWAP) => {
            vault_pair(accounts, A_TOKEN_VAULT_INDEX, B_TOKEN_VAULT_INDEX).into_iter().collect()
        }
        _ => Vec::new(),
    }
}
