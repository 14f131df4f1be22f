//! Raydium CLMM 指令解析器
//!
//! 使用 match discriminator 模式解析 Raydium CLMM swap 指令

use solana_sdk::pubkey::Pubkey;

use super::utils::{read_discriminator, AccountLayout, VaultPair};

/// Raydium CLMM discriminator 常量
pub mod discriminators {
    pub const SWAP: [u8; 8] = [248, 198, 158, 145, 225, 117, 135, 200];
    pub const SWAP_V2: [u8; 8] = [43, 4, 237, 11, 26, 201, 30, 98];
}

pub const SWAP_ACCOUNTS: AccountLayout = AccountLayout::new(&[
    "payer",
    "ammConfig",
    "poolState",
    "inputTokenAccount",
    "outputTokenAccount",
    "inputVault",
    "outputVault",
    "observationState",
    "tokenProgram",
    "tickArray",
]);

pub const SWAP_V2_ACCOUNTS: AccountLayout = AccountLayout::new(&[
    "payer",
    "ammConfig",
    "poolState",
    "inputTokenAccount",
    "outputTokenAccount",
    "inputVault",
    "outputVault",
    "observationState",
    "tokenProgram",
    "tokenProgram2022",
    "memoProgram",
    "inputVaultMint",
    "outputVaultMint",
]);

pub fn parse_instruction(data: &[u8], accounts: &[Pubkey]) -> Vec<VaultPair> {
    let layout = match read_discriminator(data) {
        Some(discriminators::SWAP) => SWAP_ACCOUNTS,
        Some(discriminators::SWAP_V2) => SWAP_V2_ACCOUNTS,
        _ => return Vec::new(),
    };
    layout.pair(accounts, "inputVault", "outputVault").into_iter().collect()
}
