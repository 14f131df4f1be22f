//! Raydium AMM v4 指令解析器
//!
//! Native (non-Anchor) program: the first data byte is the instruction tag.
//! Swap instructions come with 18 accounts, or 17 when the pool has no
//! target orders account.

use solana_sdk::pubkey::Pubkey;

use super::utils::{AccountLayout, VaultPair};

pub mod discriminators {
    pub const SWAP_BASE_IN: u8 = 9;
    pub const SWAP_BASE_OUT: u8 = 11;
}

pub const SWAP_ACCOUNTS: AccountLayout = AccountLayout::new(&[
    "tokenProgram",
    "amm",
    "ammAuthority",
    "ammOpenOrders",
    "ammTargetOrders",
    "poolCoinTokenAccount",
    "poolPcTokenAccount",
    "serumProgram",
    "serumMarket",
    "serumBids",
    "serumAsks",
    "serumEventQueue",
    "serumCoinVaultAccount",
    "serumPcVaultAccount",
    "serumVaultSigner",
    "userSourceTokenAccount",
    "userDestinationTokenAccount",
    "userSourceOwner",
]);

pub const SWAP_ACCOUNTS_NO_TARGET_ORDERS: AccountLayout = AccountLayout::new(&[
    "tokenProgram",
    "amm",
    "ammAuthority",
    "ammOpenOrders",
    "poolCoinTokenAccount",
    "poolPcTokenAccount",
    "serumProgram",
    "serumMarket",
    "serumBids",
    "serumAsks",
    "serumEventQueue",
    "serumCoinVaultAccount",
    "serumPcVaultAccount",
    "serumVaultSigner",
    "userSourceTokenAccount",
    "userDestinationTokenAccount",
    "userSourceOwner",
]);

pub fn parse_instruction(data: &[u8], accounts: &[Pubkey]) -> Vec<VaultPair> {
    match data.first() {
        Some(&discriminators::SWAP_BASE_IN) | Some(&discriminators::SWAP_BASE_OUT) => {}
        _ => return Vec::new(),
    }
    let layout = match accounts.len() {
        n if n == SWAP_ACCOUNTS.len() => SWAP_ACCOUNTS,
        n if n == SWAP_ACCOUNTS_NO_TARGET_ORDERS.len() => SWAP_ACCOUNTS_NO_TARGET_ORDERS,
        _ => return Vec::new(),
    };
    layout
        .pair(accounts, "poolCoinTokenAccount", "poolPcTokenAccount")
        .into_iter()
        .collect()
}
