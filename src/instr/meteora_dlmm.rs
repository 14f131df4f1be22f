//! Meteora DLMM 指令解析器
//!
//! Every swap variant shares the same leading accounts, so reserves sit at
//! the same position regardless of which one executed.

use solana_sdk::pubkey::Pubkey;

use super::utils::{read_discriminator, AccountLayout, VaultPair};

pub mod discriminators {
    pub const SWAP: [u8; 8] = [248, 198, 158, 145, 225, 117, 135, 200];
    pub const SWAP_EXACT_OUT: [u8; 8] = [250, 73, 101, 33, 38, 207, 75, 184];
    pub const SWAP_WITH_PRICE_IMPACT: [u8; 8] = [56, 173, 230, 208, 173, 228, 156, 205];
    pub const SWAP2: [u8; 8] = [65, 75, 63, 76, 235, 91, 91, 136];
    pub const SWAP_EXACT_OUT2: [u8; 8] = [43, 215, 247, 132, 137, 60, 243, 81];
    pub const SWAP_WITH_PRICE_IMPACT2: [u8; 8] = [74, 98, 192, 214, 177, 51, 75, 51];
}

pub const SWAP_ACCOUNTS: AccountLayout = AccountLayout::new(&[
    "lbPair",
    "binArrayBitmapExtension",
    "reserveX",
    "reserveY",
    "userTokenIn",
    "userTokenOut",
    "tokenXMint",
    "tokenYMint",
    "oracle",
    "hostFeeIn",
    "user",
    "tokenXProgram",
    "tokenYProgram",
    "eventAuthority",
    "program",
]);

fn is_swap(discriminator: [u8; 8]) -> bool {
    matches!(
        discriminator,
        discriminators::SWAP
            | discriminators::SWAP_EXACT_OUT
            | discriminators::SWAP_WITH_PRICE_IMPACT
            | discriminators::SWAP2
            | discriminators::SWAP_EXACT_OUT2
            | discriminators::SWAP_WITH_PRICE_IMPACT2
    )
}

pub fn parse_instruction(data: &[u8], accounts: &[Pubkey]) -> Vec<VaultPair> {
    match read_discriminator(data) {
        Some(d) if is_swap(d) => SWAP_ACCOUNTS.pair(accounts, "reserveX", "reserveY").into_iter().collect(),
        _ => Vec::new(),
    }
}
