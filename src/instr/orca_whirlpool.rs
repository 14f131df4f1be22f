//! Orca Whirlpool 指令解析器
//!
//! `swap` / `swap_v2` yield one leg, `two_hop_swap` / `two_hop_swap_v2` yield
//! one leg per pool.

use solana_sdk::pubkey::Pubkey;

use super::utils::{read_discriminator, AccountLayout, VaultPair};

pub mod discriminators {
    pub const SWAP: [u8; 8] = [248, 198, 158, 145, 225, 117, 135, 200];
    pub const SWAP_V2: [u8; 8] = [43, 4, 237, 11, 26, 201, 30, 98];
    pub const TWO_HOP_SWAP: [u8; 8] = [195, 96, 237, 108, 68, 162, 219, 230];
    pub const TWO_HOP_SWAP_V2: [u8; 8] = [186, 143, 209, 29, 254, 2, 194, 117];
}

pub const SWAP_ACCOUNTS: AccountLayout = AccountLayout::new(&[
    "tokenProgram",
    "tokenAuthority",
    "whirlpool",
    "tokenOwnerAccountA",
    "tokenVaultA",
    "tokenOwnerAccountB",
    "tokenVaultB",
    "tickArray0",
    "tickArray1",
    "tickArray2",
    "oracle",
]);

pub const SWAP_V2_ACCOUNTS: AccountLayout = AccountLayout::new(&[
    "tokenProgramA",
    "tokenProgramB",
    "memoProgram",
    "tokenAuthority",
    "whirlpool",
    "tokenMintA",
    "tokenMintB",
    "tokenOwnerAccountA",
    "tokenVaultA",
    "tokenOwnerAccountB",
    "tokenVaultB",
    "tickArray0",
    "tickArray1",
    "tickArray2",
    "oracle",
]);

pub const TWO_HOP_SWAP_ACCOUNTS: AccountLayout = AccountLayout::new(&[
    "tokenProgram",
    "tokenAuthority",
    "whirlpoolOne",
    "whirlpoolTwo",
    "tokenOwnerAccountOneA",
    "tokenVaultOneA",
    "tokenOwnerAccountOneB",
    "tokenVaultOneB",
    "tokenOwnerAccountTwoA",
    "tokenVaultTwoA",
    "tokenOwnerAccountTwoB",
    "tokenVaultTwoB",
    "tickArrayOne0",
    "tickArrayOne1",
    "tickArrayOne2",
    "tickArrayTwo0",
    "tickArrayTwo1",
    "tickArrayTwo2",
    "oracleOne",
    "oracleTwo",
]);

pub const TWO_HOP_SWAP_V2_ACCOUNTS: AccountLayout = AccountLayout::new(&[
    "whirlpoolOne",
    "whirlpoolTwo",
    "tokenMintInput",
    "tokenMintIntermediate",
    "tokenMintOutput",
    "tokenProgramInput",
    "tokenProgramIntermediate",
    "tokenProgramOutput",
    "tokenOwnerAccountInput",
    "tokenVaultOneInput",
    "tokenVaultOneIntermediate",
    "tokenVaultTwoIntermediate",
    "tokenVaultTwoOutput",
    "tokenOwnerAccountOutput",
    "tokenAuthority",
    "tickArrayOne0",
    "tickArrayOne1",
    "tickArrayOne2",
    "tickArrayTwo0",
    "tickArrayTwo1",
    "tickArrayTwo2",
    "oracleOne",
    "oracleTwo",
    "memoProgram",
]);

pub fn parse_instruction(data: &[u8], accounts: &[Pubkey]) -> Vec<VaultPair> {
    let legs = match read_discriminator(data) {
        Some(discriminators::SWAP) => {
            vec![SWAP_ACCOUNTS.pair(accounts, "tokenVaultA", "tokenVaultB")]
        }
        Some(discriminators::SWAP_V2) => {
            vec![SWAP_V2_ACCOUNTS.pair(accounts, "tokenVaultA", "tokenVaultB")]
        }
        Some(discriminators::TWO_HOP_SWAP) => vec![
            TWO_HOP_SWAP_ACCOUNTS.pair(accounts, "tokenVaultOneA", "tokenVaultOneB"),
            TWO_HOP_SWAP_ACCOUNTS.pair(accounts, "tokenVaultTwoA", "tokenVaultTwoB"),
        ],
        Some(discriminators::TWO_HOP_SWAP_V2) => vec![
            TWO_HOP_SWAP_V2_ACCOUNTS.pair(accounts, "tokenVaultOneInput", "tokenVaultOneIntermediate"),
            TWO_HOP_SWAP_V2_ACCOUNTS.pair(accounts, "tokenVaultTwoIntermediate", "tokenVaultTwoOutput"),
        ],
        _ => return Vec::new(),
    };
    legs.into_iter().flatten().collect()
}
