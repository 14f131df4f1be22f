//! SPL Token 和 Token-2022 账户解析
//!
//! Vault balances and mint state for price resolution.

use solana_sdk::pubkey::Pubkey;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::{Account, Mint};
use spl_token_2022::{
    extension::StateWithExtensions,
    state::{Account as Account2022, Mint as Mint2022},
};

/// Raw account as returned by `getMultipleAccounts`.
#[derive(Clone, Debug)]
pub struct AccountData {
    pub pubkey: Pubkey,
    pub owner: Pubkey,
    pub data: Vec<u8>,
}

/// Mint and raw amount of a token account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenBalance {
    pub mint: Pubkey,
    pub amount: u64,
}

pub fn is_token_2022(owner: &Pubkey) -> bool {
    owner.to_bytes() == spl_token_2022::ID.to_bytes()
}

pub fn is_token_program_account(owner: &Pubkey) -> bool {
    owner.to_bytes() == spl_token::ID.to_bytes() || is_token_2022(owner)
}

/// Unpack a token account owned by either token program.
pub fn unpack_token_balance(account: &AccountData) -> Option<TokenBalance> {
    if !is_token_program_account(&account.owner) {
        return None;
    }
    if is_token_2022(&account.owner) {
        let state = StateWithExtensions::<Account2022>::unpack(&account.data).ok()?;
        Some(TokenBalance {
            mint: Pubkey::new_from_array(state.base.mint.to_bytes()),
            amount: state.base.amount,
        })
    } else {
        let state = Account::unpack(&account.data).ok()?;
        Some(TokenBalance { mint: Pubkey::new_from_array(state.mint.to_bytes()), amount: state.amount })
    }
}

/// Mint fields recorded alongside prices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MintInfo {
    pub decimals: u8,
    pub supply: u64,
    /// No mint authority: supply can no longer grow.
    pub mint_burnt: bool,
    /// No freeze authority: holders cannot be frozen.
    pub freeze_burnt: bool,
}

/// Unpack a mint owned by either token program.
pub fn unpack_mint(account: &AccountData) -> Option<MintInfo> {
    if !is_token_program_account(&account.owner) {
        return None;
    }
    if is_token_2022(&account.owner) {
        let state = StateWithExtensions::<Mint2022>::unpack(&account.data).ok()?;
        let mint = state.base;
        Some(MintInfo {
            decimals: mint.decimals,
            supply: mint.supply,
            mint_burnt: mint.mint_authority.is_none(),
            freeze_burnt: mint.freeze_authority.is_none(),
        })
    } else if account.data.len() >= Mint::LEN {
        let mint = Mint::unpack_from_slice(&account.data[..Mint::LEN]).ok()?;
        Some(MintInfo {
            decimals: mint.decimals,
            supply: mint.supply,
            mint_burnt: mint.mint_authority.is_none(),
            freeze_burnt: mint.freeze_authority.is_none(),
        })
    } else {
        None
    }
}
