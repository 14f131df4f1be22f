//! 指令解析通用工具函数

use solana_sdk::pubkey::Pubkey;

/// The two pool vaults touched by one swap leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultPair {
    pub vault_x: Pubkey,
    pub vault_y: Pubkey,
}

/// First 8 bytes of Anchor instruction data.
#[inline(always)]
pub fn read_discriminator(data: &[u8]) -> Option<[u8; 8]> {
    data.get(..8)?.try_into().ok()
}

#[inline(always)]
pub fn get_account(accounts: &[Pubkey], index: usize) -> Option<Pubkey> {
    accounts.get(index).copied()
}

/// Vault pair by position; `None` if the instruction carries too few accounts.
#[inline]
pub fn vault_pair(accounts: &[Pubkey], x: usize, y: usize) -> Option<VaultPair> {
    Some(VaultPair { vault_x: get_account(accounts, x)?, vault_y: get_account(accounts, y)? })
}

/// Account names of an instruction in IDL order.
#[derive(Debug, Clone, Copy)]
pub struct AccountLayout {
    names: &'static [&'static str],
}

impl AccountLayout {
    pub const fn new(names: &'static [&'static str]) -> Self {
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| *n == name)
    }

    pub fn get(&self, accounts: &[Pubkey], name: &str) -> Option<Pubkey> {
        get_account(accounts, self.index_of(name)?)
    }

    pub fn pair(&self, accounts: &[Pubkey], x: &str, y: &str) -> Option<VaultPair> {
        Some(VaultPair { vault_x: self.get(accounts, x)?, vault_y: self.get(accounts, y)? })
    }
}
