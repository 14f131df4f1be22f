//! RPC-backed account state reader

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use dashmap::DashMap;
use log::debug;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{account::Account, pubkey::Pubkey};

use super::{AccountStateReader, TokenAccountState};
use crate::accounts::{unpack_mint, unpack_token_balance, AccountData, MintInfo};
use crate::core::ResolveError;

/// `getMultipleAccounts` accepts at most this many keys per request.
const MAX_ACCOUNTS_PER_REQUEST: usize = 100;

pub const DEFAULT_MINT_CACHE_CAPACITY: usize = 100_000;

pub struct RpcAccountReader {
    client: RpcClient,
    /// Mint state by mint, fetched once per mint until the cache is reset.
    mints: DashMap<Pubkey, MintInfo>,
    mint_cache_capacity: usize,
}

impl RpcAccountReader {
    pub fn new(rpc_url: String) -> Self {
        Self::with_client(RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed()))
    }

    pub fn with_client(client: RpcClient) -> Self {
        Self { client, mints: DashMap::new(), mint_cache_capacity: DEFAULT_MINT_CACHE_CAPACITY }
    }

    /// Cache at most `capacity` mints; the cache is cleared when it is full.
    pub fn with_mint_cache_capacity(mut self, capacity: usize) -> Self {
        self.mint_cache_capacity = capacity.max(1);
        self
    }

    pub fn cached_mints(&self) -> usize {
        self.mints.len()
    }

    fn remember_mint(&self, mint: Pubkey, info: MintInfo) {
        if self.mints.len() >= self.mint_cache_capacity && !self.mints.contains_key(&mint) {
            debug!("mint cache full ({} entries), clearing", self.mints.len());
            self.mints.clear();
        }
        self.mints.insert(mint, info);
    }

    async fn fetch_accounts(&self, keys: &[Pubkey]) -> Result<Vec<Option<Account>>, ResolveError> {
        let mut out = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(MAX_ACCOUNTS_PER_REQUEST) {
            let accounts = self
                .client
                .get_multiple_accounts(chunk)
                .await
                .map_err(|e| ResolveError::Rpc(e.to_string()))?;
            out.extend(accounts);
        }
        Ok(out)
    }

    /// Mint state for every resolvable mint in `mints`, from the cache or RPC.
    async fn load_mints(&self, mints: &HashSet<Pubkey>) -> Result<HashMap<Pubkey, MintInfo>, ResolveError> {
        let mut found = HashMap::with_capacity(mints.len());
        let mut missing = Vec::new();
        for mint in mints {
            match self.mints.get(mint) {
                Some(info) => {
                    found.insert(*mint, *info);
                }
                None => missing.push(*mint),
            }
        }
        if missing.is_empty() {
            return Ok(found);
        }

        debug!("fetching {} mints", missing.len());
        let accounts = self.fetch_accounts(&missing).await?;
        for (mint, account) in missing.into_iter().zip(accounts) {
            let info = account.and_then(|a| unpack_mint(&AccountData { pubkey: mint, owner: a.owner, data: a.data }));
            if let Some(info) = info {
                self.remember_mint(mint, info);
                found.insert(mint, info);
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl AccountStateReader for RpcAccountReader {
    async fn read_token_accounts(
        &self,
        accounts: &[Pubkey],
    ) -> Result<Vec<Option<TokenAccountState>>, ResolveError> {
        let raw = self.fetch_accounts(accounts).await?;

        let balances: Vec<_> = accounts
            .iter()
            .zip(raw)
            .map(|(pubkey, account)| {
                account.and_then(|a| {
                    unpack_token_balance(&AccountData { pubkey: *pubkey, owner: a.owner, data: a.data })
                })
            })
            .collect();

        let mints: HashSet<Pubkey> = balances.iter().flatten().map(|b| b.mint).collect();
        let mint_state = self.load_mints(&mints).await?;

        Ok(balances
            .into_iter()
            .map(|balance| {
                let balance = balance?;
                let info = mint_state.get(&balance.mint)?;
                Some(TokenAccountState {
                    mint: balance.mint,
                    amount: balance.amount,
                    decimals: info.decimals,
                    supply: info.supply,
                    mint_burnt: info.mint_burnt,
                    freeze_burnt: info.freeze_burnt,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(capacity: usize) -> RpcAccountReader {
        RpcAccountReader::new("http://127.0.0.1:8899".to_string()).with_mint_cache_capacity(capacity)
    }

    #[test]
    fn test_mint_cache_is_bounded() {
        let reader = reader(3);
        let info = MintInfo { decimals: 6, ..Default::default() };
        for _ in 0..3 {
            reader.remember_mint(Pubkey::new_unique(), info);
        }
        assert_eq!(reader.cached_mints(), 3);

        let late = Pubkey::new_unique();
        reader.remember_mint(late, info);
        assert_eq!(reader.cached_mints(), 1);
        assert!(reader.mints.contains_key(&late));
    }

    #[test]
    fn test_refreshing_a_cached_mint_keeps_the_cache() {
        let reader = reader(2);
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        reader.remember_mint(a, MintInfo::default());
        reader.remember_mint(b, MintInfo::default());
        reader.remember_mint(a, MintInfo { supply: 5, ..Default::default() });
        assert_eq!(reader.cached_mints(), 2);
        assert_eq!(reader.mints.get(&a).map(|i| i.supply), Some(5));
    }
}
