//! In-memory oracles with fixed balances

use crate::errors::CommunityResult;
use crate::permissions::{
    normalize_address, Address, BalancesByChain, CollectiblesByChain, CollectiblesOracle,
    EnsOracle, TokenBalance, TokenBalanceOracle,
};
use async_trait::async_trait;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct StaticTokenOracle {
    chain_ids: Vec<u64>,
    balances: BalancesByChain,
}

impl StaticTokenOracle {
    pub fn new(chain_ids: Vec<u64>) -> Self {
        Self {
            chain_ids,
            balances: BalancesByChain::new(),
        }
    }

    pub fn with_balance(mut self, chain_id: u64, account: &str, contract: &str, amount: u128) -> Self {
        self.balances
            .entry(chain_id)
            .or_default()
            .entry(normalize_address(account))
            .or_default()
            .insert(normalize_address(contract), amount);
        self
    }
}

#[async_trait]
impl TokenBalanceOracle for StaticTokenOracle {
    async fn all_chain_ids(&self) -> CommunityResult<Vec<u64>> {
        Ok(self.chain_ids.clone())
    }

    async fn balances_by_chain(
        &self,
        accounts: &[Address],
        contracts: &[Address],
        chain_ids: &[u64],
    ) -> CommunityResult<BalancesByChain> {
        let mut result = BalancesByChain::new();
        for chain_id in chain_ids {
            let Some(by_account) = self.balances.get(chain_id) else {
                continue;
            };
            for account in accounts {
                let Some(by_contract) = by_account.get(account) else {
                    continue;
                };
                let filtered: BTreeMap<Address, u128> = by_contract
                    .iter()
                    .filter(|(contract, _)| contracts.contains(contract))
                    .map(|(c, v)| (c.clone(), *v))
                    .collect();
                result
                    .entry(*chain_id)
                    .or_default()
                    .insert(account.clone(), filtered);
            }
        }
        Ok(result)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticCollectiblesOracle {
    collectibles: CollectiblesByChain,
}

impl StaticCollectiblesOracle {
    pub fn with_token(
        mut self,
        chain_id: u64,
        owner: &str,
        contract: &str,
        token_id: u64,
        balance: u128,
    ) -> Self {
        self.collectibles
            .entry(chain_id)
            .or_default()
            .entry(normalize_address(owner))
            .or_default()
            .entry(normalize_address(contract))
            .or_default()
            .push(TokenBalance { token_id, balance });
        self
    }
}

#[async_trait]
impl CollectiblesOracle for StaticCollectiblesOracle {
    async fn balances_by_owner_and_contract(
        &self,
        chain_id: u64,
        owner: &Address,
        contracts: &[Address],
    ) -> CommunityResult<BTreeMap<Address, Vec<TokenBalance>>> {
        Ok(self
            .collectibles
            .get(&chain_id)
            .and_then(|by_owner| by_owner.get(owner))
            .map(|by_contract| {
                by_contract
                    .iter()
                    .filter(|(contract, _)| contracts.contains(contract))
                    .map(|(c, b)| (c.clone(), b.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticEnsOracle {
    names: BTreeMap<Address, String>,
}

impl StaticEnsOracle {
    pub fn with_name(mut self, address: &str, name: &str) -> Self {
        self.names
            .insert(normalize_address(address), name.to_string());
        self
    }
}

#[async_trait]
impl EnsOracle for StaticEnsOracle {
    async fn reverse_resolve(&self, address: &Address) -> CommunityResult<Option<String>> {
        Ok(self.names.get(address).cloned())
    }
}
