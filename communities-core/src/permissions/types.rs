//! Oracle contracts and check results

use crate::description::{TokenCriteria, TokenPermissionType};
use crate::errors::CommunityResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lowercase `0x`-prefixed hex address of a wallet or contract
pub type Address = String;

/// chain id -> account -> contract -> raw balance
pub type BalancesByChain = BTreeMap<u64, BTreeMap<Address, BTreeMap<Address, u128>>>;

/// chain id -> account -> contract -> owned collectibles
pub type CollectiblesByChain = BTreeMap<u64, BTreeMap<Address, BTreeMap<Address, Vec<TokenBalance>>>>;

pub fn normalize_address(address: &str) -> Address {
    address.trim().to_ascii_lowercase()
}

/// Balance of a single collectible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub token_id: u64,
    pub balance: u128,
}

/// Fungible token balances
#[async_trait]
pub trait TokenBalanceOracle: Send + Sync {
    async fn all_chain_ids(&self) -> CommunityResult<Vec<u64>>;

    /// Only the requested chains are returned
    async fn balances_by_chain(
        &self,
        accounts: &[Address],
        contracts: &[Address],
        chain_ids: &[u64],
    ) -> CommunityResult<BalancesByChain>;
}

/// Collectible ownership
#[async_trait]
pub trait CollectiblesOracle: Send + Sync {
    async fn balances_by_owner_and_contract(
        &self,
        chain_id: u64,
        owner: &Address,
        contracts: &[Address],
    ) -> CommunityResult<BTreeMap<Address, Vec<TokenBalance>>>;
}

/// ENS reverse resolution
#[async_trait]
pub trait EnsOracle: Send + Sync {
    /// `None` when the address has no primary name
    async fn reverse_resolve(&self, address: &Address) -> CommunityResult<Option<String>>;
}

/// An account together with the chains it may be checked on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountChainIdsCombination {
    pub address: Address,
    pub chain_ids: Vec<u64>,
}

impl AccountChainIdsCombination {
    pub fn new(address: impl AsRef<str>, chain_ids: Vec<u64>) -> Self {
        Self {
            address: normalize_address(address.as_ref()),
            chain_ids,
        }
    }
}

/// Pair every address with every chain id
pub fn combine_addresses_and_chain_ids(
    addresses: &[Address],
    chain_ids: &[u64],
) -> Vec<AccountChainIdsCombination> {
    addresses
        .iter()
        .map(|a| AccountChainIdsCombination::new(a, chain_ids.to_vec()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequirementResponse {
    pub satisfied: bool,
    pub token_criteria: TokenCriteria,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTokenCriteriaResult {
    pub role: TokenPermissionType,
    pub token_requirements: Vec<TokenRequirementResponse>,
    /// One flag per criteria, in declaration order
    pub criteria: Vec<bool>,
}

impl PermissionTokenCriteriaResult {
    pub fn new(role: TokenPermissionType) -> Self {
        Self {
            role,
            token_requirements: Vec::new(),
            criteria: Vec::new(),
        }
    }

    pub fn push(&mut self, token_criteria: &TokenCriteria, satisfied: bool) {
        self.token_requirements.push(TokenRequirementResponse {
            satisfied,
            token_criteria: token_criteria.clone(),
        });
        self.criteria.push(satisfied);
    }

    pub fn is_satisfied(&self) -> bool {
        !self.criteria.is_empty() && self.criteria.iter().all(|c| *c)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPermissionsResponse {
    pub satisfied: bool,
    /// permission id -> per-criteria result
    pub permissions: BTreeMap<String, PermissionTokenCriteriaResult>,
    pub valid_combinations: Vec<AccountChainIdsCombination>,
    pub networks_not_supported: bool,
}

impl CheckPermissionsResponse {
    /// Permissions are ORed, an empty set is satisfied
    pub(crate) fn calculate_satisfied(&mut self) {
        self.satisfied = self.permissions.is_empty()
            || self.permissions.values().any(|p| p.is_satisfied());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPermissionsResult {
    pub satisfied: bool,
    pub permissions: BTreeMap<String, PermissionTokenCriteriaResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckChannelPermissionsResponse {
    pub view_only: ChannelPermissionsResult,
    pub view_and_post: ChannelPermissionsResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionedBalance {
    pub token_type: crate::description::TokenType,
    pub symbol: String,
    pub name: String,
    pub amount: u128,
    pub decimals: u64,
}
