//! Token-gated permission evaluation
//!
//! A [`TokenPermission`](crate::description::TokenPermission) lists token
//! criteria that a member's revealed accounts must satisfy. Balances, owned
//! collectibles and ENS names come from oracles so this module never talks
//! to a chain directly.

mod balances;
mod checker;
mod types;

pub use checker::{
    merge_valid_combinations, DefaultPermissionChecker, PermissionChecker, ETHEREUM_MAINNET,
};
pub use types::{
    combine_addresses_and_chain_ids, normalize_address, AccountChainIdsCombination, Address,
    BalancesByChain, ChannelPermissionsResult, CheckChannelPermissionsResponse,
    CheckPermissionsResponse, CollectiblesByChain, CollectiblesOracle, EnsOracle,
    PermissionTokenCriteriaResult, PermissionedBalance, TokenBalance, TokenBalanceOracle,
    TokenRequirementResponse,
};
