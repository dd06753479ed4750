//! Balances relevant to a community's role permissions

use super::checker::{chain_ids_set, extract_token_criteria, DefaultPermissionChecker};
use super::types::{
    combine_addresses_and_chain_ids, normalize_address, Address, BalancesByChain,
    CollectiblesByChain, PermissionedBalance, TokenBalance,
};
use crate::description::{CommunityDescription, TokenCriteria, TokenPermission, TokenType};
use crate::errors::CommunityResult;
use std::collections::{BTreeMap, BTreeSet};

type BalancesBySymbol = BTreeMap<Address, BTreeMap<String, PermissionedBalance>>;

fn keep_role_token_permissions(description: &CommunityDescription) -> Vec<TokenPermission> {
    description
        .token_permissions
        .values()
        .filter(|p| p.permission_type.is_role_permission())
        .cloned()
        .collect()
}

fn empty_balance(criteria: &TokenCriteria) -> PermissionedBalance {
    PermissionedBalance {
        token_type: criteria.token_type,
        symbol: criteria.symbol.clone(),
        name: criteria.name.clone(),
        amount: 0,
        decimals: criteria.decimals,
    }
}

/// Iterate criteria of one token type, visiting each chain/account/contract
/// triple once across all permissions
fn for_each_unique<'a>(
    accounts: &'a [Address],
    permissions: &'a [TokenPermission],
    token_type: TokenType,
    mut f: impl FnMut(&'a TokenCriteria, u64, &'a Address, Address),
) {
    let mut used = BTreeSet::new();
    for criteria in permissions
        .iter()
        .flat_map(|p| p.token_criteria.iter())
        .filter(|c| c.token_type == token_type)
    {
        for account in accounts {
            for (chain_id, contract) in &criteria.contract_addresses {
                let contract = normalize_address(contract);
                if used.contains(&(*chain_id, account, contract.clone())) {
                    continue;
                }
                used.insert((*chain_id, account, contract.clone()));
                f(criteria, *chain_id, account, contract);
            }
        }
    }
}

/// Sum fungible balances per account and symbol
pub(crate) fn permissioned_balances_erc20(
    accounts: &[Address],
    balances: &BalancesByChain,
    permissions: &[TokenPermission],
) -> BalancesBySymbol {
    let mut result = BalancesBySymbol::new();
    for_each_unique(accounts, permissions, TokenType::Erc20, |criteria, chain_id, account, contract| {
        let Some(value) = balances
            .get(&chain_id)
            .and_then(|by_account| by_account.get(account))
            .and_then(|by_contract| by_contract.get(&contract))
        else {
            return;
        };
        let entry = result
            .entry(account.clone())
            .or_default()
            .entry(criteria.symbol.clone())
            .or_insert_with(|| empty_balance(criteria));
        entry.amount = entry.amount.saturating_add(*value);
    });
    result
}

fn erc721_criteria_satisfied(balances: &[TokenBalance], criteria: &TokenCriteria) -> bool {
    criteria.token_ids.is_empty()
        || criteria
            .token_ids
            .iter()
            .any(|id| balances.iter().any(|b| b.token_id == *id && b.balance > 0))
}

/// Collectibles are reported as 1 once the criteria is met
pub(crate) fn permissioned_balances_erc721(
    accounts: &[Address],
    collectibles: &CollectiblesByChain,
    permissions: &[TokenPermission],
) -> BalancesBySymbol {
    let mut result = BalancesBySymbol::new();
    for_each_unique(accounts, permissions, TokenType::Erc721, |criteria, chain_id, account, contract| {
        let Some(balances) = collectibles
            .get(&chain_id)
            .and_then(|by_account| by_account.get(account))
            .and_then(|by_contract| by_contract.get(&contract))
            .filter(|b| !b.is_empty())
        else {
            return;
        };
        let entry = result
            .entry(account.clone())
            .or_default()
            .entry(criteria.symbol.clone())
            .or_insert_with(|| empty_balance(criteria));
        if erc721_criteria_satisfied(balances, criteria) {
            entry.amount = 1;
        }
    });
    result
}

/// Collectibles first, then fungible tokens, dropping zero amounts
pub(crate) fn merge_permissioned_balances(
    erc721: BalancesBySymbol,
    erc20: BalancesBySymbol,
) -> BTreeMap<Address, Vec<PermissionedBalance>> {
    let mut result: BTreeMap<Address, Vec<PermissionedBalance>> = BTreeMap::new();
    for (account, tokens) in erc721.into_iter().chain(erc20) {
        for balance in tokens.into_values().filter(|b| b.amount > 0) {
            result.entry(account.clone()).or_default().push(balance);
        }
    }
    result
}

impl DefaultPermissionChecker {
    /// Balances per account for the tokens used by role permissions.
    /// Same-symbol balances on different chains are summed.
    pub async fn permissioned_balances(
        &self,
        description: &CommunityDescription,
        addresses: &[Address],
    ) -> CommunityResult<BTreeMap<Address, Vec<PermissionedBalance>>> {
        let permissions = keep_role_token_permissions(description);
        let accounts: Vec<Address> = addresses.iter().map(|a| normalize_address(a)).collect();

        let all_chain_ids = self.token_oracle().all_chain_ids().await?;
        let accounts_and_chain_ids = combine_addresses_and_chain_ids(&accounts, &all_chain_ids);

        let (erc20_requirements, erc721_requirements) = extract_token_criteria(&permissions);
        let erc20_contracts: Vec<Address> = erc20_requirements
            .values()
            .flat_map(|c| c.keys().cloned())
            .collect();

        let erc20_chain_ids = chain_ids_set(
            &accounts_and_chain_ids,
            &erc20_requirements.keys().copied().collect(),
        );
        let erc721_chain_ids = chain_ids_set(
            &accounts_and_chain_ids,
            &erc721_requirements.keys().copied().collect(),
        );

        let erc20_balances = if erc20_chain_ids.is_empty() {
            BalancesByChain::new()
        } else {
            self.token_oracle()
                .balances_by_chain(&accounts, &erc20_contracts, &erc20_chain_ids)
                .await?
        };

        let erc721_balances = if erc721_chain_ids.is_empty() {
            CollectiblesByChain::new()
        } else {
            self.owned_erc721_tokens(&accounts, &erc721_requirements, &erc721_chain_ids)
                .await?
        };

        Ok(merge_permissioned_balances(
            permissioned_balances_erc721(&accounts, &erc721_balances, &permissions),
            permissioned_balances_erc20(&accounts, &erc20_balances, &permissions),
        ))
    }
}
