//! Token criteria evaluation against oracle balances

use super::types::{
    combine_addresses_and_chain_ids, normalize_address, AccountChainIdsCombination, Address,
    BalancesByChain, ChannelPermissionsResult, CheckChannelPermissionsResponse,
    CheckPermissionsResponse, CollectiblesByChain, CollectiblesOracle, EnsOracle,
    PermissionTokenCriteriaResult, TokenBalance, TokenBalanceOracle,
};
use crate::description::{
    CommunityDescription, TokenCriteria, TokenPermission, TokenPermissionType, TokenType,
    ValidationError,
};
use crate::errors::{CommunityError, CommunityResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// ENS names always live on mainnet
pub const ETHEREUM_MAINNET: u64 = 1;

/// chain id -> contract address -> criteria
pub(crate) type CriteriaByChain = BTreeMap<u64, BTreeMap<Address, TokenCriteria>>;

#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Criteria of a permission are ANDed, permissions are ORed. With
    /// `shortcircuit` the check stops at the first satisfied permission.
    async fn check_permissions(
        &self,
        permissions: &[TokenPermission],
        accounts_and_chain_ids: &[AccountChainIdsCombination],
        shortcircuit: bool,
    ) -> CommunityResult<CheckPermissionsResponse>;

    async fn check_permission_to_join(
        &self,
        description: &CommunityDescription,
        addresses: &[Address],
    ) -> CommunityResult<CheckPermissionsResponse>;

    /// View-and-post implies view-only, and view-only failing blocks posting
    async fn check_channel_permissions(
        &self,
        view_only: &[TokenPermission],
        view_and_post: &[TokenPermission],
        accounts_and_chain_ids: &[AccountChainIdsCombination],
        shortcircuit: bool,
    ) -> CommunityResult<CheckChannelPermissionsResponse> {
        let view_only_response = self
            .check_permissions(view_only, accounts_and_chain_ids, shortcircuit)
            .await?;
        let view_and_post_response = self
            .check_permissions(view_and_post, accounts_and_chain_ids, shortcircuit)
            .await?;

        let has_view_only = !view_only.is_empty();
        let has_view_and_post = !view_and_post.is_empty();

        let view_only_satisfied = if (has_view_and_post && !has_view_only)
            || (has_view_only && has_view_and_post && view_and_post_response.satisfied)
        {
            view_and_post_response.satisfied
        } else {
            view_only_response.satisfied
        };

        let view_and_post_satisfied = if has_view_only
            && (!view_only_response.satisfied || !has_view_and_post)
        {
            false
        } else {
            view_and_post_response.satisfied
        };

        Ok(CheckChannelPermissionsResponse {
            view_only: ChannelPermissionsResult {
                satisfied: view_only_satisfied,
                permissions: view_only_response.permissions,
            },
            view_and_post: ChannelPermissionsResult {
                satisfied: view_and_post_satisfied,
                permissions: view_and_post_response.permissions,
            },
        })
    }
}

/// Split ERC20 and ERC721 criteria by chain and contract
pub(crate) fn extract_token_criteria(
    permissions: &[TokenPermission],
) -> (CriteriaByChain, CriteriaByChain) {
    let mut erc20 = CriteriaByChain::new();
    let mut erc721 = CriteriaByChain::new();

    for criteria in permissions.iter().flat_map(|p| p.token_criteria.iter()) {
        let target = match criteria.token_type {
            TokenType::Erc20 => &mut erc20,
            TokenType::Erc721 => &mut erc721,
            _ => continue,
        };
        for (chain_id, contract) in &criteria.contract_addresses {
            target
                .entry(*chain_id)
                .or_default()
                .insert(normalize_address(contract), criteria.clone());
        }
    }
    (erc20, erc721)
}

/// Chain ids revealed by the accounts that the requirements also use
pub(crate) fn chain_ids_set(
    accounts_and_chain_ids: &[AccountChainIdsCombination],
    requirement_chain_ids: &BTreeSet<u64>,
) -> Vec<u64> {
    let mut seen = BTreeSet::new();
    accounts_and_chain_ids
        .iter()
        .flat_map(|a| a.chain_ids.iter().copied())
        .filter(|id| requirement_chain_ids.contains(id) && seen.insert(*id))
        .collect()
}

/// Merge two combination lists, appending chains the left side lacks
pub fn merge_valid_combinations(
    left: &[AccountChainIdsCombination],
    right: &[AccountChainIdsCombination],
) -> Vec<AccountChainIdsCombination> {
    let mut merged: BTreeMap<Address, Vec<u64>> = left
        .iter()
        .map(|c| (c.address.clone(), c.chain_ids.clone()))
        .collect();

    for combination in right {
        let chains = merged.entry(combination.address.clone()).or_default();
        for chain_id in &combination.chain_ids {
            if !chains.contains(chain_id) {
                chains.push(*chain_id);
            }
        }
    }

    merged
        .into_iter()
        .map(|(address, chain_ids)| AccountChainIdsCombination { address, chain_ids })
        .collect()
}

fn parse_amount(criteria: &TokenCriteria) -> CommunityResult<f64> {
    criteria.amount.trim().parse::<f64>().map_err(|_| {
        CommunityError::InvalidDescription(ValidationError::InvalidTokenPermission {
            id: criteria.symbol.clone(),
            reason: format!("invalid amount {:?}", criteria.amount),
        })
    })
}

fn erc721_owned(balances: &[TokenBalance], token_ids: &[u64]) -> bool {
    if token_ids.is_empty() {
        return !balances.is_empty();
    }
    token_ids
        .iter()
        .any(|id| balances.iter().any(|b| b.token_id == *id && b.balance > 0))
}

fn ens_matches(pattern: &str, owned: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(parent) => owned.ends_with(parent),
        None => owned == pattern,
    }
}

/// Evaluates permissions with balances from the configured oracles
#[derive(Clone)]
pub struct DefaultPermissionChecker {
    token_oracle: Arc<dyn TokenBalanceOracle>,
    collectibles_oracle: Option<Arc<dyn CollectiblesOracle>>,
    ens_oracle: Option<Arc<dyn EnsOracle>>,
}

impl std::fmt::Debug for DefaultPermissionChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultPermissionChecker")
            .field("collectibles", &self.collectibles_oracle.is_some())
            .field("ens", &self.ens_oracle.is_some())
            .finish()
    }
}

impl DefaultPermissionChecker {
    pub fn new(token_oracle: Arc<dyn TokenBalanceOracle>) -> Self {
        Self {
            token_oracle,
            collectibles_oracle: None,
            ens_oracle: None,
        }
    }

    pub fn with_collectibles(mut self, oracle: Arc<dyn CollectiblesOracle>) -> Self {
        self.collectibles_oracle = Some(oracle);
        self
    }

    pub fn with_ens(mut self, oracle: Arc<dyn EnsOracle>) -> Self {
        self.ens_oracle = Some(oracle);
        self
    }

    pub(crate) fn token_oracle(&self) -> &Arc<dyn TokenBalanceOracle> {
        &self.token_oracle
    }

    pub async fn all_chain_ids(&self) -> CommunityResult<Vec<u64>> {
        self.token_oracle.all_chain_ids().await
    }

    async fn owned_ens(&self, address: &Address) -> CommunityResult<Vec<String>> {
        let Some(oracle) = &self.ens_oracle else {
            warn!("no ENS oracle configured");
            return Ok(Vec::new());
        };
        Ok(oracle.reverse_resolve(address).await?.into_iter().collect())
    }

    /// Collectibles per requested chain and owner
    pub(crate) async fn owned_erc721_tokens(
        &self,
        accounts: &[Address],
        requirements: &CriteriaByChain,
        chain_ids: &[u64],
    ) -> CommunityResult<CollectiblesByChain> {
        let oracle = self
            .collectibles_oracle
            .as_ref()
            .ok_or_else(|| CommunityError::Oracle("no collectibles oracle".to_string()))?;

        let mut owned = CollectiblesByChain::new();
        for (chain_id, contracts) in requirements {
            if !chain_ids.contains(chain_id) {
                continue;
            }
            let contracts: Vec<Address> = contracts.keys().cloned().collect();
            let by_owner = owned.entry(*chain_id).or_default();
            for owner in accounts {
                let balances = oracle
                    .balances_by_owner_and_contract(*chain_id, owner, &contracts)
                    .await
                    .inspect_err(|e| debug!(chain_id, owner = %owner, error = %e, "couldn't fetch owner assets"))?;
                by_owner.insert(owner.clone(), balances);
            }
        }
        Ok(owned)
    }

    /// Permissions to join: member permissions, or the community default
    /// when there are none, merged with admin and token master permissions
    async fn check_permissions_or_default(
        &self,
        permissions: &[TokenPermission],
        accounts_and_chain_ids: &[AccountChainIdsCombination],
    ) -> CommunityResult<CheckPermissionsResponse> {
        if permissions.is_empty() {
            return Ok(CheckPermissionsResponse {
                satisfied: true,
                valid_combinations: accounts_and_chain_ids.to_vec(),
                ..Default::default()
            });
        }
        self.check_permissions(permissions, accounts_and_chain_ids, false)
            .await
    }
}

#[async_trait]
impl PermissionChecker for DefaultPermissionChecker {
    async fn check_permissions(
        &self,
        permissions: &[TokenPermission],
        accounts_and_chain_ids: &[AccountChainIdsCombination],
        shortcircuit: bool,
    ) -> CommunityResult<CheckPermissionsResponse> {
        let mut response = CheckPermissionsResponse::default();

        let (erc20_requirements, erc721_requirements) = extract_token_criteria(permissions);
        let accounts: Vec<Address> = accounts_and_chain_ids
            .iter()
            .map(|a| a.address.clone())
            .collect();

        let erc20_chains: BTreeSet<u64> = erc20_requirements.keys().copied().collect();
        let erc721_chains: BTreeSet<u64> = erc721_requirements.keys().copied().collect();
        let erc20_contracts: Vec<Address> = erc20_requirements
            .values()
            .flat_map(|c| c.keys().cloned())
            .collect();

        let chain_ids_for_erc20 = chain_ids_set(accounts_and_chain_ids, &erc20_chains);
        let chain_ids_for_erc721 = chain_ids_set(accounts_and_chain_ids, &erc721_chains);

        if !erc20_chains.is_empty() && chain_ids_for_erc20.is_empty() {
            response.networks_not_supported = true;
            return Ok(response);
        }

        let erc20_balances = if chain_ids_for_erc20.is_empty() {
            BalancesByChain::new()
        } else {
            self.token_oracle
                .balances_by_chain(&accounts, &erc20_contracts, &chain_ids_for_erc20)
                .await?
        };

        let erc721_tokens = if chain_ids_for_erc721.is_empty() {
            CollectiblesByChain::new()
        } else {
            self.owned_erc721_tokens(&accounts, &erc721_requirements, &chain_ids_for_erc721)
                .await?
        };

        let mut combinations: BTreeMap<Address, BTreeSet<u64>> = BTreeMap::new();

        for permission in permissions {
            let mut result = PermissionTokenCriteriaResult::new(permission.permission_type);
            let mut permission_met = true;

            for criteria in &permission.token_criteria {
                let met = match criteria.token_type {
                    TokenType::Erc721 => {
                        if erc721_tokens.is_empty() {
                            result.push(criteria, false);
                            permission_met = false;
                            continue;
                        }
                        check_erc721(criteria, &erc721_tokens, &mut combinations)
                    }
                    TokenType::Erc20 => {
                        if erc20_balances.is_empty() {
                            result.push(criteria, false);
                            permission_met = false;
                            continue;
                        }
                        check_erc20(criteria, &erc20_balances, shortcircuit, &mut combinations)?
                    }
                    TokenType::Ens => {
                        let mut met = false;
                        for account in &accounts {
                            let owned = self.owned_ens(account).await?;
                            let chains = combinations.entry(account.clone()).or_default();
                            if owned.iter().any(|name| ens_matches(&criteria.ens_pattern, name)) {
                                met = true;
                                chains.insert(ETHEREUM_MAINNET);
                            }
                        }
                        met
                    }
                    TokenType::Unknown => false,
                };

                permission_met &= met;
                result.push(criteria, met);
            }

            response.permissions.insert(permission.id.clone(), result);

            if shortcircuit && permission_met {
                break;
            }
        }

        response.valid_combinations = combinations
            .into_iter()
            .map(|(address, chains)| AccountChainIdsCombination {
                address,
                chain_ids: chains.into_iter().collect(),
            })
            .collect();
        response.calculate_satisfied();

        Ok(response)
    }

    async fn check_permission_to_join(
        &self,
        description: &CommunityDescription,
        addresses: &[Address],
    ) -> CommunityResult<CheckPermissionsResponse> {
        let by_type = |t: TokenPermissionType| -> Vec<TokenPermission> {
            description
                .token_permissions_by_type(t)
                .into_iter()
                .cloned()
                .collect()
        };
        let member_permissions = by_type(TokenPermissionType::BecomeMember);
        let mut privileged_permissions = by_type(TokenPermissionType::BecomeAdmin);
        privileged_permissions.extend(by_type(TokenPermissionType::BecomeTokenMaster));

        let all_chain_ids = self.token_oracle.all_chain_ids().await?;
        let accounts_and_chain_ids = combine_addresses_and_chain_ids(addresses, &all_chain_ids);

        let member_response = self
            .check_permissions_or_default(&member_permissions, &accounts_and_chain_ids)
            .await?;
        if privileged_permissions.is_empty() {
            return Ok(member_response);
        }

        let privileged_response = self
            .check_permissions(&privileged_permissions, &accounts_and_chain_ids, false)
            .await?;

        let mut permissions = member_response.permissions;
        permissions.extend(privileged_response.permissions);

        Ok(CheckPermissionsResponse {
            satisfied: member_response.satisfied || privileged_response.satisfied,
            permissions,
            valid_combinations: merge_valid_combinations(
                &member_response.valid_combinations,
                &privileged_response.valid_combinations,
            ),
            networks_not_supported: false,
        })
    }
}

fn check_erc721(
    criteria: &TokenCriteria,
    owned: &CollectiblesByChain,
    combinations: &mut BTreeMap<Address, BTreeSet<u64>>,
) -> bool {
    let mut met = false;
    for (chain_id, contract) in &criteria.contract_addresses {
        let Some(by_owner) = owned.get(chain_id) else {
            continue;
        };
        let contract = normalize_address(contract);
        for (account, by_contract) in by_owner {
            let Some(balances) = by_contract.get(&contract).filter(|b| !b.is_empty()) else {
                continue;
            };
            let chains = combinations.entry(account.clone()).or_default();
            if erc721_owned(balances, &criteria.token_ids) {
                chains.insert(*chain_id);
                met = true;
                if criteria.token_ids.is_empty() {
                    return true;
                }
            }
        }
    }
    met
}

fn check_erc20(
    criteria: &TokenCriteria,
    balances: &BalancesByChain,
    shortcircuit: bool,
    combinations: &mut BTreeMap<Address, BTreeSet<u64>>,
) -> CommunityResult<bool> {
    let required = parse_amount(criteria)?;
    let scale = 10f64.powi(criteria.decimals.min(i32::MAX as u64) as i32);
    let mut accumulated = 0f64;
    let mut met = false;

    for (chain_id, contract) in &criteria.contract_addresses {
        let Some(by_account) = balances.get(chain_id) else {
            continue;
        };
        let contract = normalize_address(contract);
        for (account, by_contract) in by_account {
            let Some(value) = by_contract.get(&contract) else {
                continue;
            };
            let balance = *value as f64 / scale;

            let chains = combinations.entry(account.clone()).or_default();
            if balance > 0.0 {
                chains.insert(*chain_id);
            }

            accumulated += balance;
            if accumulated >= required {
                met = true;
                if shortcircuit {
                    return Ok(true);
                }
            }
        }
    }
    Ok(met)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        ens_criteria, erc20_criteria, erc721_criteria, permission_with_criteria,
        StaticCollectiblesOracle, StaticEnsOracle, StaticTokenOracle,
    };

    const ALICE: &str = "0x00000000000000000000000000000000000000a1";
    const BOB: &str = "0x00000000000000000000000000000000000000b2";
    const SNT: &str = "0x0000000000000000000000000000000000005a7e";
    const NFT: &str = "0x00000000000000000000000000000000000000f7";

    fn accounts(chains: &[u64]) -> Vec<AccountChainIdsCombination> {
        vec![
            AccountChainIdsCombination::new(ALICE, chains.to_vec()),
            AccountChainIdsCombination::new(BOB, chains.to_vec()),
        ]
    }

    #[tokio::test]
    async fn test_erc20_sums_across_accounts_and_chains() {
        let oracle = StaticTokenOracle::new(vec![1, 10])
            .with_balance(1, ALICE, SNT, 6_000)
            .with_balance(10, BOB, SNT, 4_000);
        let checker = DefaultPermissionChecker::new(Arc::new(oracle));

        let mut criteria = erc20_criteria(1, SNT, "10", 3);
        criteria.contract_addresses.insert(10, SNT.to_string());
        let permission = permission_with_criteria("p", TokenPermissionType::BecomeMember, vec![criteria]);

        let response = checker
            .check_permissions(&[permission], &accounts(&[1, 10]), false)
            .await
            .unwrap();
        assert!(response.satisfied);
        assert_eq!(response.permissions["p"].criteria, vec![true]);
        assert_eq!(response.valid_combinations.len(), 2);
    }

    #[tokio::test]
    async fn test_erc20_insufficient_balance() {
        let oracle = StaticTokenOracle::new(vec![1]).with_balance(1, ALICE, SNT, 9);
        let checker = DefaultPermissionChecker::new(Arc::new(oracle));
        let permission = permission_with_criteria(
            "p",
            TokenPermissionType::BecomeMember,
            vec![erc20_criteria(1, SNT, "10", 0)],
        );

        let response = checker
            .check_permissions(&[permission], &accounts(&[1]), false)
            .await
            .unwrap();
        assert!(!response.satisfied);
    }

    #[tokio::test]
    async fn test_networks_not_supported() {
        let checker = DefaultPermissionChecker::new(Arc::new(StaticTokenOracle::new(vec![1])));
        let permission = permission_with_criteria(
            "p",
            TokenPermissionType::BecomeMember,
            vec![erc20_criteria(137, SNT, "1", 0)],
        );

        let response = checker
            .check_permissions(&[permission], &accounts(&[1]), false)
            .await
            .unwrap();
        assert!(response.networks_not_supported);
        assert!(!response.satisfied);
    }

    #[tokio::test]
    async fn test_erc721_token_ids() {
        let collectibles = StaticCollectiblesOracle::default().with_token(1, ALICE, NFT, 7, 1);
        let checker = DefaultPermissionChecker::new(Arc::new(StaticTokenOracle::new(vec![1])))
            .with_collectibles(Arc::new(collectibles));

        let wanted = permission_with_criteria(
            "wanted",
            TokenPermissionType::BecomeMember,
            vec![erc721_criteria(1, NFT, vec![7])],
        );
        let other = permission_with_criteria(
            "other",
            TokenPermissionType::BecomeMember,
            vec![erc721_criteria(1, NFT, vec![8])],
        );

        let response = checker
            .check_permissions(&[other.clone()], &accounts(&[1]), false)
            .await
            .unwrap();
        assert!(!response.satisfied);

        let response = checker
            .check_permissions(&[other, wanted], &accounts(&[1]), false)
            .await
            .unwrap();
        assert!(response.satisfied);
        assert_eq!(
            response.valid_combinations,
            vec![AccountChainIdsCombination::new(ALICE, vec![1])]
        );
    }

    #[tokio::test]
    async fn test_ens_pattern() {
        let ens = StaticEnsOracle::default().with_name(BOB, "bob.status.eth");
        let checker = DefaultPermissionChecker::new(Arc::new(StaticTokenOracle::new(vec![1])))
            .with_ens(Arc::new(ens));

        for (pattern, expected) in [
            ("*.status.eth", true),
            ("bob.status.eth", true),
            ("alice.status.eth", false),
        ] {
            let permission = permission_with_criteria(
                "ens",
                TokenPermissionType::BecomeMember,
                vec![ens_criteria(pattern)],
            );
            let response = checker
                .check_permissions(&[permission], &accounts(&[1]), false)
                .await
                .unwrap();
            assert_eq!(response.satisfied, expected, "pattern {pattern}");
        }
    }

    #[tokio::test]
    async fn test_criteria_are_anded() {
        let oracle = StaticTokenOracle::new(vec![1]).with_balance(1, ALICE, SNT, 100);
        let checker = DefaultPermissionChecker::new(Arc::new(oracle))
            .with_ens(Arc::new(StaticEnsOracle::default()));
        let permission = permission_with_criteria(
            "p",
            TokenPermissionType::BecomeMember,
            vec![erc20_criteria(1, SNT, "1", 0), ens_criteria("*.eth")],
        );

        let response = checker
            .check_permissions(&[permission], &accounts(&[1]), false)
            .await
            .unwrap();
        assert!(!response.satisfied);
        assert_eq!(response.permissions["p"].criteria, vec![true, false]);
    }

    #[tokio::test]
    async fn test_join_without_member_permissions_reveals_everything() {
        let checker = DefaultPermissionChecker::new(Arc::new(StaticTokenOracle::new(vec![1, 10])));
        let description = CommunityDescription::default();

        let response = checker
            .check_permission_to_join(&description, &[ALICE.to_string()])
            .await
            .unwrap();
        assert!(response.satisfied);
        assert_eq!(
            response.valid_combinations,
            vec![AccountChainIdsCombination::new(ALICE, vec![1, 10])]
        );
    }

    #[tokio::test]
    async fn test_join_merges_admin_permissions() {
        let oracle = StaticTokenOracle::new(vec![1]).with_balance(1, ALICE, SNT, 100);
        let checker = DefaultPermissionChecker::new(Arc::new(oracle))
            .with_collectibles(Arc::new(StaticCollectiblesOracle::default()));

        let mut description = CommunityDescription::default();
        for permission in [
            permission_with_criteria(
                "member",
                TokenPermissionType::BecomeMember,
                vec![erc721_criteria(1, NFT, vec![])],
            ),
            permission_with_criteria(
                "admin",
                TokenPermissionType::BecomeAdmin,
                vec![erc20_criteria(1, SNT, "50", 0)],
            ),
        ] {
            description
                .token_permissions
                .insert(permission.id.clone(), permission);
        }

        let response = checker
            .check_permission_to_join(&description, &[ALICE.to_string()])
            .await
            .unwrap();
        assert!(response.satisfied);
        assert!(!response.permissions["member"].is_satisfied());
        assert!(response.permissions["admin"].is_satisfied());
    }

    #[tokio::test]
    async fn test_channel_view_and_post_rules() {
        let oracle = StaticTokenOracle::new(vec![1]).with_balance(1, ALICE, SNT, 100);
        let checker = DefaultPermissionChecker::new(Arc::new(oracle));
        let post = permission_with_criteria(
            "post",
            TokenPermissionType::CanViewAndPostChannel,
            vec![erc20_criteria(1, SNT, "10", 0)],
        );
        let view = permission_with_criteria(
            "view",
            TokenPermissionType::CanViewChannel,
            vec![erc20_criteria(1, SNT, "1000", 0)],
        );

        let response = checker
            .check_channel_permissions(&[], &[post.clone()], &accounts(&[1]), false)
            .await
            .unwrap();
        assert!(response.view_only.satisfied);
        assert!(response.view_and_post.satisfied);

        let response = checker
            .check_channel_permissions(&[view], &[post], &accounts(&[1]), false)
            .await
            .unwrap();
        assert!(response.view_only.satisfied);
        assert!(!response.view_and_post.satisfied);
    }

    #[test]
    fn test_merge_valid_combinations() {
        let left = vec![AccountChainIdsCombination::new(ALICE, vec![1])];
        let right = vec![
            AccountChainIdsCombination::new(ALICE, vec![1, 10]),
            AccountChainIdsCombination::new(BOB, vec![5]),
        ];
        let merged = merge_valid_combinations(&left, &right);
        assert_eq!(
            merged,
            vec![
                AccountChainIdsCombination::new(ALICE, vec![1, 10]),
                AccountChainIdsCombination::new(BOB, vec![5]),
            ]
        );
    }

    #[test]
    fn test_chain_ids_set_keeps_first_seen_order() {
        let requirements: BTreeSet<u64> = [10, 1].into_iter().collect();
        let chains = chain_ids_set(&accounts(&[10, 5, 1]), &requirements);
        assert_eq!(chains, vec![10, 1]);
    }
}
