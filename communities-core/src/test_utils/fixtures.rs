//! Test fixtures for creating common test objects
//!
//! Provides builder patterns and factory functions for creating test data.

use super::deterministic_rng::test_rng_with_seed;
use crate::community::{Community, CommunityConfig, CommunityState, ManualTimeSource};
use crate::crypto::{PrivateKey, PublicKey};
use crate::description::{
    wrap_description, AccessType, CommunityBanInfo, CommunityCategory, CommunityChat,
    CommunityDescription, CommunityMember, CommunityPermissions, MemberRole, TokenCriteria,
    TokenPermission, TokenPermissionType, TokenType,
};
use rand::RngCore;
use std::sync::Arc;

/// Builder for a community seen from the control node or from one member
///
/// Both views built from clones of the same builder share the description,
/// so messages produced by one are accepted by the other.
#[derive(Clone)]
pub struct TestCommunityBuilder {
    community_key: PrivateKey,
    access: AccessType,
    clock: u64,
    time: u64,
    time_source: Option<Arc<ManualTimeSource>>,
    members: Vec<(String, Vec<MemberRole>)>,
    categories: Vec<(String, String)>,
    chats: Vec<(String, CommunityChat)>,
    token_permissions: Vec<TokenPermission>,
    banned: Vec<String>,
    view: Option<PrivateKey>,
}

impl TestCommunityBuilder {
    pub fn new() -> Self {
        Self {
            community_key: PrivateKey::generate(),
            access: AccessType::AutoAccept,
            clock: 1,
            time: 1_000,
            time_source: None,
            members: Vec::new(),
            categories: Vec::new(),
            chats: Vec::new(),
            token_permissions: Vec::new(),
            banned: Vec::new(),
            view: None,
        }
    }

    pub fn with_community_key(mut self, key: PrivateKey) -> Self {
        self.community_key = key;
        self
    }

    pub fn with_access(mut self, access: AccessType) -> Self {
        self.access = access;
        self
    }

    pub fn with_member(mut self, key: &str, roles: Vec<MemberRole>) -> Self {
        self.members.push((key.to_string(), roles));
        self
    }

    pub fn with_category(mut self, category_id: &str, name: &str) -> Self {
        self.categories
            .push((category_id.to_string(), name.to_string()));
        self
    }

    /// Chats without members get every community member
    pub fn with_chat(mut self, channel_id: &str, chat: CommunityChat) -> Self {
        self.chats.push((channel_id.to_string(), chat));
        self
    }

    pub fn with_token_permission(mut self, permission: TokenPermission) -> Self {
        self.token_permissions.push(permission);
        self
    }

    pub fn with_banned(mut self, key: &str) -> Self {
        self.banned.push(key.to_string());
        self
    }

    /// Clock of the initial description
    pub fn with_clock(mut self, clock: u64) -> Self {
        self.clock = clock;
        self
    }

    /// Seconds returned by the community time source
    pub fn with_time(mut self, now: u64) -> Self {
        self.time = now;
        self
    }

    pub fn with_time_source(mut self, time_source: Arc<ManualTimeSource>) -> Self {
        self.time_source = Some(time_source);
        self
    }

    /// Add a fresh member with `role` and view the community as them
    pub fn as_member_with_role(self, role: MemberRole) -> Self {
        let key = PrivateKey::generate();
        let roles = if role == MemberRole::None {
            Vec::new()
        } else {
            vec![role]
        };
        self.with_member(&key.public_key().to_hex(), roles)
            .as_member(&key)
    }

    /// View the community as a member added earlier
    pub fn as_member(mut self, key: &PrivateKey) -> Self {
        self.view = Some(key.clone());
        self
    }

    pub fn community_key(&self) -> &PrivateKey {
        &self.community_key
    }

    pub fn community_id(&self) -> PublicKey {
        self.community_key.public_key()
    }

    /// The member key of the current view
    pub fn view_key(&self) -> &PrivateKey {
        self.view.as_ref().unwrap_or(&self.community_key)
    }

    pub fn description(&self) -> CommunityDescription {
        let owner = self.community_key.public_key().to_hex();
        let mut description = CommunityDescription {
            clock: self.clock,
            id: self.community_key.public_key().to_compressed_hex(),
            permissions: Some(CommunityPermissions::new(self.access)),
            ..Default::default()
        };

        description
            .members
            .insert(owner, CommunityMember::with_roles(vec![MemberRole::Owner]));
        for (key, roles) in &self.members {
            description
                .members
                .insert(key.clone(), CommunityMember::with_roles(roles.clone()));
        }

        for (position, (category_id, name)) in self.categories.iter().enumerate() {
            description.categories.insert(
                category_id.clone(),
                CommunityCategory {
                    category_id: category_id.clone(),
                    name: name.clone(),
                    position: position as i32,
                },
            );
        }

        for (channel_id, chat) in &self.chats {
            let mut chat = chat.clone();
            if chat.members.is_empty() {
                chat.members = description
                    .members
                    .keys()
                    .map(|k| (k.clone(), CommunityMember::default()))
                    .collect();
            }
            chat.position = description.category_chat_count(&chat.category_id) as i32;
            description.chats.insert(channel_id.clone(), chat);
        }

        for permission in &self.token_permissions {
            description
                .token_permissions
                .insert(permission.id.clone(), permission.clone());
        }

        for key in &self.banned {
            description
                .banned_members
                .insert(key.clone(), CommunityBanInfo::default());
        }

        description
    }

    pub fn build_state(&self) -> CommunityState {
        self.build().snapshot()
    }

    pub fn build(&self) -> Community {
        let description = self.description();
        let id = self.community_key.public_key();
        let time_source = self
            .time_source
            .clone()
            .unwrap_or_else(|| Arc::new(ManualTimeSource::new(self.time)));

        let mut config = match &self.view {
            None => {
                let mut config = CommunityConfig::new(id, id, description);
                config.private_key = Some(self.community_key.clone());
                config.control_device = true;
                config
            }
            Some(member) => {
                let description_message = wrap_description(&description, &self.community_key)
                    .expect("sign test description");
                let mut config = CommunityConfig::new(id, member.public_key(), description);
                config.description_message = description_message;
                config
            }
        };
        config.joined = true;

        Community::new(config, time_source).expect("valid test community")
    }
}

impl Default for TestCommunityBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Quick fixture functions for common test objects

/// A token permission with one ERC20 criteria on mainnet
pub fn token_permission(id: &str, permission_type: TokenPermissionType) -> TokenPermission {
    permission_with_criteria(
        id,
        permission_type,
        vec![erc20_criteria(
            1,
            "0x0000000000000000000000000000000000005a7e",
            "1",
            18,
        )],
    )
}

pub fn permission_with_criteria(
    id: &str,
    permission_type: TokenPermissionType,
    token_criteria: Vec<TokenCriteria>,
) -> TokenPermission {
    TokenPermission {
        id: id.to_string(),
        permission_type,
        token_criteria,
        ..Default::default()
    }
}

pub fn erc20_criteria(chain_id: u64, contract: &str, amount: &str, decimals: u64) -> TokenCriteria {
    TokenCriteria {
        contract_addresses: [(chain_id, contract.to_string())].into_iter().collect(),
        token_type: TokenType::Erc20,
        symbol: "SNT".to_string(),
        name: "Status".to_string(),
        amount: amount.to_string(),
        decimals,
        ..Default::default()
    }
}

pub fn erc721_criteria(chain_id: u64, contract: &str, token_ids: Vec<u64>) -> TokenCriteria {
    TokenCriteria {
        contract_addresses: [(chain_id, contract.to_string())].into_iter().collect(),
        token_type: TokenType::Erc721,
        symbol: "NFT".to_string(),
        name: "Collectible".to_string(),
        amount: "1".to_string(),
        token_ids,
        ..Default::default()
    }
}

pub fn ens_criteria(pattern: &str) -> TokenCriteria {
    TokenCriteria {
        token_type: TokenType::Ens,
        ens_pattern: pattern.to_string(),
        ..Default::default()
    }
}

/// Private key derived from a seed, stable across runs
pub fn test_private_key(seed: u64) -> PrivateKey {
    let mut rng = test_rng_with_seed(seed);
    loop {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        if let Ok(key) = PrivateKey::from_bytes(&bytes) {
            return key;
        }
    }
}

pub fn test_member_key() -> PublicKey {
    PrivateKey::generate().public_key()
}
