//! The replicated community document
//!
//! Every map is a `BTreeMap` so iteration order, serialization and event
//! replay are identical on every replica.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Member key: `0x` + hex of the uncompressed public key
pub type MemberKey = String;

/// Role held by a community member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum MemberRole {
    #[default]
    None,
    Owner,
    Admin,
    TokenMaster,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::None => "none",
            MemberRole::Owner => "owner",
            MemberRole::Admin => "admin",
            MemberRole::TokenMaster => "token_master",
        }
    }

    /// Owner, admin and token master may manage the community
    pub fn is_privileged(&self) -> bool {
        !matches!(self, MemberRole::None)
    }
}

/// How new members get in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccessType {
    #[default]
    Unknown,
    AutoAccept,
    ManualAccept,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommunityPermissions {
    pub access: AccessType,
    pub ens_only: bool,
}

impl CommunityPermissions {
    pub fn new(access: AccessType) -> Self {
        Self {
            access,
            ens_only: false,
        }
    }
}

/// A wallet account a member revealed when joining
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RevealedAccount {
    pub address: String,
    pub chain_ids: Vec<u64>,
    pub is_airdrop_address: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommunityMember {
    pub roles: Vec<MemberRole>,
    pub revealed_accounts: Vec<RevealedAccount>,
    pub last_update_clock: u64,
}

impl CommunityMember {
    pub fn with_roles(roles: Vec<MemberRole>) -> Self {
        Self {
            roles,
            ..Default::default()
        }
    }

    pub fn has_role(&self, role: MemberRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[MemberRole]) -> bool {
        self.roles.iter().any(|r| roles.contains(r))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommunityIdentity {
    pub display_name: String,
    pub description: String,
    pub color: String,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatIdentity {
    pub display_name: String,
    pub description: String,
    pub color: String,
    pub emoji: String,
    /// Seconds since epoch of the first message posted in the chat
    pub first_message_timestamp: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommunityChat {
    pub members: BTreeMap<MemberKey, CommunityMember>,
    pub permissions: Option<CommunityPermissions>,
    pub identity: ChatIdentity,
    pub category_id: String,
    pub position: i32,
    pub viewers_can_post_reactions: bool,
    pub hide_if_permissions_not_met: bool,
}

impl CommunityChat {
    /// A chat with the given display name that anyone in the community can open
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            permissions: Some(CommunityPermissions::new(AccessType::AutoAccept)),
            identity: ChatIdentity {
                display_name: display_name.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommunityCategory {
    pub category_id: String,
    pub name: String,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommunityBanInfo {
    pub delete_all_messages: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommunityAdminSettings {
    pub pin_message_all_members_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum TokenPermissionType {
    #[default]
    Unknown,
    BecomeAdmin,
    BecomeMember,
    CanViewChannel,
    CanViewAndPostChannel,
    BecomeTokenMaster,
    BecomeTokenOwner,
}

impl TokenPermissionType {
    /// Permissions that grant a community role rather than channel access
    pub fn is_role_permission(&self) -> bool {
        matches!(
            self,
            TokenPermissionType::BecomeMember
                | TokenPermissionType::BecomeAdmin
                | TokenPermissionType::BecomeTokenMaster
                | TokenPermissionType::BecomeTokenOwner
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TokenType {
    #[default]
    Unknown,
    Erc20,
    Erc721,
    Ens,
}

/// One ownership requirement of a token permission
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenCriteria {
    /// chain id -> contract address
    pub contract_addresses: BTreeMap<u64, String>,
    pub token_type: TokenType,
    pub symbol: String,
    pub name: String,
    /// Decimal string, compared against balances scaled by `decimals`
    pub amount: String,
    pub token_ids: Vec<u64>,
    pub ens_pattern: String,
    pub decimals: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenPermission {
    pub id: String,
    pub permission_type: TokenPermissionType,
    pub token_criteria: Vec<TokenCriteria>,
    /// Full chat ids (community id string + channel id)
    pub chat_ids: Vec<String>,
    pub is_private: bool,
}

impl TokenPermission {
    pub fn includes_chat(&self, chat_id: &str) -> bool {
        self.chat_ids.iter().any(|id| id == chat_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommunityTokenMetadata {
    pub contract_addresses: BTreeMap<u64, String>,
    pub description: String,
    pub image: String,
    pub token_type: TokenType,
    pub symbol: String,
    pub name: String,
    pub decimals: u32,
    pub version: String,
}

/// The replicated community document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommunityDescription {
    /// Lamport clock, advanced by the control node on every mutation
    pub clock: u64,
    /// Community id string, `0x` + compressed public key
    pub id: String,
    pub members: BTreeMap<MemberKey, CommunityMember>,
    pub permissions: Option<CommunityPermissions>,
    pub identity: Option<CommunityIdentity>,
    pub chats: BTreeMap<String, CommunityChat>,
    pub categories: BTreeMap<String, CommunityCategory>,
    /// Legacy ban list, kept alongside `banned_members`
    pub ban_list: Vec<MemberKey>,
    pub banned_members: BTreeMap<MemberKey, CommunityBanInfo>,
    pub admin_settings: Option<CommunityAdminSettings>,
    pub intro_message: String,
    pub outro_message: String,
    pub tags: Vec<String>,
    pub token_permissions: BTreeMap<String, TokenPermission>,
    pub tokens_metadata: Vec<CommunityTokenMetadata>,
    pub active_members_count: u64,
}

impl CommunityDescription {
    pub fn member(&self, key: &str) -> Option<&CommunityMember> {
        self.members.get(key)
    }

    pub fn has_member(&self, key: &str) -> bool {
        self.members.contains_key(key)
    }

    pub fn member_roles(&self, key: &str) -> &[MemberRole] {
        self.members
            .get(key)
            .map(|m| m.roles.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_banned(&self, key: &str) -> bool {
        self.banned_members.contains_key(key) || self.ban_list.iter().any(|k| k == key)
    }

    pub fn chat_member(&self, key: &str, channel_id: &str) -> Option<&CommunityMember> {
        if !self.has_member(key) {
            return None;
        }
        self.chats.get(channel_id)?.members.get(key)
    }

    pub fn category_chat_count(&self, category_id: &str) -> usize {
        self.chats
            .values()
            .filter(|c| c.category_id == category_id)
            .count()
    }

    pub fn token_permissions_by_type(
        &self,
        permission_type: TokenPermissionType,
    ) -> Vec<&TokenPermission> {
        self.token_permissions
            .values()
            .filter(|p| p.permission_type == permission_type)
            .collect()
    }

    /// Chain id of the token granting ownership, 0 when the community has none
    pub fn token_owner_chain_id(&self) -> u64 {
        self.token_permissions
            .values()
            .filter(|p| p.permission_type == TokenPermissionType::BecomeTokenOwner)
            .flat_map(|p| p.token_criteria.iter())
            .flat_map(|c| c.contract_addresses.keys())
            .copied()
            .next()
            .unwrap_or(0)
    }

    pub fn has_token_ownership(&self) -> bool {
        self.token_owner_chain_id() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_roles() {
        let mut d = CommunityDescription::default();
        d.members.insert(
            "0xaa".to_string(),
            CommunityMember::with_roles(vec![MemberRole::Admin]),
        );

        assert!(d.has_member("0xaa"));
        assert_eq!(d.member_roles("0xaa"), &[MemberRole::Admin]);
        assert!(d.member_roles("0xbb").is_empty());
    }

    #[test]
    fn test_is_banned_checks_both_lists() {
        let mut d = CommunityDescription::default();
        d.ban_list.push("0xaa".to_string());
        d.banned_members
            .insert("0xbb".to_string(), CommunityBanInfo::default());

        assert!(d.is_banned("0xaa"));
        assert!(d.is_banned("0xbb"));
        assert!(!d.is_banned("0xcc"));
    }

    #[test]
    fn test_chat_member_requires_community_membership() {
        let mut d = CommunityDescription::default();
        let mut chat = CommunityChat::new("general");
        chat.members
            .insert("0xaa".to_string(), CommunityMember::default());
        d.chats.insert("general".to_string(), chat);

        assert!(d.chat_member("0xaa", "general").is_none());

        d.members
            .insert("0xaa".to_string(), CommunityMember::default());
        assert!(d.chat_member("0xaa", "general").is_some());
    }

    #[test]
    fn test_token_owner_chain_id() {
        let mut d = CommunityDescription::default();
        assert_eq!(d.token_owner_chain_id(), 0);
        assert!(!d.has_token_ownership());

        let mut criteria = TokenCriteria::default();
        criteria.contract_addresses.insert(10, "0x01".to_string());
        d.token_permissions.insert(
            "owner".to_string(),
            TokenPermission {
                id: "owner".to_string(),
                permission_type: TokenPermissionType::BecomeTokenOwner,
                token_criteria: vec![criteria],
                ..Default::default()
            },
        );

        assert_eq!(d.token_owner_chain_id(), 10);
        assert!(d.has_token_ownership());
    }
}
