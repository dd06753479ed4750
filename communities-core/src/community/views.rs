//! Read-only views over the community

use super::state::CommunityState;
use super::Community;
use crate::changes::{CommunityTokenPermission, TokenPermissionState};
use crate::crypto::PublicKey;
use crate::description::{
    AccessType, CommunityChat, CommunityDescription, CommunityMember, MemberKey, MemberRole,
    TokenPermission, TokenPermissionType,
};
use crate::events::CommunityEventKind;
use crate::roles::{highest_role, is_privileged};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Ban or pending membership decision of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommunityMemberState {
    Banned,
    BanPending,
    UnbanPending,
    KickPending,
}

impl CommunityState {
    pub fn encrypted(&self) -> bool {
        !self
            .description
            .token_permissions_by_type(TokenPermissionType::BecomeMember)
            .is_empty()
    }

    pub fn channel_encrypted(&self, channel_id: &str) -> bool {
        self.channel_has_token_permissions(channel_id)
    }

    pub fn channel_has_token_permissions(&self, channel_id: &str) -> bool {
        let chat_id = self.chat_id(channel_id);
        self.description
            .token_permissions
            .values()
            .any(|p| p.includes_chat(&chat_id))
    }

    pub fn channel_token_permissions_by_type(
        &self,
        channel_id: &str,
        permission_type: TokenPermissionType,
    ) -> Vec<TokenPermission> {
        let chat_id = self.chat_id(channel_id);
        self.description
            .token_permissions
            .values()
            .filter(|p| p.permission_type == permission_type && p.includes_chat(&chat_id))
            .cloned()
            .collect()
    }

    fn pending_event_kinds(&self) -> impl Iterator<Item = &CommunityEventKind> {
        self.events
            .iter()
            .flat_map(|data| data.events.iter())
            .map(|e| &e.kind)
    }

    /// Approved permissions, overlaid with pending changes for privileged
    /// members. The first pending event per permission wins.
    pub fn token_permissions(&self) -> BTreeMap<String, CommunityTokenPermission> {
        let mut result: BTreeMap<String, CommunityTokenPermission> = self
            .description
            .token_permissions
            .iter()
            .map(|(id, p)| (id.clone(), CommunityTokenPermission::approved(p.clone())))
            .collect();

        if !is_privileged(self.own_roles()) {
            return result;
        }

        let mut seen = BTreeSet::new();
        for kind in self.pending_event_kinds() {
            match kind {
                CommunityEventKind::TokenPermissionChange(permission) => {
                    if !seen.insert(permission.id.clone()) {
                        continue;
                    }
                    let state = if self.description.token_permissions.contains_key(&permission.id) {
                        TokenPermissionState::UpdatePending
                    } else {
                        TokenPermissionState::AdditionPending
                    };
                    result.insert(
                        permission.id.clone(),
                        CommunityTokenPermission::new(permission.clone(), state),
                    );
                }
                CommunityEventKind::TokenPermissionDelete(permission) => {
                    if !seen.insert(permission.id.clone()) {
                        continue;
                    }
                    result.insert(
                        permission.id.clone(),
                        CommunityTokenPermission::new(
                            permission.clone(),
                            TokenPermissionState::RemovalPending,
                        ),
                    );
                }
                _ => {}
            }
        }
        result
    }

    pub fn pending_and_banned_members(&self) -> BTreeMap<MemberKey, CommunityMemberState> {
        let mut result: BTreeMap<MemberKey, CommunityMemberState> = self
            .description
            .ban_list
            .iter()
            .chain(self.description.banned_members.keys())
            .map(|k| (k.clone(), CommunityMemberState::Banned))
            .collect();

        let mut seen = BTreeSet::new();
        for kind in self.pending_event_kinds() {
            let (member, state) = match kind {
                CommunityEventKind::MemberKick { member } => (member, CommunityMemberState::KickPending),
                CommunityEventKind::MemberBan { member, .. } => (member, CommunityMemberState::BanPending),
                CommunityEventKind::MemberUnban { member } => {
                    (member, CommunityMemberState::UnbanPending)
                }
                _ => continue,
            };
            if seen.insert(member.clone()) {
                result.insert(member.clone(), state);
            }
        }
        result
    }
}

impl Community {
    pub fn description(&self) -> CommunityDescription {
        self.lock().description.clone()
    }

    pub fn members(&self) -> BTreeMap<MemberKey, CommunityMember> {
        self.lock().description.members.clone()
    }

    pub fn members_count(&self) -> usize {
        self.lock().description.members.len()
    }

    pub fn has_member(&self, key: &PublicKey) -> bool {
        self.lock().description.has_member(&key.to_hex())
    }

    pub fn is_banned(&self, key: &PublicKey) -> bool {
        self.lock().description.is_banned(&key.to_hex())
    }

    pub fn is_member_in_chat(&self, key: &PublicKey, channel_id: &str) -> bool {
        self.lock()
            .description
            .chat_member(&key.to_hex(), channel_id)
            .is_some()
    }

    pub fn chats(&self) -> BTreeMap<String, CommunityChat> {
        self.lock().description.chats.clone()
    }

    /// Owner over token master over admin
    pub fn member_role(&self, key: &PublicKey) -> MemberRole {
        highest_role(self.lock().description.member_roles(&key.to_hex()))
    }

    pub fn is_privileged_member(&self, key: &PublicKey) -> bool {
        self.lock().is_privileged_member(key)
    }

    pub fn privileged_members(&self) -> BTreeMap<MemberKey, CommunityMember> {
        self.lock()
            .description
            .members
            .iter()
            .filter(|(_, m)| is_privileged(&m.roles))
            .map(|(k, m)| (k.clone(), m.clone()))
            .collect()
    }

    pub fn can_post(&self, key: &PublicKey, channel_id: &str) -> bool {
        let state = self.lock();
        let description = &state.description;
        if !description.chats.contains_key(channel_id) {
            return false;
        }
        if *key == state.control_node {
            return true;
        }

        let member_key = key.to_hex();
        if description.is_banned(&member_key) || !description.has_member(&member_key) {
            return false;
        }
        description.chat_member(&member_key, channel_id).is_some()
    }

    pub fn can_request_access(&self, key: &PublicKey) -> bool {
        let state = self.lock();
        let description = &state.description;
        let member_key = key.to_hex();
        if description.has_member(&member_key) || description.is_banned(&member_key) {
            return false;
        }
        description
            .permissions
            .as_ref()
            .is_some_and(|p| p.access == AccessType::ManualAccept)
    }

    pub fn can_manage_users(&self, key: &PublicKey) -> bool {
        let state = self.lock();
        state.is_control_node() || state.is_privileged_member(key)
    }

    pub fn can_delete_message_for_everyone(&self, key: &PublicKey) -> bool {
        self.can_manage_users(key)
    }

    pub fn allows_all_members_to_pin_message(&self) -> bool {
        self.lock()
            .description
            .admin_settings
            .as_ref()
            .is_some_and(|s| s.pin_message_all_members_enabled)
    }

    pub fn token_permissions(&self) -> BTreeMap<String, CommunityTokenPermission> {
        self.lock().token_permissions()
    }

    pub fn token_permissions_by_type(&self, permission_type: TokenPermissionType) -> Vec<TokenPermission> {
        self.lock()
            .description
            .token_permissions_by_type(permission_type)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn channel_token_permissions_by_type(
        &self,
        channel_id: &str,
        permission_type: TokenPermissionType,
    ) -> Vec<TokenPermission> {
        self.lock()
            .channel_token_permissions_by_type(channel_id, permission_type)
    }

    pub fn channel_has_token_permissions(&self, channel_id: &str) -> bool {
        self.lock().channel_has_token_permissions(channel_id)
    }

    pub fn pending_and_banned_members(&self) -> BTreeMap<MemberKey, CommunityMemberState> {
        self.lock().pending_and_banned_members()
    }

    pub fn encrypted(&self) -> bool {
        self.lock().encrypted()
    }

    pub fn channel_encrypted(&self, channel_id: &str) -> bool {
        self.lock().channel_encrypted(channel_id)
    }
}
