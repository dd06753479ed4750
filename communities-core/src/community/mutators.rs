//! Public mutators
//!
//! Gated mutators succeed on the control node or for members whose role
//! allows the matching event type. Control-node-only mutators fail with
//! `NotControlNode` anywhere else.

use super::state::CommunityState;
use super::Community;
use crate::changes::{diff_descriptions, CommunityChanges, CommunityTokenPermission, TokenPermissionState};
use crate::crypto::PublicKey;
use crate::description::{
    CommunityChat, CommunityTokenMetadata, MemberRole, RevealedAccount, TokenPermission,
    TokenPermissionType, ValidationError,
};
use crate::errors::{CommunityError, CommunityResult};
use crate::events::{CategoryData, CommunityEditData, CommunityEventKind, EventType};
use crate::roles::{can_roles_modify_permission, is_privileged};

impl Community {
    fn perform(&self, kind: CommunityEventKind) -> CommunityResult<CommunityChanges> {
        let now = self.now();
        self.lock().perform(kind, now)
    }

    /// Run `f` on the control node; the clock advances when it reports a change
    fn with_control_node<F>(&self, f: F) -> CommunityResult<CommunityChanges>
    where
        F: FnOnce(&mut CommunityState) -> CommunityResult<bool>,
    {
        let now = self.now();
        let mut state = self.lock();
        if !state.is_control_node() {
            return Err(CommunityError::NotControlNode);
        }

        let origin = state.description.clone();
        if f(&mut state)? {
            state.increase_clock(now);
        }
        Ok(diff_descriptions(&origin, &state.description))
    }

    pub fn edit(&self, data: CommunityEditData) -> CommunityResult<CommunityChanges> {
        self.perform(CommunityEventKind::CommunityEdit(data))
    }

    pub fn create_chat(&self, channel_id: &str, chat: CommunityChat) -> CommunityResult<CommunityChanges> {
        self.perform(CommunityEventKind::ChannelCreate {
            channel_id: channel_id.to_string(),
            channel: chat,
        })
    }

    pub fn edit_chat(&self, channel_id: &str, chat: CommunityChat) -> CommunityResult<CommunityChanges> {
        self.perform(CommunityEventKind::ChannelEdit {
            channel_id: channel_id.to_string(),
            channel: chat,
        })
    }

    pub fn delete_chat(&self, channel_id: &str) -> CommunityResult<CommunityChanges> {
        self.perform(CommunityEventKind::ChannelDelete {
            channel_id: channel_id.to_string(),
        })
    }

    pub fn create_category(
        &self,
        category_id: &str,
        name: &str,
        channel_ids: Vec<String>,
    ) -> CommunityResult<CommunityChanges> {
        self.perform(CommunityEventKind::CategoryCreate(CategoryData {
            category_id: category_id.to_string(),
            name: name.to_string(),
            channel_ids,
        }))
    }

    pub fn edit_category(
        &self,
        category_id: &str,
        name: &str,
        channel_ids: Vec<String>,
    ) -> CommunityResult<CommunityChanges> {
        self.perform(CommunityEventKind::CategoryEdit(CategoryData {
            category_id: category_id.to_string(),
            name: name.to_string(),
            channel_ids,
        }))
    }

    pub fn delete_category(&self, category_id: &str) -> CommunityResult<CommunityChanges> {
        self.perform(CommunityEventKind::CategoryDelete {
            category_id: category_id.to_string(),
        })
    }

    pub fn reorder_category(&self, category_id: &str, position: i32) -> CommunityResult<CommunityChanges> {
        self.perform(CommunityEventKind::CategoryReorder {
            category_id: category_id.to_string(),
            position,
        })
    }

    pub fn reorder_chat(
        &self,
        category_id: &str,
        channel_id: &str,
        position: i32,
    ) -> CommunityResult<CommunityChanges> {
        self.perform(CommunityEventKind::ChannelReorder {
            category_id: category_id.to_string(),
            channel_id: channel_id.to_string(),
            position,
        })
    }

    pub fn add_tokens_metadata(&self, metadata: CommunityTokenMetadata) -> CommunityResult<CommunityChanges> {
        self.perform(CommunityEventKind::TokenAdd(metadata))
    }

    /// Non-control-node members get explicit pending states back, since
    /// token permission changes are not replayed locally
    pub fn upsert_token_permission(&self, permission: TokenPermission) -> CommunityResult<CommunityChanges> {
        if permission.id.is_empty() || permission.permission_type == TokenPermissionType::Unknown {
            return Err(ValidationError::InvalidTokenPermission {
                id: permission.id,
                reason: "missing id or permission type".to_string(),
            }
            .into());
        }

        let now = self.now();
        let mut state = self.lock();
        let control = state.authorize(EventType::TokenPermissionChange)?;
        if !control && !can_roles_modify_permission(state.own_roles(), permission.permission_type) {
            return Err(CommunityError::NotAuthorized);
        }

        let exists = state.description.token_permissions.contains_key(&permission.id);
        let mut changes = state.perform(
            CommunityEventKind::TokenPermissionChange(permission.clone()),
            now,
        )?;

        if !control {
            let id = permission.id.clone();
            if exists {
                changes.token_permissions_modified.insert(
                    id,
                    CommunityTokenPermission::new(permission, TokenPermissionState::UpdatePending),
                );
            } else {
                changes.token_permissions_added.insert(
                    id,
                    CommunityTokenPermission::new(permission, TokenPermissionState::AdditionPending),
                );
            }
        }
        Ok(changes)
    }

    pub fn delete_token_permission(&self, permission_id: &str) -> CommunityResult<CommunityChanges> {
        let now = self.now();
        let mut state = self.lock();
        let control = state.authorize(EventType::TokenPermissionDelete)?;

        let permission = if control {
            state.description.token_permissions.get(permission_id).cloned()
        } else {
            state
                .token_permissions()
                .remove(permission_id)
                .map(|p| p.permission)
        }
        .ok_or(CommunityError::TokenPermissionNotFound)?;

        if !control && !can_roles_modify_permission(state.own_roles(), permission.permission_type) {
            return Err(CommunityError::NotAuthorized);
        }

        let mut changes = state.perform(
            CommunityEventKind::TokenPermissionDelete(permission.clone()),
            now,
        )?;
        if !control {
            changes.token_permissions_removed.insert(
                permission_id.to_string(),
                CommunityTokenPermission::new(permission, TokenPermissionState::RemovalPending),
            );
        }
        Ok(changes)
    }

    /// Kick a member out of the community and all its chats
    pub fn remove_user_from_org(&self, member: &PublicKey) -> CommunityResult<CommunityChanges> {
        let now = self.now();
        let member_key = member.to_hex();
        let mut state = self.lock();
        let control = state.authorize(EventType::MemberKick)?;
        if !control && is_privileged(state.description.member_roles(&member_key)) {
            return Err(CommunityError::CannotRemoveOwnerOrAdmin);
        }
        state.perform(CommunityEventKind::MemberKick { member: member_key }, now)
    }

    pub fn ban_user(&self, member: &PublicKey, delete_all_messages: bool) -> CommunityResult<CommunityChanges> {
        let now = self.now();
        let member_key = member.to_hex();
        let mut state = self.lock();
        let control = state.authorize(EventType::MemberBan)?;
        if !control && is_privileged(state.description.member_roles(&member_key)) {
            return Err(CommunityError::CannotBanOwnerOrAdmin);
        }
        state.perform(
            CommunityEventKind::MemberBan {
                member: member_key,
                delete_all_messages,
            },
            now,
        )
    }

    pub fn unban_user(&self, member: &PublicKey) -> CommunityResult<CommunityChanges> {
        self.perform(CommunityEventKind::MemberUnban {
            member: member.to_hex(),
        })
    }

    pub fn delete_banned_member_messages(&self, member: &PublicKey) -> CommunityResult<CommunityChanges> {
        self.perform(CommunityEventKind::DeleteBannedMemberMessages {
            member: member.to_hex(),
        })
    }

    pub fn add_member(&self, member: &PublicKey, roles: Vec<MemberRole>) -> CommunityResult<CommunityChanges> {
        let key = member.to_hex();
        self.with_control_node(|state| Ok(state.add_member_inner(&key, roles, Vec::new())))
    }

    pub fn add_member_with_revealed_accounts(
        &self,
        member: &PublicKey,
        roles: Vec<MemberRole>,
        accounts: Vec<RevealedAccount>,
    ) -> CommunityResult<CommunityChanges> {
        let key = member.to_hex();
        let wallets = accounts.clone();
        let mut changes =
            self.with_control_node(|state| Ok(state.add_member_inner(&key, roles, accounts)))?;
        if !wallets.is_empty() {
            changes.member_wallets_added.insert(key, wallets);
        }
        Ok(changes)
    }

    pub fn add_member_to_chat(
        &self,
        channel_id: &str,
        member: &PublicKey,
        roles: Vec<MemberRole>,
    ) -> CommunityResult<CommunityChanges> {
        let key = member.to_hex();
        self.with_control_node(|state| state.add_member_to_chat_inner(channel_id, &key, roles))
    }

    pub fn remove_user_from_chat(&self, member: &PublicKey, channel_id: &str) -> CommunityResult<CommunityChanges> {
        let key = member.to_hex();
        self.with_control_node(|state| state.remove_member_from_chat_inner(channel_id, &key))
    }

    pub fn populate_chat_with_all_members(&self, channel_id: &str) -> CommunityResult<CommunityChanges> {
        self.with_control_node(|state| {
            let before = state.description.chats.get(channel_id).map(|c| c.members.clone());
            state.populate_chat_inner(channel_id)?;
            let after = state.description.chats.get(channel_id).map(|c| c.members.clone());
            Ok(before != after)
        })
    }

    /// Returns whether the member's roles changed
    pub fn add_role_to_member(&self, member: &PublicKey, role: MemberRole) -> CommunityResult<bool> {
        let key = member.to_hex();
        let mut changed = false;
        self.with_control_node(|state| {
            let entry = state
                .description
                .members
                .get_mut(&key)
                .ok_or(CommunityError::MemberNotFound)?;
            if !entry.roles.contains(&role) {
                entry.roles.push(role);
                changed = true;
            }
            Ok(changed)
        })?;
        Ok(changed)
    }

    pub fn remove_role_from_member(&self, member: &PublicKey, role: MemberRole) -> CommunityResult<bool> {
        let key = member.to_hex();
        let mut changed = false;
        self.with_control_node(|state| {
            let entry = state
                .description
                .members
                .get_mut(&key)
                .ok_or(CommunityError::MemberNotFound)?;
            let before = entry.roles.len();
            entry.roles.retain(|r| *r != role);
            changed = entry.roles.len() != before;
            Ok(changed)
        })?;
        Ok(changed)
    }

    pub fn set_active_members_count(&self, count: u64) -> CommunityResult<bool> {
        let mut changed = false;
        self.with_control_node(|state| {
            changed = state.description.active_members_count != count;
            state.description.active_members_count = count;
            Ok(changed)
        })?;
        Ok(changed)
    }

    pub fn update_chat_first_message_timestamp(
        &self,
        channel_id: &str,
        timestamp: u32,
    ) -> CommunityResult<CommunityChanges> {
        self.with_control_node(|state| {
            state.update_chat_first_message_timestamp_inner(channel_id, timestamp)?;
            Ok(true)
        })
    }
}
