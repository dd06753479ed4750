//! Primitive mutations and the event interpreter
//!
//! Direct control-node mutations and event replay go through the same
//! primitives, so a preview built from pending events matches what the
//! control node ends up with.

use super::requests::RequestToJoinState;
use super::state::CommunityState;
use crate::description::{
    validate_chat, CommunityBanInfo, CommunityChat, CommunityMember, MemberRole, RevealedAccount,
    TokenPermission, ValidationError,
};
use crate::errors::{CommunityError, CommunityResult};
use crate::events::{CommunityEditData, CommunityEvent, CommunityEventKind};

impl CommunityState {
    /// Replay one event. Membership, ban and token permission effects only
    /// land on the control node.
    pub(crate) fn apply_event(&mut self, event: &CommunityEvent) -> CommunityResult<()> {
        let control = self.is_control_node();

        match &event.kind {
            CommunityEventKind::CommunityEdit(data) => {
                self.apply_edit(data);
            }
            CommunityEventKind::TokenPermissionChange(permission) => {
                if control {
                    self.upsert_token_permission_inner(permission.clone());
                }
            }
            CommunityEventKind::TokenPermissionDelete(permission) => {
                if control {
                    self.delete_token_permission_inner(&permission.id)?;
                }
            }
            CommunityEventKind::CategoryCreate(data) => {
                self.create_category_inner(&data.category_id, &data.name, &data.channel_ids)?;
            }
            CommunityEventKind::CategoryDelete { category_id } => {
                self.delete_category_inner(category_id)?;
            }
            CommunityEventKind::CategoryEdit(data) => {
                self.edit_category_inner(&data.category_id, &data.name, &data.channel_ids)?;
            }
            CommunityEventKind::ChannelCreate {
                channel_id,
                channel,
            } => {
                self.create_chat_inner(channel_id, channel)?;
            }
            CommunityEventKind::ChannelDelete { channel_id } => {
                self.delete_chat_inner(channel_id);
            }
            CommunityEventKind::ChannelEdit {
                channel_id,
                channel,
            } => {
                self.edit_chat_inner(channel_id, channel)?;
            }
            CommunityEventKind::CategoryReorder {
                category_id,
                position,
            } => {
                self.reorder_category_inner(category_id, *position)?;
            }
            CommunityEventKind::ChannelReorder {
                category_id,
                channel_id,
                position,
            } => {
                self.reorder_chat_inner(category_id, channel_id, *position)?;
            }
            CommunityEventKind::RequestToJoinAccept { member, request } => {
                if control {
                    // Only requests this node received itself can admit a member
                    match self.undecided_request(request) {
                        Some(local) => {
                            self.add_member_inner(member, Vec::new(), local.revealed_accounts.clone());
                            self.add_member_to_open_chats(member);
                            self.set_request_state(&local, RequestToJoinState::Accepted);
                        }
                        None if self.request_is_unknown(request) => {
                            self.set_request_state(request, RequestToJoinState::AcceptedPending);
                        }
                        None => {}
                    }
                }
            }
            CommunityEventKind::RequestToJoinReject { request, .. } => {
                if control {
                    match self.undecided_request(request) {
                        Some(local) => self.set_request_state(&local, RequestToJoinState::Declined),
                        None if self.request_is_unknown(request) => {
                            self.set_request_state(request, RequestToJoinState::DeclinedPending);
                        }
                        None => {}
                    }
                }
            }
            CommunityEventKind::MemberKick { member } => {
                if control {
                    self.remove_member_inner(member);
                }
            }
            CommunityEventKind::MemberBan {
                member,
                delete_all_messages,
            } => {
                if control {
                    self.ban_member_inner(member, *delete_all_messages);
                }
            }
            CommunityEventKind::MemberUnban { member } => {
                if control {
                    self.unban_member_inner(member);
                }
            }
            CommunityEventKind::TokenAdd(metadata) => {
                self.description.tokens_metadata.push(metadata.clone());
            }
            CommunityEventKind::DeleteBannedMemberMessages { member } => {
                if control {
                    let info = self
                        .description
                        .banned_members
                        .get_mut(member)
                        .ok_or(CommunityError::MemberNotFound)?;
                    info.delete_all_messages = true;
                }
            }
        }
        Ok(())
    }

    fn apply_edit(&mut self, data: &CommunityEditData) {
        let d = &mut self.description;
        d.identity = Some(data.identity.clone());
        d.permissions = Some(data.permissions.clone());
        d.admin_settings = Some(data.admin_settings.clone());
        d.intro_message = data.intro_message.clone();
        d.outro_message = data.outro_message.clone();
        d.tags = dedup_tags(&data.tags);
    }

    pub(crate) fn upsert_token_permission_inner(&mut self, permission: TokenPermission) {
        self.description
            .token_permissions
            .insert(permission.id.clone(), permission);
    }

    pub(crate) fn delete_token_permission_inner(&mut self, id: &str) -> CommunityResult<()> {
        self.description
            .token_permissions
            .remove(id)
            .map(|_| ())
            .ok_or(CommunityError::TokenPermissionNotFound)
    }

    pub(crate) fn create_chat_inner(&mut self, channel_id: &str, chat: &CommunityChat) -> CommunityResult<()> {
        if self.description.chats.contains_key(channel_id) {
            return Err(CommunityError::ChatAlreadyExists);
        }
        validate_chat(&self.description, channel_id, chat)?;
        self.check_chat_name(None, &chat.identity.display_name)?;

        let mut chat = chat.clone();
        chat.position = self.description.category_chat_count(&chat.category_id) as i32;
        if chat.members.is_empty() {
            chat.members = self.description.members.clone();
        }
        self.description.chats.insert(channel_id.to_string(), chat);
        Ok(())
    }

    /// Identity, permissions and category change; members and position are
    /// kept unless the chat moves to another category
    pub(crate) fn edit_chat_inner(&mut self, channel_id: &str, chat: &CommunityChat) -> CommunityResult<()> {
        validate_chat(&self.description, channel_id, chat)?;
        let old = self
            .description
            .chats
            .get(channel_id)
            .cloned()
            .ok_or(CommunityError::ChatNotFound)?;
        self.check_chat_name(Some(channel_id), &chat.identity.display_name)?;

        let mut edited = chat.clone();
        edited.members = old.members;
        edited.identity.first_message_timestamp = old.identity.first_message_timestamp;
        edited.position = if edited.category_id == old.category_id {
            old.position
        } else {
            self.description.category_chat_count(&edited.category_id) as i32
        };

        self.description
            .chats
            .insert(channel_id.to_string(), edited);
        if chat.category_id != old.category_id {
            self.sort_category_chats(&old.category_id);
        }
        Ok(())
    }

    /// Deleting a missing chat is not an error
    pub(crate) fn delete_chat_inner(&mut self, channel_id: &str) {
        if let Some(chat) = self.description.chats.remove(channel_id) {
            self.sort_category_chats(&chat.category_id);
        }
    }

    fn check_chat_name(&self, skip: Option<&str>, name: &str) -> CommunityResult<()> {
        let duplicated = self
            .description
            .chats
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != skip)
            .any(|(_, c)| c.identity.display_name == name);
        if duplicated {
            return Err(ValidationError::DuplicatedChatName(name.to_string()).into());
        }
        Ok(())
    }

    pub(crate) fn update_chat_first_message_timestamp_inner(
        &mut self,
        channel_id: &str,
        timestamp: u32,
    ) -> CommunityResult<()> {
        let chat = self
            .description
            .chats
            .get_mut(channel_id)
            .ok_or(CommunityError::ChatNotFound)?;
        chat.identity.first_message_timestamp = timestamp;
        Ok(())
    }

    /// Returns false when the member was already present with the same data
    pub(crate) fn add_member_inner(
        &mut self,
        key: &str,
        roles: Vec<MemberRole>,
        revealed_accounts: Vec<RevealedAccount>,
    ) -> bool {
        let clock = self.description.clock;
        match self.description.members.get_mut(key) {
            Some(member) => {
                if revealed_accounts.is_empty() || member.revealed_accounts == revealed_accounts {
                    return false;
                }
                member.revealed_accounts = revealed_accounts;
                member.last_update_clock = clock;
                true
            }
            None => {
                self.description.members.insert(
                    key.to_string(),
                    CommunityMember {
                        roles,
                        revealed_accounts,
                        last_update_clock: clock,
                    },
                );
                true
            }
        }
    }

    /// Chats nobody gates with a token permission
    fn add_member_to_open_chats(&mut self, key: &str) {
        let gated: Vec<String> = self
            .description
            .chats
            .keys()
            .filter(|id| self.channel_has_token_permissions(id))
            .cloned()
            .collect();
        let roles = self.description.member_roles(key).to_vec();

        for (id, chat) in self.description.chats.iter_mut() {
            if !gated.contains(id) {
                chat.members
                    .insert(key.to_string(), CommunityMember::with_roles(roles.clone()));
            }
        }
    }

    pub(crate) fn remove_member_inner(&mut self, key: &str) {
        self.description.members.remove(key);
        for chat in self.description.chats.values_mut() {
            chat.members.remove(key);
        }
    }

    pub(crate) fn ban_member_inner(&mut self, key: &str, delete_all_messages: bool) {
        self.remove_member_inner(key);
        if !self.description.ban_list.iter().any(|k| k == key) {
            self.description.ban_list.push(key.to_string());
        }
        self.description
            .banned_members
            .insert(key.to_string(), CommunityBanInfo { delete_all_messages });
    }

    pub(crate) fn unban_member_inner(&mut self, key: &str) {
        self.description.ban_list.retain(|k| k != key);
        self.description.banned_members.remove(key);
    }

    pub(crate) fn add_member_to_chat_inner(
        &mut self,
        channel_id: &str,
        key: &str,
        roles: Vec<MemberRole>,
    ) -> CommunityResult<bool> {
        if !self.description.has_member(key) {
            return Err(CommunityError::MemberNotFound);
        }
        let chat = self
            .description
            .chats
            .get_mut(channel_id)
            .ok_or(CommunityError::ChatNotFound)?;

        let member = CommunityMember::with_roles(roles);
        if chat.members.get(key) == Some(&member) {
            return Ok(false);
        }
        chat.members.insert(key.to_string(), member);
        Ok(true)
    }

    pub(crate) fn remove_member_from_chat_inner(&mut self, channel_id: &str, key: &str) -> CommunityResult<bool> {
        let chat = self
            .description
            .chats
            .get_mut(channel_id)
            .ok_or(CommunityError::ChatNotFound)?;
        Ok(chat.members.remove(key).is_some())
    }

    pub(crate) fn populate_chat_inner(&mut self, channel_id: &str) -> CommunityResult<()> {
        let members = self.description.members.clone();
        let chat = self
            .description
            .chats
            .get_mut(channel_id)
            .ok_or(CommunityError::ChatNotFound)?;
        chat.members = members;
        Ok(())
    }
}

fn dedup_tags(tags: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(tags.len());
    for tag in tags {
        if !seen.contains(tag) {
            seen.push(tag.clone());
        }
    }
    seen
}
