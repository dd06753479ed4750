//! Key rotation decisions derived from a community diff

use crate::community::{evaluate_changes, CommunityState};
use crate::description::{CommunityMember, MemberKey};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionKeyActionType {
    #[default]
    None,
    /// Encryption was switched on, distribute a key to every member
    Add,
    /// Encryption was switched off
    Remove,
    /// Generate a new key and distribute it to the remaining members
    Rekey,
    /// Send the current key to new members only
    SendToMembers,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptionKeyAction {
    pub action_type: EncryptionKeyActionType,
    pub members: BTreeMap<MemberKey, CommunityMember>,
    pub removed_members: BTreeMap<MemberKey, CommunityMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptionKeyActions {
    pub community_key_action: EncryptionKeyAction,
    /// channel id -> action
    pub channel_keys_actions: BTreeMap<String, EncryptionKeyAction>,
}

impl EncryptionKeyActions {
    pub fn is_empty(&self) -> bool {
        self.community_key_action.action_type == EncryptionKeyActionType::None
            && self
                .channel_keys_actions
                .values()
                .all(|a| a.action_type == EncryptionKeyActionType::None)
    }
}

/// Decide one action for the community and one per channel
pub fn evaluate_community_encryption_key_actions(
    origin: &CommunityState,
    modified: &CommunityState,
) -> EncryptionKeyActions {
    let changes = evaluate_changes(origin, modified);
    let control_node_changed = changes.control_node_changed.is_some();

    let community_key_action = evaluate_encryption_key_action(
        origin.encrypted(),
        modified.encrypted(),
        control_node_changed,
        &modified.description().members,
        &changes.members_added,
        &changes.members_removed,
    );

    let empty = BTreeMap::new();
    let mut channel_keys_actions = BTreeMap::new();
    for (channel_id, chat) in &modified.description().chats {
        let (added, removed) = match changes.chats_modified.get(channel_id) {
            Some(chat_changes) => (&chat_changes.members_added, &chat_changes.members_removed),
            None if changes.chats_added.contains_key(channel_id) => (&chat.members, &empty),
            None => (&empty, &empty),
        };

        let action = evaluate_encryption_key_action(
            origin.channel_encrypted(channel_id),
            modified.channel_encrypted(channel_id),
            control_node_changed,
            &chat.members,
            added,
            removed,
        );
        channel_keys_actions.insert(channel_id.clone(), action);
    }

    EncryptionKeyActions {
        community_key_action,
        channel_keys_actions,
    }
}

fn evaluate_encryption_key_action(
    origin_encrypted: bool,
    modified_encrypted: bool,
    control_node_changed: bool,
    all_members: &BTreeMap<MemberKey, CommunityMember>,
    members_added: &BTreeMap<MemberKey, CommunityMember>,
    members_removed: &BTreeMap<MemberKey, CommunityMember>,
) -> EncryptionKeyAction {
    let action = |action_type, members: &BTreeMap<MemberKey, CommunityMember>| EncryptionKeyAction {
        action_type,
        members: members.clone(),
        removed_members: BTreeMap::new(),
    };

    if control_node_changed {
        return if modified_encrypted {
            action(EncryptionKeyActionType::Rekey, all_members)
        } else {
            EncryptionKeyAction::default()
        };
    }

    match (origin_encrypted, modified_encrypted) {
        (false, true) => action(EncryptionKeyActionType::Add, all_members),
        (true, false) => action(EncryptionKeyActionType::Remove, all_members),
        (true, true) if !members_removed.is_empty() => EncryptionKeyAction {
            action_type: EncryptionKeyActionType::Rekey,
            members: all_members.clone(),
            removed_members: members_removed.clone(),
        },
        (true, true) if !members_added.is_empty() => {
            action(EncryptionKeyActionType::SendToMembers, members_added)
        }
        _ => EncryptionKeyAction::default(),
    }
}
