//! Structural diff between two community descriptions
//!
//! [`diff_descriptions`] is pure: it only reads both inputs and returns a
//! fresh [`CommunityChanges`].

use crate::crypto::PublicKey;
use crate::description::{
    CommunityCategory, CommunityChat, CommunityDescription, CommunityMember, MemberKey,
    RevealedAccount, TokenPermission,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Approval state of a token permission as seen by a privileged member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPermissionState {
    Approved,
    AdditionPending,
    UpdatePending,
    RemovalPending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityTokenPermission {
    pub permission: TokenPermission,
    pub state: TokenPermissionState,
}

impl CommunityTokenPermission {
    pub fn new(permission: TokenPermission, state: TokenPermissionState) -> Self {
        Self { permission, state }
    }

    pub fn approved(permission: TokenPermission) -> Self {
        Self::new(permission, TokenPermissionState::Approved)
    }
}

/// What changed inside a chat present on both sides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommunityChatChanges {
    pub chat_modified: Option<CommunityChat>,
    pub members_added: BTreeMap<MemberKey, CommunityMember>,
    pub members_removed: BTreeMap<MemberKey, CommunityMember>,
    pub category_modified: Option<String>,
    pub position_modified: Option<i32>,
    pub first_message_timestamp_modified: Option<u32>,
}

impl CommunityChatChanges {
    fn is_empty(&self) -> bool {
        self.members_added.is_empty()
            && self.members_removed.is_empty()
            && self.category_modified.is_none()
            && self.position_modified.is_none()
            && self.first_message_timestamp_modified.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommunityChanges {
    pub community_id: String,

    pub members_added: BTreeMap<MemberKey, CommunityMember>,
    pub members_removed: BTreeMap<MemberKey, CommunityMember>,

    /// member -> delete all messages
    pub members_banned: BTreeMap<MemberKey, bool>,
    pub members_unbanned: BTreeSet<MemberKey>,

    pub token_permissions_added: BTreeMap<String, CommunityTokenPermission>,
    pub token_permissions_modified: BTreeMap<String, CommunityTokenPermission>,
    pub token_permissions_removed: BTreeMap<String, CommunityTokenPermission>,

    pub chats_added: BTreeMap<String, CommunityChat>,
    pub chats_removed: BTreeMap<String, CommunityChat>,
    pub chats_modified: BTreeMap<String, CommunityChatChanges>,

    pub categories_added: BTreeMap<String, CommunityCategory>,
    pub categories_removed: BTreeSet<String>,
    pub categories_modified: BTreeMap<String, CommunityCategory>,

    pub member_wallets_added: BTreeMap<MemberKey, Vec<RevealedAccount>>,

    /// New control node, set when the community changed hands
    pub control_node_changed: Option<PublicKey>,

    /// Set by callers when the local member should join as a result
    pub should_member_join: bool,
    pub member_kicked: bool,
}

impl CommunityChanges {
    pub fn empty(community_id: impl Into<String>) -> Self {
        Self {
            community_id: community_id.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members_added.is_empty()
            && self.members_removed.is_empty()
            && self.members_banned.is_empty()
            && self.members_unbanned.is_empty()
            && self.token_permissions_added.is_empty()
            && self.token_permissions_modified.is_empty()
            && self.token_permissions_removed.is_empty()
            && self.chats_added.is_empty()
            && self.chats_removed.is_empty()
            && self.chats_modified.is_empty()
            && self.categories_added.is_empty()
            && self.categories_removed.is_empty()
            && self.categories_modified.is_empty()
            && self.member_wallets_added.is_empty()
            && self.control_node_changed.is_none()
    }

    pub fn has_new_member(&self, key: &str) -> bool {
        self.members_added.contains_key(key)
    }

    pub fn has_member_left(&self, key: &str) -> bool {
        self.members_removed.contains_key(key)
    }

    /// Fold a later set of changes into this one
    pub fn merge(&mut self, other: CommunityChanges) {
        self.members_added.extend(other.members_added);
        self.members_removed.extend(other.members_removed);
        self.members_banned.extend(other.members_banned);
        self.members_unbanned.extend(other.members_unbanned);
        self.token_permissions_added.extend(other.token_permissions_added);
        self.token_permissions_modified.extend(other.token_permissions_modified);
        self.token_permissions_removed.extend(other.token_permissions_removed);
        self.chats_added.extend(other.chats_added);
        self.chats_removed.extend(other.chats_removed);
        self.chats_modified.extend(other.chats_modified);
        self.categories_added.extend(other.categories_added);
        self.categories_removed.extend(other.categories_removed);
        self.categories_modified.extend(other.categories_modified);
        self.member_wallets_added.extend(other.member_wallets_added);
        if other.control_node_changed.is_some() {
            self.control_node_changed = other.control_node_changed;
        }
        self.should_member_join |= other.should_member_join;
        self.member_kicked |= other.member_kicked;
    }
}

/// Compute the delta turning `origin` into `modified`
pub fn diff_descriptions(origin: &CommunityDescription, modified: &CommunityDescription) -> CommunityChanges {
    let mut changes = CommunityChanges::empty(modified.id.clone());

    diff_members(origin, modified, &mut changes);
    diff_bans(origin, modified, &mut changes);
    diff_chats(origin, modified, &mut changes);
    diff_categories(origin, modified, &mut changes);
    diff_token_permissions(origin, modified, &mut changes);

    changes
}

fn diff_members(origin: &CommunityDescription, modified: &CommunityDescription, changes: &mut CommunityChanges) {
    for (key, member) in &modified.members {
        if !origin.members.contains_key(key) {
            changes.members_added.insert(key.clone(), member.clone());
        }
    }
    for (key, member) in &origin.members {
        if !modified.members.contains_key(key) {
            changes.members_removed.insert(key.clone(), member.clone());
        }
    }
}

// The ban map and the legacy list are diffed independently.
fn diff_bans(origin: &CommunityDescription, modified: &CommunityDescription, changes: &mut CommunityChanges) {
    for (key, info) in &modified.banned_members {
        if !origin.banned_members.contains_key(key) {
            changes
                .members_banned
                .insert(key.clone(), info.delete_all_messages);
        }
    }
    for key in origin.banned_members.keys() {
        if !modified.banned_members.contains_key(key) {
            changes.members_unbanned.insert(key.clone());
        }
    }

    for key in &modified.ban_list {
        if !origin.ban_list.contains(key) {
            changes.members_banned.entry(key.clone()).or_insert(false);
        }
    }
    for key in &origin.ban_list {
        if !modified.ban_list.contains(key) {
            changes.members_unbanned.insert(key.clone());
        }
    }
}

fn diff_chats(origin: &CommunityDescription, modified: &CommunityDescription, changes: &mut CommunityChanges) {
    for (id, chat) in &origin.chats {
        if !modified.chats.contains_key(id) {
            changes.chats_removed.insert(id.clone(), chat.clone());
        }
    }

    for (id, chat) in &modified.chats {
        let Some(old) = origin.chats.get(id) else {
            changes.chats_added.insert(id.clone(), chat.clone());
            continue;
        };

        let mut chat_changes = CommunityChatChanges::default();
        for (key, member) in &chat.members {
            if !old.members.contains_key(key) {
                chat_changes.members_added.insert(key.clone(), member.clone());
            }
        }
        for (key, member) in &old.members {
            if !chat.members.contains_key(key) {
                chat_changes.members_removed.insert(key.clone(), member.clone());
            }
        }
        if chat.category_id != old.category_id {
            chat_changes.category_modified = Some(chat.category_id.clone());
        }
        if chat.position != old.position {
            chat_changes.position_modified = Some(chat.position);
        }
        if chat.identity.first_message_timestamp != old.identity.first_message_timestamp {
            chat_changes.first_message_timestamp_modified =
                Some(chat.identity.first_message_timestamp);
        }

        if !chat_changes.is_empty() {
            chat_changes.chat_modified = Some(chat.clone());
            changes.chats_modified.insert(id.clone(), chat_changes);
        }
    }
}

fn diff_categories(origin: &CommunityDescription, modified: &CommunityDescription, changes: &mut CommunityChanges) {
    for (id, category) in &modified.categories {
        match origin.categories.get(id) {
            None => {
                changes.categories_added.insert(id.clone(), category.clone());
            }
            Some(old) if old != category => {
                changes
                    .categories_modified
                    .insert(id.clone(), category.clone());
            }
            Some(_) => {}
        }
    }
    for id in origin.categories.keys() {
        if !modified.categories.contains_key(id) {
            changes.categories_removed.insert(id.clone());
        }
    }
}

// Field-wise equality; chat id lists compare in order.
fn diff_token_permissions(
    origin: &CommunityDescription,
    modified: &CommunityDescription,
    changes: &mut CommunityChanges,
) {
    for (id, permission) in &modified.token_permissions {
        match origin.token_permissions.get(id) {
            None => {
                changes.token_permissions_added.insert(
                    id.clone(),
                    CommunityTokenPermission::approved(permission.clone()),
                );
            }
            Some(old) if old != permission => {
                changes.token_permissions_modified.insert(
                    id.clone(),
                    CommunityTokenPermission::approved(permission.clone()),
                );
            }
            Some(_) => {}
        }
    }
    for (id, permission) in &origin.token_permissions {
        if !modified.token_permissions.contains_key(id) {
            changes.token_permissions_removed.insert(
                id.clone(),
                CommunityTokenPermission::approved(permission.clone()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{CommunityBanInfo, TokenPermissionType};
    use proptest::prelude::*;

    fn description() -> CommunityDescription {
        let mut d = CommunityDescription {
            id: "0x01".to_string(),
            ..Default::default()
        };
        d.members.insert("0xaa".to_string(), CommunityMember::default());
        d.members.insert("0xbb".to_string(), CommunityMember::default());
        let mut chat = CommunityChat::new("general");
        chat.members.insert("0xaa".to_string(), CommunityMember::default());
        d.chats.insert("general".to_string(), chat);
        d
    }

    #[test]
    fn test_diff_with_itself_is_empty() {
        let d = description();
        assert!(diff_descriptions(&d, &d).is_empty());
    }

    #[test]
    fn test_members_added_and_removed() {
        let origin = description();
        let mut modified = origin.clone();
        modified.members.remove("0xbb");
        modified
            .members
            .insert("0xcc".to_string(), CommunityMember::default());

        let changes = diff_descriptions(&origin, &modified);
        assert!(changes.has_new_member("0xcc"));
        assert!(changes.has_member_left("0xbb"));
        assert_eq!(changes.members_added.len(), 1);
        assert_eq!(changes.members_removed.len(), 1);
    }

    #[test]
    fn test_bans_from_both_lists() {
        let origin = description();
        let mut modified = origin.clone();
        modified.ban_list.push("0xbb".to_string());
        modified.banned_members.insert(
            "0xcc".to_string(),
            CommunityBanInfo {
                delete_all_messages: true,
            },
        );

        let changes = diff_descriptions(&origin, &modified);
        assert_eq!(changes.members_banned.get("0xbb"), Some(&false));
        assert_eq!(changes.members_banned.get("0xcc"), Some(&true));

        let reverse = diff_descriptions(&modified, &origin);
        assert!(reverse.members_unbanned.contains("0xbb"));
        assert!(reverse.members_unbanned.contains("0xcc"));
    }

    #[test]
    fn test_chat_modifications() {
        let origin = description();
        let mut modified = origin.clone();
        {
            let chat = modified.chats.get_mut("general").unwrap();
            chat.members.remove("0xaa");
            chat.members
                .insert("0xbb".to_string(), CommunityMember::default());
            chat.position = 3;
            chat.identity.first_message_timestamp = 77;
        }

        let changes = diff_descriptions(&origin, &modified);
        let chat_changes = changes.chats_modified.get("general").unwrap();
        assert!(chat_changes.members_added.contains_key("0xbb"));
        assert!(chat_changes.members_removed.contains_key("0xaa"));
        assert_eq!(chat_changes.position_modified, Some(3));
        assert_eq!(chat_changes.first_message_timestamp_modified, Some(77));
        assert_eq!(chat_changes.category_modified, None);
    }

    #[test]
    fn test_identity_only_chat_edit_is_not_a_modification() {
        let origin = description();
        let mut modified = origin.clone();
        modified
            .chats
            .get_mut("general")
            .unwrap()
            .identity
            .description = "new".to_string();

        assert!(diff_descriptions(&origin, &modified).chats_modified.is_empty());
    }

    #[test]
    fn test_token_permission_chat_order_matters() {
        let mut origin = description();
        origin.token_permissions.insert(
            "p".to_string(),
            TokenPermission {
                id: "p".to_string(),
                permission_type: TokenPermissionType::CanViewChannel,
                chat_ids: vec!["a".to_string(), "b".to_string()],
                ..Default::default()
            },
        );
        let mut modified = origin.clone();
        modified
            .token_permissions
            .get_mut("p")
            .unwrap()
            .chat_ids
            .reverse();

        let changes = diff_descriptions(&origin, &modified);
        assert!(changes.token_permissions_modified.contains_key("p"));
    }

    #[test]
    fn test_merge() {
        let mut a = CommunityChanges::empty("0x01");
        a.members_added
            .insert("0xaa".to_string(), CommunityMember::default());
        let mut b = CommunityChanges::empty("0x01");
        b.categories_removed.insert("c".to_string());
        b.should_member_join = true;

        a.merge(b);
        assert!(a.has_new_member("0xaa"));
        assert!(a.categories_removed.contains("c"));
        assert!(a.should_member_join);
    }

    fn key(n: u8) -> String {
        format!("0x{:02x}", n)
    }

    fn arb_description() -> impl Strategy<Value = CommunityDescription> {
        let members = prop::collection::btree_set(0u8..8, 0..8);
        let chats = prop::collection::btree_map(
            0u8..4,
            (prop::collection::btree_set(0u8..8, 0..6), 0u8..3, 0i32..3),
            0..4,
        );
        let categories = prop::collection::btree_map(0u8..3, (0u8..3, 0i32..3), 0..3);
        let permissions = prop::collection::btree_map(
            0u8..3,
            (any::<bool>(), prop::collection::vec(0u8..4, 0..3)),
            0..3,
        );

        (members, chats, categories, permissions).prop_map(|(members, chats, categories, permissions)| {
            let mut d = CommunityDescription {
                id: "0x01".to_string(),
                ..Default::default()
            };
            for m in members {
                d.members.insert(key(m), CommunityMember::default());
            }
            for (id, (chat_members, category, position)) in chats {
                let mut chat = CommunityChat::new(format!("chat-{}", id));
                chat.members = chat_members
                    .into_iter()
                    .map(|m| (key(m), CommunityMember::default()))
                    .collect();
                chat.category_id = format!("cat-{}", category);
                chat.position = position;
                d.chats.insert(format!("chat-{}", id), chat);
            }
            for (id, (name, position)) in categories {
                let category_id = format!("cat-{}", id);
                d.categories.insert(
                    category_id.clone(),
                    CommunityCategory {
                        category_id,
                        name: format!("name-{}", name),
                        position,
                    },
                );
            }
            for (id, (channel, chat_ids)) in permissions {
                let id = format!("perm-{}", id);
                d.token_permissions.insert(
                    id.clone(),
                    TokenPermission {
                        id,
                        permission_type: if channel {
                            TokenPermissionType::CanViewChannel
                        } else {
                            TokenPermissionType::BecomeMember
                        },
                        chat_ids: chat_ids.into_iter().map(|c| format!("chat-{}", c)).collect(),
                        ..Default::default()
                    },
                );
            }
            d
        })
    }

    // Replays a diff onto its origin. Bans, member payloads and identity-only
    // chat edits are not carried by the diff, so generated descriptions only
    // vary in membership, chat placement, categories and token permissions.
    fn apply(origin: &CommunityDescription, changes: &CommunityChanges) -> CommunityDescription {
        let mut d = origin.clone();

        for key in changes.members_removed.keys() {
            d.members.remove(key);
        }
        d.members.extend(changes.members_added.clone());

        for id in changes.chats_removed.keys() {
            d.chats.remove(id);
        }
        d.chats.extend(changes.chats_added.clone());
        for (id, chat_changes) in &changes.chats_modified {
            let chat = d.chats.get_mut(id).unwrap();
            for key in chat_changes.members_removed.keys() {
                chat.members.remove(key);
            }
            chat.members.extend(chat_changes.members_added.clone());
            if let Some(category) = &chat_changes.category_modified {
                chat.category_id = category.clone();
            }
            if let Some(position) = chat_changes.position_modified {
                chat.position = position;
            }
        }

        for id in &changes.categories_removed {
            d.categories.remove(id);
        }
        d.categories.extend(changes.categories_added.clone());
        d.categories.extend(changes.categories_modified.clone());

        for id in changes.token_permissions_removed.keys() {
            d.token_permissions.remove(id);
        }
        for (id, p) in changes
            .token_permissions_added
            .iter()
            .chain(&changes.token_permissions_modified)
        {
            d.token_permissions.insert(id.clone(), p.permission.clone());
        }
        d
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_diff_replays_onto_origin(origin in arb_description(), modified in arb_description()) {
            let changes = diff_descriptions(&origin, &modified);
            let replayed = apply(&origin, &changes);

            prop_assert_eq!(&replayed.members, &modified.members);
            prop_assert_eq!(&replayed.chats, &modified.chats);
            prop_assert_eq!(&replayed.categories, &modified.categories);
            prop_assert_eq!(&replayed.token_permissions, &modified.token_permissions);
        }

        #[test]
        fn prop_diff_with_itself_is_empty(d in arb_description()) {
            prop_assert!(diff_descriptions(&d, &d).is_empty());
        }
    }
}
