//! Role authorization matrix
//!
//! Static lookup tables from a member role to the event types it may
//! propose and the token permission types it may create or modify, plus the
//! kick/ban rule which is evaluated against the *current* roles of sender
//! and target.

use crate::description::{MemberRole, TokenPermissionType};
use crate::events::{CommunityEvent, EventType};

const ADMIN_EVENTS: &[EventType] = &[
    EventType::CommunityEdit,
    EventType::TokenPermissionChange,
    EventType::TokenPermissionDelete,
    EventType::CategoryCreate,
    EventType::CategoryDelete,
    EventType::CategoryEdit,
    EventType::ChannelCreate,
    EventType::ChannelDelete,
    EventType::ChannelEdit,
    EventType::CategoryReorder,
    EventType::ChannelReorder,
    EventType::RequestToJoinAccept,
    EventType::RequestToJoinReject,
    EventType::MemberKick,
    EventType::MemberBan,
    EventType::MemberUnban,
    EventType::DeleteBannedMemberMessages,
];

const TOKEN_MASTER_EVENTS: &[EventType] = &[
    EventType::CommunityEdit,
    EventType::TokenPermissionChange,
    EventType::TokenPermissionDelete,
    EventType::CategoryCreate,
    EventType::CategoryDelete,
    EventType::CategoryEdit,
    EventType::ChannelCreate,
    EventType::ChannelDelete,
    EventType::ChannelEdit,
    EventType::CategoryReorder,
    EventType::ChannelReorder,
    EventType::RequestToJoinAccept,
    EventType::RequestToJoinReject,
    EventType::MemberKick,
    EventType::MemberBan,
    EventType::MemberUnban,
    EventType::TokenAdd,
    EventType::DeleteBannedMemberMessages,
];

const OWNER_EVENTS: &[EventType] = TOKEN_MASTER_EVENTS;

const ADMIN_PERMISSIONS: &[TokenPermissionType] = &[
    TokenPermissionType::BecomeMember,
    TokenPermissionType::CanViewChannel,
    TokenPermissionType::CanViewAndPostChannel,
];

const TOKEN_MASTER_PERMISSIONS: &[TokenPermissionType] = ADMIN_PERMISSIONS;

const OWNER_PERMISSIONS: &[TokenPermissionType] = &[
    TokenPermissionType::BecomeMember,
    TokenPermissionType::CanViewChannel,
    TokenPermissionType::CanViewAndPostChannel,
    TokenPermissionType::BecomeAdmin,
    TokenPermissionType::BecomeTokenMaster,
];

/// Event types a role may propose
pub fn allowed_events(role: MemberRole) -> &'static [EventType] {
    match role {
        MemberRole::Owner => OWNER_EVENTS,
        MemberRole::TokenMaster => TOKEN_MASTER_EVENTS,
        MemberRole::Admin => ADMIN_EVENTS,
        MemberRole::None => &[],
    }
}

/// Token permission types a role may create, modify or delete
pub fn allowed_permission_types(role: MemberRole) -> &'static [TokenPermissionType] {
    match role {
        MemberRole::Owner => OWNER_PERMISSIONS,
        MemberRole::TokenMaster => TOKEN_MASTER_PERMISSIONS,
        MemberRole::Admin => ADMIN_PERMISSIONS,
        MemberRole::None => &[],
    }
}

pub fn can_roles_perform_event(roles: &[MemberRole], event_type: EventType) -> bool {
    roles
        .iter()
        .any(|role| allowed_events(*role).contains(&event_type))
}

pub fn can_roles_modify_permission(roles: &[MemberRole], permission_type: TokenPermissionType) -> bool {
    roles
        .iter()
        .any(|role| allowed_permission_types(*role).contains(&permission_type))
}

/// Owner acts on anyone, token master on anyone below it, admin only on
/// members without a privileged role.
pub fn can_roles_kick_or_ban(sender_roles: &[MemberRole], target_roles: &[MemberRole]) -> bool {
    let target_privileged = target_roles.iter().any(|r| r.is_privileged());

    if sender_roles.contains(&MemberRole::Owner) {
        return true;
    }
    if sender_roles.contains(&MemberRole::TokenMaster) {
        return !target_roles.contains(&MemberRole::Owner)
            && !target_roles.contains(&MemberRole::TokenMaster);
    }
    if sender_roles.contains(&MemberRole::Admin) {
        return !target_privileged;
    }
    false
}

/// Full authorization check for an incoming event.
///
/// `target_roles` must come from the current description, never from the
/// event itself.
pub fn roles_authorized_to_perform_event(
    sender_roles: &[MemberRole],
    target_roles: &[MemberRole],
    event: &CommunityEvent,
) -> bool {
    let event_type = event.event_type();
    if !can_roles_perform_event(sender_roles, event_type) {
        return false;
    }

    if matches!(event_type, EventType::MemberKick | EventType::MemberBan) {
        return can_roles_kick_or_ban(sender_roles, target_roles);
    }

    if let Some(permission) = event.token_permission() {
        return can_roles_modify_permission(sender_roles, permission.permission_type);
    }

    true
}

/// Highest ranked role: owner, then token master, then admin
pub fn highest_role(roles: &[MemberRole]) -> MemberRole {
    [MemberRole::Owner, MemberRole::TokenMaster, MemberRole::Admin]
        .into_iter()
        .find(|r| roles.contains(r))
        .unwrap_or(MemberRole::None)
}

pub fn is_privileged(roles: &[MemberRole]) -> bool {
    roles.iter().any(|r| r.is_privileged())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{CommunityTokenMetadata, TokenPermission};
    use crate::events::CommunityEventKind;

    fn event(kind: CommunityEventKind) -> CommunityEvent {
        CommunityEvent::new(1, kind).unwrap()
    }

    #[test]
    fn test_owner_superset_of_admin() {
        for e in ADMIN_EVENTS {
            assert!(OWNER_EVENTS.contains(e));
            assert!(TOKEN_MASTER_EVENTS.contains(e));
        }
        assert!(!ADMIN_EVENTS.contains(&EventType::TokenAdd));
    }

    #[test]
    fn test_plain_member_cannot_do_anything() {
        assert!(!can_roles_perform_event(&[], EventType::CommunityEdit));
        assert!(!can_roles_perform_event(&[MemberRole::None], EventType::ChannelCreate));
    }

    #[test]
    fn test_token_add_requires_token_master() {
        let e = event(CommunityEventKind::TokenAdd(CommunityTokenMetadata {
            name: "Panda".to_string(),
            ..Default::default()
        }));
        assert!(!roles_authorized_to_perform_event(&[MemberRole::Admin], &[], &e));
        assert!(roles_authorized_to_perform_event(&[MemberRole::TokenMaster], &[], &e));
        assert!(roles_authorized_to_perform_event(&[MemberRole::Owner], &[], &e));
    }

    #[test]
    fn test_only_owner_grants_admin() {
        let permission = TokenPermission {
            id: "p".to_string(),
            permission_type: TokenPermissionType::BecomeAdmin,
            ..Default::default()
        };
        let e = event(CommunityEventKind::TokenPermissionChange(permission));

        assert!(!roles_authorized_to_perform_event(&[MemberRole::Admin], &[], &e));
        assert!(!roles_authorized_to_perform_event(&[MemberRole::TokenMaster], &[], &e));
        assert!(roles_authorized_to_perform_event(&[MemberRole::Owner], &[], &e));
    }

    #[test]
    fn test_kick_rules() {
        use MemberRole::*;
        assert!(can_roles_kick_or_ban(&[Owner], &[Owner]));
        assert!(can_roles_kick_or_ban(&[TokenMaster], &[Admin]));
        assert!(!can_roles_kick_or_ban(&[TokenMaster], &[TokenMaster]));
        assert!(!can_roles_kick_or_ban(&[TokenMaster], &[Owner]));
        assert!(can_roles_kick_or_ban(&[Admin], &[]));
        assert!(!can_roles_kick_or_ban(&[Admin], &[Admin]));
        assert!(!can_roles_kick_or_ban(&[Admin], &[TokenMaster]));
        assert!(!can_roles_kick_or_ban(&[], &[]));
    }

    #[test]
    fn test_admin_kick_of_token_master_rejected() {
        let e = event(CommunityEventKind::MemberKick {
            member: "0xaa".to_string(),
        });
        assert!(!roles_authorized_to_perform_event(
            &[MemberRole::Admin],
            &[MemberRole::TokenMaster],
            &e
        ));
        assert!(roles_authorized_to_perform_event(&[MemberRole::Admin], &[], &e));
    }

    #[test]
    fn test_highest_role() {
        use MemberRole::*;
        assert_eq!(highest_role(&[Admin, Owner]), Owner);
        assert_eq!(highest_role(&[Admin, TokenMaster]), TokenMaster);
        assert_eq!(highest_role(&[Admin]), Admin);
        assert_eq!(highest_role(&[]), None);
    }
}
