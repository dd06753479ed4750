/*
    Event Authorization Tests

    Feeds events from members with different roles to the control node and
    checks the role matrix: which event types each role may send, which
    token permission types it may touch, and who may kick or ban whom.
    Unauthorized events are dropped from the batch without failing it.
    Proposed request-to-join decisions only ever act on requests the control
    node holds itself.
*/

use communities_core::community::{RequestToJoin, RequestToJoinState};
use communities_core::crypto::PrivateKey;
use communities_core::description::{
    wrap_description, CommunityTokenMetadata, MemberRole, RevealedAccount, TokenPermissionType,
    TokenType,
};
use communities_core::events::{CommunityEvent, CommunityEventKind, CommunityEventsMessage};
use communities_core::test_utils::{test_private_key, token_permission, TestCommunityBuilder};
use communities_core::CommunityError;

struct Roles {
    builder: TestCommunityBuilder,
    admin: PrivateKey,
    token_master: PrivateKey,
    member: PrivateKey,
    outsider: PrivateKey,
}

fn roles() -> Roles {
    let admin = test_private_key(11);
    let token_master = test_private_key(12);
    let member = test_private_key(13);
    let outsider = test_private_key(14);

    let builder = TestCommunityBuilder::new()
        .with_member(&admin.public_key().to_hex(), vec![MemberRole::Admin])
        .with_member(&token_master.public_key().to_hex(), vec![MemberRole::TokenMaster])
        .with_member(&member.public_key().to_hex(), Vec::new());

    Roles {
        builder,
        admin,
        token_master,
        member,
        outsider,
    }
}

fn signed(clock: u64, kind: CommunityEventKind, key: &PrivateKey) -> CommunityEvent {
    let mut event = CommunityEvent::new(clock, kind).unwrap();
    event.sign(key).unwrap();
    event
}

fn message_for(builder: &TestCommunityBuilder, events: Vec<CommunityEvent>) -> CommunityEventsMessage {
    CommunityEventsMessage {
        community_id: builder.community_id().compressed(),
        events_base_description: wrap_description(&builder.description(), builder.community_key())
            .unwrap(),
        events,
    }
}

fn token_add(name: &str) -> CommunityEventKind {
    CommunityEventKind::TokenAdd(CommunityTokenMetadata {
        contract_addresses: [(1, "0x0000000000000000000000000000000000000abc".to_string())]
            .into_iter()
            .collect(),
        token_type: TokenType::Erc20,
        symbol: name.to_uppercase(),
        name: name.to_string(),
        decimals: 18,
        ..Default::default()
    })
}

fn kick(target: &PrivateKey) -> CommunityEventKind {
    CommunityEventKind::MemberKick {
        member: target.public_key().to_hex(),
    }
}

fn join_request(community_id: &str, requester: &PrivateKey, address: &str) -> RequestToJoin {
    RequestToJoin::new(&requester.public_key(), community_id, 1).with_revealed_accounts(vec![
        RevealedAccount {
            address: address.to_string(),
            chain_ids: vec![1],
            is_airdrop_address: false,
        },
    ])
}

fn accept(request: &RequestToJoin) -> CommunityEventKind {
    CommunityEventKind::RequestToJoinAccept {
        member: request.public_key.clone(),
        request: request.clone(),
    }
}

#[test]
fn test_only_token_master_may_add_tokens() {
    let r = roles();
    let control = r.builder.build();

    let processed = control
        .process_events(&message_for(&r.builder, vec![signed(5, token_add("admin-token"), &r.admin)]))
        .unwrap();
    assert!(processed.applied.is_empty());
    assert_eq!(processed.dropped, 1);
    assert!(control.description().tokens_metadata.is_empty());

    let processed = control
        .process_events(&message_for(
            &r.builder,
            vec![signed(6, token_add("master-token"), &r.token_master)],
        ))
        .unwrap();
    assert_eq!(processed.applied.len(), 1);
    assert_eq!(control.description().tokens_metadata[0].name, "master-token");
}

#[test]
fn test_admin_cannot_create_privileged_permissions() {
    let r = roles();
    let control = r.builder.build();

    let events = vec![
        signed(
            5,
            CommunityEventKind::TokenPermissionChange(token_permission(
                "become-member",
                TokenPermissionType::BecomeMember,
            )),
            &r.admin,
        ),
        signed(
            6,
            CommunityEventKind::TokenPermissionChange(token_permission(
                "become-token-master",
                TokenPermissionType::BecomeTokenMaster,
            )),
            &r.admin,
        ),
    ];

    let processed = control.process_events(&message_for(&r.builder, events)).unwrap();
    assert_eq!(processed.dropped, 1);

    let permissions = control.description().token_permissions;
    assert!(permissions.contains_key("become-member"));
    assert!(!permissions.contains_key("become-token-master"));
}

#[test]
fn test_kick_guard_follows_current_roles() {
    let r = roles();
    let control = r.builder.build();

    let events = vec![
        signed(5, kick(&r.token_master), &r.admin),
        signed(6, kick(&r.member), &r.admin),
    ];
    let processed = control.process_events(&message_for(&r.builder, events)).unwrap();
    assert_eq!(processed.dropped, 1);
    assert!(control.has_member(&r.token_master.public_key()));
    assert!(!control.has_member(&r.member.public_key()));

    // A token master outranks an admin
    let processed = control
        .process_events(&message_for(&r.builder, vec![signed(7, kick(&r.admin), &r.token_master)]))
        .unwrap();
    assert_eq!(processed.applied.len(), 1);
    assert!(!control.has_member(&r.admin.public_key()));
}

#[test]
fn test_plain_members_and_outsiders_are_ignored() {
    let r = roles();
    let control = r.builder.build();
    let clock = control.clock();

    let create = |name: &str| CommunityEventKind::ChannelCreate {
        channel_id: name.to_string(),
        channel: communities_core::description::CommunityChat::new(name),
    };
    let events = vec![
        signed(5, create("from-member"), &r.member),
        signed(6, create("from-outsider"), &r.outsider),
    ];

    let processed = control.process_events(&message_for(&r.builder, events)).unwrap();
    assert_eq!(processed.dropped, 2);
    assert!(control.chats().is_empty());
    // The batch itself is still consumed
    assert!(control.clock() > clock);
}

#[test]
fn test_unsigned_events_are_dropped() {
    let r = roles();
    let control = r.builder.build();

    let unsigned = CommunityEvent::new(5, token_add("unsigned")).unwrap();
    let processed = control
        .process_events(&message_for(&r.builder, vec![unsigned]))
        .unwrap();
    assert_eq!(processed.dropped, 1);
    assert!(control.description().tokens_metadata.is_empty());
}

#[test]
fn test_base_from_another_signer_is_rejected() {
    let r = roles();
    let control = r.builder.build();

    let mut message = message_for(&r.builder, vec![signed(5, token_add("t"), &r.token_master)]);
    message.events_base_description =
        wrap_description(&r.builder.description(), &r.admin).unwrap();

    assert!(control.process_events(&message).is_err());
    assert!(control.description().tokens_metadata.is_empty());
}

#[test]
fn test_member_view_gates_mutators_by_role() {
    let r = roles();

    let admin_view = r.builder.clone().as_member(&r.admin).build();
    assert!(matches!(
        admin_view.add_tokens_metadata(CommunityTokenMetadata::default()),
        Err(CommunityError::NotAuthorized)
    ));
    assert!(admin_view
        .upsert_token_permission(token_permission("p", TokenPermissionType::BecomeMember))
        .is_ok());
    assert_eq!(admin_view.pending_events().len(), 1);

    let member_view = r.builder.clone().as_member(&r.member).build();
    assert!(matches!(
        member_view.create_chat("x", communities_core::description::CommunityChat::new("X")),
        Err(CommunityError::NotAuthorized)
    ));
    assert!(member_view.pending_events().is_empty());
}

#[test]
fn test_accept_naming_another_member_is_dropped() {
    let r = roles();
    let control = r.builder.build();
    let requester = test_private_key(15);
    let request = join_request(&control.id_string(), &requester, "0xaaa");
    control.add_request_to_join(request.clone());

    let kind = CommunityEventKind::RequestToJoinAccept {
        member: r.outsider.public_key().to_hex(),
        request: request.clone(),
    };
    let processed = control
        .process_events(&message_for(&r.builder, vec![signed(5, kind, &r.admin)]))
        .unwrap();

    assert_eq!(processed.dropped, 1);
    assert!(!control.has_member(&r.outsider.public_key()));
    assert!(!control.has_member(&requester.public_key()));
    assert_eq!(
        control.request_to_join(&request.id).unwrap().state,
        RequestToJoinState::Pending
    );
}

#[test]
fn test_accept_without_local_request_does_not_admit() {
    let r = roles();
    let control = r.builder.build();
    let stranger = test_private_key(16);
    let fabricated = join_request(&control.id_string(), &stranger, "0xbbb");

    control
        .process_events(&message_for(&r.builder, vec![signed(5, accept(&fabricated), &r.admin)]))
        .unwrap();

    assert!(!control.has_member(&stranger.public_key()));
    assert_eq!(
        control.request_to_join(&fabricated.id).unwrap().state,
        RequestToJoinState::AcceptedPending
    );
}

#[test]
fn test_accept_does_not_revive_canceled_request() {
    let r = roles();
    let control = r.builder.build();
    let requester = test_private_key(17);
    let request = join_request(&control.id_string(), &requester, "0xccc");
    control.add_request_to_join(request.clone());
    control.cancel_request_to_join(&request.id).unwrap();

    control
        .process_events(&message_for(&r.builder, vec![signed(5, accept(&request), &r.admin)]))
        .unwrap();

    assert!(!control.has_member(&requester.public_key()));
    assert_eq!(
        control.request_to_join(&request.id).unwrap().state,
        RequestToJoinState::Canceled
    );
}

#[test]
fn test_accept_admits_with_locally_revealed_accounts() {
    let r = roles();
    let control = r.builder.build();
    let requester = test_private_key(18);
    let request = join_request(&control.id_string(), &requester, "0xddd");
    control.add_request_to_join(request.clone());

    let mut forged = request.clone();
    forged.revealed_accounts[0].address = "0xeee".to_string();
    control
        .process_events(&message_for(&r.builder, vec![signed(5, accept(&forged), &r.admin)]))
        .unwrap();

    let key = requester.public_key();
    assert!(control.has_member(&key));
    assert_eq!(
        control.members()[&key.to_hex()].revealed_accounts,
        request.revealed_accounts
    );
    assert_eq!(
        control.request_to_join(&request.id).unwrap().state,
        RequestToJoinState::Accepted
    );
}

#[test]
fn test_reject_does_not_override_accepted_request() {
    let r = roles();
    let control = r.builder.build();
    let requester = test_private_key(19);
    let request = join_request(&control.id_string(), &requester, "0xfff");
    control.add_request_to_join(request.clone());
    control.accept_request_to_join(&request.id).unwrap();

    let reject = CommunityEventKind::RequestToJoinReject {
        member: request.public_key.clone(),
        request: request.clone(),
    };
    control
        .process_events(&message_for(&r.builder, vec![signed(5, reject, &r.admin)]))
        .unwrap();

    assert!(control.has_member(&requester.public_key()));
    assert_eq!(
        control.request_to_join(&request.id).unwrap().state,
        RequestToJoinState::Accepted
    );
}
