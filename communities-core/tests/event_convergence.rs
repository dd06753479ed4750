/*
    Event Convergence Tests

    Replays batches of signed events from several privileged members on the
    control node and checks that the outcome does not depend on arrival
    order, that only the newest event per target survives, and that events
    older than the last applied one for their target are dropped.
*/

use communities_core::community::{Community, CommunityConfig, ManualTimeSource};
use communities_core::crypto::PrivateKey;
use communities_core::description::{wrap_description, CommunityChat, MemberRole};
use communities_core::events::{CategoryData, CommunityEvent, CommunityEventKind, CommunityEventsMessage};
use communities_core::test_utils::{
    assert_descriptions_converged, shuffled, test_private_key, TestCommunityBuilder,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

struct Fixture {
    builder: TestCommunityBuilder,
    admin: PrivateKey,
    token_master: PrivateKey,
}

fn fixture() -> Fixture {
    let admin = test_private_key(1);
    let token_master = test_private_key(2);
    let builder = TestCommunityBuilder::new()
        .with_community_key(test_private_key(100))
        .with_member(&admin.public_key().to_hex(), vec![MemberRole::Admin])
        .with_member(&token_master.public_key().to_hex(), vec![MemberRole::TokenMaster])
        .with_chat("general", CommunityChat::new("General"));

    Fixture {
        builder,
        admin,
        token_master,
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

fn chat_edit(channel_id: &str, name: &str) -> CommunityEventKind {
    CommunityEventKind::ChannelEdit {
        channel_id: channel_id.to_string(),
        channel: CommunityChat::new(name),
    }
}

/// A batch touching channels and categories from two members, with two
/// competing edits of "general"
fn mixed_batch(f: &Fixture) -> Vec<CommunityEvent> {
    vec![
        signed(
            10,
            CommunityEventKind::ChannelCreate {
                channel_id: "news".to_string(),
                channel: CommunityChat::new("News"),
            },
            &f.admin,
        ),
        signed(
            11,
            CommunityEventKind::CategoryCreate(CategoryData {
                category_id: "cat".to_string(),
                name: "Announcements".to_string(),
                channel_ids: Vec::new(),
            }),
            &f.token_master,
        ),
        signed(12, chat_edit("general", "General (admin)"), &f.admin),
        signed(13, chat_edit("general", "General (token master)"), &f.token_master),
        signed(14, chat_edit("news", "Breaking news"), &f.token_master),
        signed(
            15,
            CommunityEventKind::ChannelDelete {
                channel_id: "news".to_string(),
            },
            &f.admin,
        ),
    ]
}

#[test]
fn test_newest_event_per_target_wins() {
    let f = fixture();
    let control = f.builder.build();

    let processed = control
        .process_events(&message_for(&f.builder, mixed_batch(&f)))
        .unwrap();

    let chats = control.chats();
    assert_eq!(chats["general"].identity.display_name, "General (token master)");
    assert!(!chats.contains_key("news"));
    assert!(control.description().categories.contains_key("cat"));

    // The admin's edit of "general" lost to the later one
    assert_eq!(processed.dropped, 1);
    assert_eq!(processed.applied.len(), 5);
    assert!(processed
        .applied
        .windows(2)
        .all(|pair| pair[0].clock <= pair[1].clock));
}

#[test]
fn test_equal_clock_conflict_is_deterministic() {
    let f = fixture();
    let events = vec![
        signed(20, chat_edit("general", "From admin"), &f.admin),
        signed(20, chat_edit("general", "From token master"), &f.token_master),
    ];

    let first = f.builder.build();
    first
        .process_events(&message_for(&f.builder, events.clone()))
        .unwrap();

    let second = f.builder.build();
    let reversed: Vec<_> = events.into_iter().rev().collect();
    second
        .process_events(&message_for(&f.builder, reversed))
        .unwrap();

    assert_descriptions_converged(&first.description(), &second.description());
}

#[test]
fn test_outdated_events_are_dropped() {
    let f = fixture();
    let builder = f
        .builder
        .clone()
        .with_chat("chat:123", CommunityChat::new("Original"));

    let probe = signed(1, chat_edit("chat:123", "probe"), &f.admin);
    let stream = probe.event_type_id();

    let id = builder.community_id();
    let mut config = CommunityConfig::new(id, id, builder.description());
    config.private_key = Some(builder.community_key().clone());
    config.control_device = true;
    config.last_applied_events = BTreeMap::from([(stream.clone(), 50)]);
    let control = Community::new(config, Arc::new(ManualTimeSource::new(1_000))).unwrap();

    let processed = control
        .process_events(&message_for(
            &builder,
            vec![
                signed(40, chat_edit("chat:123", "Forty"), &f.admin),
                signed(60, chat_edit("chat:123", "Sixty"), &f.admin),
            ],
        ))
        .unwrap();

    assert_eq!(processed.applied.len(), 1);
    assert_eq!(processed.applied[0].clock, 60);
    assert_eq!(control.chats()["chat:123"].identity.display_name, "Sixty");
    assert_eq!(control.snapshot().last_applied_events()[&stream], 60);

    // Replaying an older edit later changes nothing
    let clock = control.clock();
    let processed = control
        .process_events(&message_for(
            &builder,
            vec![signed(55, chat_edit("chat:123", "Fifty-five"), &f.admin)],
        ))
        .unwrap();
    assert!(processed.applied.is_empty());
    assert_eq!(processed.dropped, 1);
    assert_eq!(control.chats()["chat:123"].identity.display_name, "Sixty");
    assert!(control.clock() > clock);
}

#[test]
fn test_member_stores_events_without_applying() {
    let f = fixture();
    let view = f.builder.clone().as_member(&f.admin).build();

    view.process_events(&message_for(&f.builder, mixed_batch(&f)))
        .unwrap();

    assert_eq!(view.clock(), 1);
    assert!(!view.chats().contains_key("news"));
    assert_eq!(view.pending_events().len(), 5);

    // The preview shows what the control node is going to end up with
    let control = f.builder.build();
    control
        .process_events(&message_for(&f.builder, mixed_batch(&f)))
        .unwrap();
    let preview = view.preview_description();
    assert_eq!(preview.chats.keys().collect::<Vec<_>>(), control.chats().keys().collect::<Vec<_>>());
    assert_eq!(preview.categories, control.description().categories);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_replay_is_order_independent(seed in any::<u64>()) {
        let f = fixture();
        let events = mixed_batch(&f);

        let reference = f.builder.build();
        reference.process_events(&message_for(&f.builder, events.clone())).unwrap();

        let replica = f.builder.build();
        replica
            .process_events(&message_for(&f.builder, shuffled(&events, seed)))
            .unwrap();

        prop_assert_eq!(replica.description(), reference.description());
    }

    #[test]
    fn prop_split_batches_converge(seed in any::<u64>(), split in 0usize..=6) {
        let f = fixture();
        let events = shuffled(&mixed_batch(&f), seed);
        let (first, second) = events.split_at(split);

        // Pending events on a member view are merged with the next batch
        let view = f.builder.clone().as_member(&f.admin).build();
        view.process_events(&message_for(&f.builder, first.to_vec())).unwrap();
        view.process_events(&message_for(&f.builder, second.to_vec())).unwrap();

        let reference = f.builder.build();
        reference.process_events(&message_for(&f.builder, mixed_batch(&f))).unwrap();

        let preview = view.preview_description();
        prop_assert_eq!(&preview.chats, &reference.description().chats);
        prop_assert_eq!(&preview.categories, &reference.description().categories);
    }
}
