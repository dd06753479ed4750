use communities_core::changes::diff_descriptions;
use communities_core::crypto::PrivateKey;
use communities_core::description::{wrap_description, CommunityChat, MemberRole};
use communities_core::events::{CommunityEvent, CommunityEventKind, CommunityEventsMessage};
use communities_core::test_utils::{test_private_key, TestCommunityBuilder};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

// Community with `members` plain members and one chat per ten members
fn populated_builder(members: usize) -> TestCommunityBuilder {
    let mut builder = TestCommunityBuilder::new().with_community_key(test_private_key(1));
    for i in 0..members {
        builder = builder.with_member(&test_private_key(1_000 + i as u64).public_key().to_hex(), Vec::new());
    }
    for i in 0..members / 10 {
        builder = builder.with_chat(&format!("chat-{}", i), CommunityChat::new(format!("Chat {}", i)));
    }
    builder
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("community_diff");

    for members in [10, 100, 1_000].iter() {
        let origin = populated_builder(*members).description();
        let mut modified = origin.clone();
        modified.clock += 1;
        let removed: Vec<String> = modified.members.keys().take(members / 10).cloned().collect();
        for key in &removed {
            modified.members.remove(key);
            for chat in modified.chats.values_mut() {
                chat.members.remove(key);
            }
        }

        group.throughput(Throughput::Elements(*members as u64));
        group.bench_with_input(BenchmarkId::new("members", members), members, |b, _| {
            b.iter(|| black_box(diff_descriptions(&origin, &modified)));
        });
    }

    group.finish();
}

fn bench_event_processing(c: &mut Criterion) {
    let mut group = c.benchmark_group("community_events");
    let admin = test_private_key(2);
    let builder = populated_builder(100).with_member(&admin.public_key().to_hex(), vec![MemberRole::Admin]);
    let base = wrap_description(&builder.description(), builder.community_key()).unwrap();

    for batch_size in [10, 100].iter() {
        let events: Vec<CommunityEvent> = (0..*batch_size)
            .map(|i| {
                let mut event = CommunityEvent::new(
                    10 + i as u64,
                    CommunityEventKind::ChannelCreate {
                        channel_id: format!("bench-{}", i),
                        channel: CommunityChat::new(format!("Bench {}", i)),
                    },
                )
                .unwrap();
                event.sign(&admin).unwrap();
                event
            })
            .collect();
        let message = CommunityEventsMessage {
            community_id: builder.community_id().compressed(),
            events_base_description: base.clone(),
            events,
        };

        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(BenchmarkId::new("control_node", batch_size), batch_size, |b, _| {
            b.iter_batched(
                || builder.build(),
                |community| black_box(community.process_events(&message).unwrap()),
                BatchSize::SmallInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("member", batch_size), batch_size, |b, _| {
            b.iter_batched(
                || builder.clone().as_member(&admin).build(),
                |community| black_box(community.process_events(&message).unwrap()),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_mutations(c: &mut Criterion) {
    let mut group = c.benchmark_group("community_mutations");
    let builder = populated_builder(100);

    group.bench_function("create_chat", |b| {
        b.iter_batched(
            || builder.build(),
            |community| black_box(community.create_chat("new", CommunityChat::new("New")).unwrap()),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("add_member", |b| {
        let member = PrivateKey::generate().public_key();
        b.iter_batched(
            || builder.build(),
            |community| black_box(community.add_member(&member, Vec::new()).unwrap()),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("sign_description", |b| {
        let community = builder.build();
        b.iter(|| black_box(community.to_protocol_message_bytes().unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_diff, bench_event_processing, bench_mutations);
criterion_main!(benches);
