//! Performance benchmarks for subset assignment and queue drains

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use party_queue::config::AppConfig;
use party_queue::events::MockEventPublisher;
use party_queue::queue::{Candidate, QueueStores, SubsetAssigner};
use party_queue::service::AppState;
use party_queue::types::{GroupKind, QueueSize};
use std::sync::Arc;

fn candidates(count: usize) -> Vec<Candidate> {
    // Sizes that rarely combine early, so the search sees the whole window
    let sizes = [3usize, 3, 2, 3, 1];
    (0..count)
        .map(|i| Candidate::new(i as u64 + 1, sizes[i % sizes.len()]))
        .collect()
}

fn bench_subset_assignment(c: &mut Criterion) {
    let assigner = SubsetAssigner::new();
    let mut group = c.benchmark_group("subset_assignment");

    for count in [4usize, 10, 50, 200] {
        let window = candidates(count);
        group.bench_with_input(BenchmarkId::new("squad", count), &window, |b, window| {
            b.iter(|| black_box(assigner.assign(black_box(window), 4)))
        });
    }

    let unsolvable = vec![Candidate::new(1, 3); 200];
    group.bench_function("squad_no_match_200", |b| {
        b.iter(|| black_box(assigner.assign(black_box(&unsolvable), 4)))
    });

    group.finish();
}

fn create_bench_system() -> Arc<AppState> {
    let mut config = AppConfig::default();
    config.queue.drain_cooldown_ms = 0;

    let app = AppState::with_components(
        config,
        QueueStores::in_memory(),
        Arc::new(MockEventPublisher::new()),
    )
    .unwrap();
    Arc::new(app)
}

fn bench_full_drain(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("squad_drain_four_parties", |b| {
        b.iter(|| {
            rt.block_on(async {
                let app = create_bench_system();
                let api = app.api();

                // Parties of 2, 1 and 1 queued; the last arrival forms the match
                api.connect(1);
                api.connect(2);
                api.request_join_group(GroupKind::Party, 2, 1, None);
                for leader in [1, 3, 4] {
                    api.connect(leader);
                    api.enqueue_for_match(leader, 4).await;
                }

                black_box(app.queue().drain(QueueSize::Squad).await)
            })
        })
    });

    c.bench_function("duo_drain_full_buffer", |b| {
        b.iter(|| {
            rt.block_on(async {
                let app = create_bench_system();
                let api = app.api();

                // Parties of three fill the buffer and never fit a duo
                for leader in (1..=40u64).step_by(4) {
                    api.connect(leader);
                    for follower in leader + 1..leader + 3 {
                        api.connect(follower);
                        api.request_join_group(GroupKind::Party, follower, leader, None);
                    }
                    api.enqueue_for_match(leader, 2).await;
                }

                black_box(app.queue().drain(QueueSize::Duo).await)
            })
        })
    });
}

criterion_group!(benches, bench_subset_assignment, bench_full_drain);
criterion_main!(benches);
