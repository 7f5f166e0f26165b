//! Benchmarks for the hub's hot paths.
//!
//! Run with: `cargo bench -p knowhub-contracts`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use knowhub_contracts::deployment::{BootstrapConfig, Deployment};
use knowhub_protocol::Address;

fn bench_submit_entry(c: &mut Criterion) {
    let creator = Address::derive("bench-creator");

    c.bench_function("submit_entry", |b| {
        b.iter_batched(
            || Deployment::bootstrap(&BootstrapConfig::default()).unwrap(),
            |mut deployment| {
                deployment
                    .submit_entry(black_box(&creator), "title", "bafy-content")
                    .unwrap()
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_upvote_with_reward(c: &mut Criterion) {
    let creator = Address::derive("bench-creator");
    let voters: Vec<Address> = (0..100)
        .map(|i| Address::derive(&format!("voter-{i}")))
        .collect();

    c.bench_function("upvote_100_voters", |b| {
        b.iter_batched(
            || {
                let mut deployment =
                    Deployment::bootstrap(&BootstrapConfig::default()).unwrap();
                let id = deployment.submit_entry(&creator, "t", "r").unwrap();
                (deployment, id)
            },
            |(mut deployment, id)| {
                for voter in &voters {
                    deployment.vote_on_entry(voter, id, true).unwrap();
                }
                deployment
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_entries_by_creator(c: &mut Criterion) {
    let mut deployment = Deployment::bootstrap(&BootstrapConfig::default()).unwrap();
    let creators: Vec<Address> = (0..10)
        .map(|i| Address::derive(&format!("creator-{i}")))
        .collect();
    for i in 0..1_000 {
        deployment
            .submit_entry(&creators[i % creators.len()], "t", "r")
            .unwrap();
    }

    c.bench_function("entries_by_creator_1000", |b| {
        b.iter(|| deployment.hub.get_entries_by_creator(black_box(&creators[3])));
    });
}

criterion_group!(
    benches,
    bench_submit_entry,
    bench_upvote_with_reward,
    bench_entries_by_creator
);
criterion_main!(benches);
