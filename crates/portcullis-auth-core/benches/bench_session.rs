//! Benchmarks for session table hot paths

use std::collections::BTreeSet;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use portcullis_auth_core::{RandomIdGenerator, SessionConfig, SessionStore, SystemClock};
use portcullis_types::UserInfo;

/// Built outside a runtime, so no sweep task is spawned
fn store() -> SessionStore {
    SessionStore::new(
        SessionConfig::default(),
        Arc::new(SystemClock),
        Arc::new(RandomIdGenerator),
    )
}

fn permissions() -> BTreeSet<String> {
    ["basic", "chat", "advanced"].iter().map(|p| p.to_string()).collect()
}

fn bench_session_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_create");

    for prefill in [0usize, 1_000, 10_000] {
        let store = store();
        for i in 0..prefill {
            store.create(UserInfo::new(format!("user-{i}")), permissions());
        }

        group.bench_with_input(BenchmarkId::from_parameter(prefill), &store, |b, store| {
            let user = UserInfo::new("bench-user").with_email("bench@example.com");
            b.iter(|| store.create(black_box(user.clone()), permissions()));
        });
    }

    group.finish();
}

fn bench_session_lookup(c: &mut Criterion) {
    let store = store();
    let ids: Vec<_> = (0..1_000)
        .map(|i| store.create(UserInfo::new(format!("user-{i}")), permissions()).id)
        .collect();
    let missing = portcullis_types::SessionId::new("sess_0_missing");

    let mut group = c.benchmark_group("session_lookup");

    group.bench_function("validate_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % ids.len();
            store.validate(black_box(&ids[i]))
        });
    });

    group.bench_function("validate_miss", |b| {
        b.iter(|| store.validate(black_box(&missing)));
    });

    group.bench_function("sessions_for_user", |b| {
        b.iter(|| store.sessions_for_user(black_box("user-500")));
    });

    group.finish();
}

fn bench_session_refresh(c: &mut Criterion) {
    let store = store();
    let mut current = store.create(UserInfo::new("refresh-user"), permissions()).id;

    c.bench_function("session_refresh", |b| {
        b.iter(|| {
            let next = store.refresh(black_box(&current)).map(|s| s.id);
            if let Ok(id) = next {
                current = id;
            }
        });
    });
}

criterion_group!(
    benches,
    bench_session_create,
    bench_session_lookup,
    bench_session_refresh,
);
criterion_main!(benches);
