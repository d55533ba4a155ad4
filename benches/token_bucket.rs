use criterion::{black_box, criterion_group, criterion_main, Criterion};
use traffic_shield::core::defense::DefenseState;
use traffic_shield::core::{AttackKind, TokenBucket};
use traffic_shield::models::DefenseConfig;

fn token_bucket_benchmark(c: &mut Criterion) {
    c.bench_function("token_bucket_consume", |b| {
        let mut bucket = TokenBucket::new(1_000_000.0, 1_000_000.0);
        b.iter(|| black_box(bucket.consume(black_box(1.0))))
    });
}

fn defense_check_benchmark(c: &mut Criterion) {
    c.bench_function("defense_rate_limit_check", |b| {
        let mut defense = DefenseState::new(&DefenseConfig::default());
        defense.apply_defense("10.0.0.1", AttackKind::RateLimitExceeded);
        b.iter(|| black_box(defense.check_rate_limit(black_box("10.0.0.1"))))
    });
}

criterion_group!(benches, token_bucket_benchmark, defense_check_benchmark);
criterion_main!(benches);
