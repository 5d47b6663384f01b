use criterion::{criterion_group, criterion_main, Criterion};
use interbox_storage::models::{GamificationState, Preferences};
use interbox_storage::services::StorageManager;
use interbox_storage::store::{keys, MemoryStore};
use std::hint::black_box;
use std::sync::Arc;

fn seeded_storage() -> StorageManager {
    let storage = StorageManager::new(Arc::new(MemoryStore::new()));
    let mut gamification = GamificationState::default();
    for _ in 0..50 {
        gamification.add_points(25);
    }
    for i in 0..40 {
        gamification.add_achievement(format!("achievement_{i}"));
    }
    storage.set_gamification(gamification);
    storage.set_preferences(&Preferences::default());
    storage
}

fn benchmark_reads(c: &mut Criterion) {
    let storage = seeded_storage();

    let mut group = c.benchmark_group("typed_reads");

    group.bench_function("gamification_cached", |b| {
        b.iter(|| storage.get::<GamificationState>(black_box(keys::GAMIFICATION)))
    });

    group.bench_function("gamification_uncached", |b| {
        b.iter(|| {
            storage.clear_cache();
            storage.get::<GamificationState>(black_box(keys::GAMIFICATION))
        })
    });

    group.bench_function("preferences_cached", |b| {
        b.iter(|| black_box(storage.get_preferences()))
    });

    group.finish();
}

fn benchmark_cache_document(c: &mut Criterion) {
    let storage = seeded_storage();
    for i in 0..100 {
        storage.set_cache(&format!("entry_{i}"), &vec![i; 16]);
    }

    c.bench_function("fresh_cache_lookup", |b| {
        b.iter(|| storage.get_fresh_cache::<Vec<u32>>(black_box("entry_50")))
    });
}

criterion_group!(benches, benchmark_reads, benchmark_cache_document);
criterion_main!(benches);
