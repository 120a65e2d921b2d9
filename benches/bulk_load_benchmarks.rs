use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use leafline::BPlusTree;
use std::collections::BTreeMap;

const N: usize = 100_000;
const ORDER: usize = 64;

// ─── Helper functions to generate key sequences ─────────────────────────────

fn ordered_entries(n: usize) -> Vec<(i64, i64)> {
    (0..n as i64).map(|k| (k, k)).collect()
}

fn random_entries(n: usize) -> Vec<(i64, i64)> {
    // Use a simple LCG for deterministic pseudo-random sequence
    let mut entries = Vec::with_capacity(n);
    let mut x: u64 = 12345;
    for i in 0..n {
        x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
        entries.push(((x >> 33) as i64, i as i64));
    }
    entries
}

// ─── Construction ───────────────────────────────────────────────────────────

fn bench_build(c: &mut Criterion, name: &str, entries: &[(i64, i64)]) {
    let mut group = c.benchmark_group(name);

    group.bench_function(BenchmarkId::new("bulk_load", N), |b| {
        b.iter(|| {
            let mut tree = BPlusTree::new(ORDER);
            tree.bulk_load(entries.iter().copied()).unwrap();
            tree
        });
    });

    group.bench_function(BenchmarkId::new("insert", N), |b| {
        b.iter(|| {
            let mut tree = BPlusTree::new(ORDER);
            for &(k, v) in entries {
                tree.insert(k, v).unwrap();
            }
            tree
        });
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| entries.iter().copied().collect::<BTreeMap<_, _>>());
    });

    group.finish();
}

fn bench_build_ordered(c: &mut Criterion) {
    bench_build(c, "build_ordered", &ordered_entries(N));
}

fn bench_build_random(c: &mut Criterion) {
    bench_build(c, "build_random", &random_entries(N));
}

// ─── Queries on a loaded tree ───────────────────────────────────────────────

fn bench_search(c: &mut Criterion) {
    let entries = random_entries(N);
    let mut tree = BPlusTree::new(ORDER);
    tree.bulk_load(entries.iter().copied()).unwrap();
    let map: BTreeMap<i64, i64> = entries.iter().copied().collect();

    let mut group = c.benchmark_group("search_random");

    group.bench_function(BenchmarkId::new("BPlusTree", N), |b| {
        b.iter(|| entries.iter().filter(|(k, _)| tree.search(k).is_some()).count());
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| entries.iter().filter(|(k, _)| map.get(k).is_some()).count());
    });

    group.finish();
}

fn bench_range(c: &mut Criterion) {
    let mut tree = BPlusTree::new(ORDER);
    tree.bulk_load(ordered_entries(N)).unwrap();
    let map: BTreeMap<i64, i64> = ordered_entries(N).into_iter().collect();
    let (start, end) = (N as i64 / 4, N as i64 / 4 * 3);

    let mut group = c.benchmark_group("range_half");

    group.bench_function(BenchmarkId::new("BPlusTree", N), |b| {
        b.iter(|| tree.range(&start, &end).count());
    });

    group.bench_function(BenchmarkId::new("BTreeMap", N), |b| {
        b.iter(|| map.range(start..=end).count());
    });

    group.finish();
}

criterion_group!(construction, bench_build_ordered, bench_build_random);
criterion_group!(queries, bench_search, bench_range);
criterion_main!(construction, queries);
