use std::collections::HashMap;

use bucketed::{ListStrategy, LockCoupled, LockFree};
use criterion::measurement::WallTime;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkGroup, Criterion};

const SIZE: usize = 10_000;

// A large prime, so that buckets stay short.
const CAPACITY: usize = 20_011;

#[derive(Clone, Copy)]
struct RandomKeys {
    state: usize,
}

impl RandomKeys {
    fn new() -> Self {
        RandomKeys { state: 0 }
    }
}

impl Iterator for RandomKeys {
    type Item = usize;
    fn next(&mut self) -> Option<usize> {
        // Add 1 then multiply by some 32 bit prime.
        self.state = self.state.wrapping_add(1).wrapping_mul(3_787_392_781);
        Some(self.state)
    }
}

fn map<L: ListStrategy>(capacity: usize) -> bucketed::HashMap<usize, usize, L> {
    bucketed::HashMap::builder()
        .capacity(capacity)
        .strategy::<L>()
        .build()
        .unwrap()
}

fn read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    fn bench<L: ListStrategy>(
        group: &mut BenchmarkGroup<'_, WallTime>,
        name: &str,
        capacity: usize,
    ) {
        group.bench_function(name, |b| {
            let m = map::<L>(capacity);
            for i in RandomKeys::new().take(SIZE) {
                m.insert(i, i);
            }

            b.iter(|| {
                for i in RandomKeys::new().take(SIZE) {
                    black_box(assert_eq!(m.get(&i), Some(i)));
                }
            });
        });
    }

    bench::<LockCoupled>(&mut group, "lock-coupled", CAPACITY);
    bench::<LockFree>(&mut group, "lock-free", CAPACITY);

    // Long buckets: about a hundred entries each.
    bench::<LockCoupled>(&mut group, "lock-coupled/crowded", SIZE / 100);
    bench::<LockFree>(&mut group, "lock-free/crowded", SIZE / 100);

    group.bench_function("std", |b| {
        let mut m = HashMap::<usize, usize>::default();
        for i in RandomKeys::new().take(SIZE) {
            m.insert(i, i);
        }

        b.iter(|| {
            for i in RandomKeys::new().take(SIZE) {
                black_box(assert_eq!(m.get(&i), Some(&i)));
            }
        });
    });

    group.finish();
}

fn insert_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_remove");

    group.bench_function("lock-coupled", |b| {
        let m = map::<LockCoupled>(CAPACITY);
        b.iter(|| {
            for i in RandomKeys::new().take(SIZE) {
                black_box(m.insert(i, i));
            }
            for i in RandomKeys::new().take(SIZE) {
                black_box(m.remove(&i));
            }
        });
    });

    group.bench_function("lock-free", |b| {
        let m = map::<LockFree>(CAPACITY);
        b.iter(|| {
            for i in RandomKeys::new().take(SIZE) {
                black_box(m.insert(i, i));
            }
            for i in RandomKeys::new().take(SIZE) {
                black_box(m.remove(&i));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, read, insert_remove);
criterion_main!(benches);
