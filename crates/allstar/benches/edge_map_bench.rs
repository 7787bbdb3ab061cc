//! Edge map benchmarks
//!
//! Measures insertion and lookup for each density tier, over key spaces
//! sized like a lexer's character range and a large parser vocabulary.

use allstar::dfa::EdgeMap;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;

const KEY_SPACES: [(&str, i32); 3] = [("lexer", 127), ("parser", 400), ("wide", 4000)];

fn filled(map: Arc<EdgeMap<u32>>, keys: i32, stride: i32) -> Arc<EdgeMap<u32>> {
    let mut map = map;
    for key in (0..keys).step_by(stride as usize) {
        map = map.put(key, Arc::new(key as u32));
    }
    map
}

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_map_put");
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(2));

    for (name, max) in KEY_SPACES {
        group.bench_with_input(BenchmarkId::new("tiered", name), &max, |b, &max| {
            b.iter(|| black_box(filled(EdgeMap::new(0, max), max, 7)));
        });
        group.bench_with_input(BenchmarkId::new("array", name), &max, |b, &max| {
            b.iter(|| black_box(filled(EdgeMap::new_array(0, max), max, 7)));
        });
    }

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_map_get");
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(2));

    for (name, max) in KEY_SPACES {
        // sparse enough to stay below the array threshold
        let sparse = filled(EdgeMap::new(0, max), max, max / 8);
        let array = filled(EdgeMap::new_array(0, max), max, 3);

        group.bench_with_input(BenchmarkId::new("sparse", name), &max, |b, &max| {
            b.iter(|| {
                let mut hits = 0;
                for key in 0..=max {
                    hits += usize::from(sparse.get(black_box(key)).is_some());
                }
                hits
            });
        });
        group.bench_with_input(BenchmarkId::new("array", name), &max, |b, &max| {
            b.iter(|| {
                let mut hits = 0;
                for key in 0..=max {
                    hits += usize::from(array.get(black_box(key)).is_some());
                }
                hits
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_put, bench_get);
criterion_main!(benches);
