//! Prediction structure benchmarks
//!
//! Covers the hot paths of a prediction step: joining contexts, adding
//! configurations to a set and publishing DFA states.

use allstar::atn::{Atn, AtnBuilder, AtnType, StateKind, Transition};
use allstar::config::{AtnConfig, AtnConfigSet};
use allstar::context::{PredictionContext, PredictionContextCache, SharedContextCache};
use allstar::dfa::DfaState;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;

/// A context graph `width` pairs wide and `depth` frames deep
fn wide_context(width: i32, depth: i32, offset: i32) -> Arc<PredictionContext> {
    let mut cache = PredictionContextCache::uncached();
    let mut joined = PredictionContext::empty_full().clone();
    for slot in 0..width {
        let mut path = PredictionContext::empty_full().clone();
        for frame in 0..depth {
            path = path.child(frame * 10 + slot % 3);
        }
        let path = path.child(slot * 2 + offset);
        joined = if joined.is_empty() {
            path
        } else {
            PredictionContext::join(&joined, &path, &mut cache)
        };
    }
    joined
}

fn decision_atn(alternatives: i32) -> Atn {
    let mut builder = AtnBuilder::new(AtnType::Parser, alternatives);
    let (start, stop) = builder.add_rule();
    let block = builder.add_state(0, StateKind::Basic);
    builder.add_transition(start, Transition::epsilon(block));
    for token in 1..=alternatives {
        let alt = builder.add_state(0, StateKind::Basic);
        builder
            .add_transition(block, Transition::epsilon(alt))
            .add_transition(alt, Transition::atom(stop, token));
    }
    builder.add_decision(block);
    match builder.build() {
        Ok(atn) => atn,
        Err(err) => panic!("benchmark grammar is invalid: {err}"),
    }
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("context_join");
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(2));

    for (name, width, depth) in [("narrow", 2, 4), ("wide", 32, 4), ("deep", 4, 32)] {
        let left = wide_context(width, depth, 0);
        let right = wide_context(width, depth, 1);

        group.bench_with_input(
            BenchmarkId::new("uncached", name),
            &(&left, &right),
            |b, (left, right)| {
                b.iter(|| {
                    let mut cache = PredictionContextCache::uncached();
                    black_box(PredictionContext::join(left, right, &mut cache))
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("memoized", name),
            &(&left, &right),
            |b, (left, right)| {
                let mut cache = PredictionContextCache::new();
                b.iter(|| black_box(cache.join(left, right)));
            },
        );
    }

    group.finish();
}

fn bench_config_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_set_add");
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(2));

    for count in [16usize, 256, 2048] {
        let contexts: Vec<_> = (0..8).map(|i| wide_context(2, 3, i)).collect();
        group.bench_with_input(BenchmarkId::new("unordered", count), &count, |b, &count| {
            b.iter(|| {
                let mut cache = PredictionContextCache::new();
                let mut configs = AtnConfigSet::new();
                for i in 0..count {
                    let config = AtnConfig::new(i % 64, (i % 3) as u32 + 1, contexts[i % 8].clone());
                    let _ = configs.add(config, &mut cache);
                }
                black_box(configs.len())
            });
        });
    }

    group.finish();
}

fn bench_dfa(c: &mut Criterion) {
    let mut group = c.benchmark_group("dfa_add_state");
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(2));

    let atn = decision_atn(8);
    let context = PredictionContext::empty_local().clone();
    group.bench_function("publish_and_lookup", |b| {
        b.iter(|| {
            let dfa = atn.dfa(0);
            dfa.clear();
            let mut cache = PredictionContextCache::new();
            for state in 0..32 {
                let mut configs = AtnConfigSet::new();
                let _ = configs.add(AtnConfig::new(state, 1, context.clone()), &mut cache);
                // the second publication finds the first
                black_box(dfa.add_state(DfaState::new(dfa, configs.clone_set(false))));
                black_box(dfa.add_state(DfaState::new(dfa, configs)));
            }
        });
    });

    let shared = SharedContextCache::new();
    let contexts: Vec<_> = (0..64).map(|i| wide_context(4, 6, i % 5)).collect();
    group.bench_function("shared_context_cache", |b| {
        b.iter(|| {
            for context in &contexts {
                black_box(shared.cached_context(context));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_join, bench_config_set, bench_dfa);
criterion_main!(benches);
