use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regionrisk::dataset::FEATURE_COUNT;
use regionrisk::ml::forest::{ForestOptions, train_random_forest};
use regionrisk::ml::tree::{ClassWeight, TreeOptions, train_decision_tree};

const ROW_COUNT: usize = 2_000;

fn training_set() -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(7);
    let mut x = Vec::with_capacity(ROW_COUNT);
    let mut y = Vec::with_capacity(ROW_COUNT);
    for _ in 0..ROW_COUNT {
        let row: Vec<f64> = (0..FEATURE_COUNT).map(|_| rng.random_range(0.0..10.0)).collect();
        let label = usize::from(row[1] + row[4] * 0.5 > 7.0);
        x.push(row);
        y.push(label);
    }
    (x, y)
}

fn bench_decision_tree(c: &mut Criterion) {
    let (x, y) = training_set();
    let mut group = c.benchmark_group("decision_tree");
    for depth in [Some(5), None] {
        let options = TreeOptions {
            max_depth: depth,
            class_weight: ClassWeight::Balanced,
            ..TreeOptions::default()
        };
        let label = depth.map_or_else(|| "unlimited".to_string(), |d| d.to_string());
        group.bench_with_input(BenchmarkId::new("depth", label), &options, |b, options| {
            b.iter(|| train_decision_tree(black_box(&x), black_box(&y), options).expect("train tree"));
        });
    }
    group.finish();
}

fn bench_random_forest(c: &mut Criterion) {
    let (x, y) = training_set();
    let options = ForestOptions {
        n_trees: 20,
        ..ForestOptions::default()
    };
    c.bench_with_input(
        BenchmarkId::new("random_forest", options.n_trees),
        &options,
        |b, options| {
            b.iter(|| train_random_forest(black_box(&x), black_box(&y), options).expect("train forest"));
        },
    );
}

criterion_group!(benches, bench_decision_tree, bench_random_forest);
criterion_main!(benches);
