use boostrun::data::{DataInput, SplitOptions};
use boostrun::training::{ParameterStore, TrainOptions, Trainer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_batch(n_rows: usize, n_features: usize, class_id: i32) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(class_id as u64);
    Array2::from_shape_fn((n_rows, n_features), |(_, j)| {
        rng.gen::<f64>() * 10.0 + class_id as f64 * (j % 3) as f64
    })
}

fn create_input(n_rows: usize, n_features: usize) -> DataInput {
    let names: Vec<String> = (0..n_features).map(|i| format!("feature_{}", i)).collect();
    let mut input = DataInput::new(names, None).unwrap();
    let options = SplitOptions::new(0.5).with_control_fraction(0.2);
    for class_id in 0..3 {
        input
            .add_data(create_batch(n_rows, n_features, class_id), 1.0, class_id, &options)
            .unwrap();
    }
    input
}

fn bench_add_data(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_data");

    for n_rows in [1000, 10000, 100000].iter() {
        let batch = create_batch(*n_rows, 10, 1);
        let options = SplitOptions::new(0.5).with_control_fraction(0.2).with_shuffle(true);

        group.bench_with_input(BenchmarkId::new("split", n_rows), &batch, |b, batch| {
            b.iter(|| {
                let mut input = DataInput::new((0..10).map(|i| format!("feature_{}", i)), None).unwrap();
                input
                    .add_data(black_box(batch.clone()), 1.0, 1, &options)
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    let mut params = ParameterStore::new();
    params.set("num_round", 20i64).unwrap();

    for n_rows in [1000, 5000].iter() {
        let input = create_input(*n_rows, 10);

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &input, |b, input| {
            b.iter(|| {
                let mut trainer = Trainer::new();
                trainer
                    .train(black_box(input), &params, &TrainOptions::default())
                    .map(|booster| booster.n_trees())
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_add_data, bench_training);
criterion_main!(benches);
