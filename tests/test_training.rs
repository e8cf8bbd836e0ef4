//! Integration test: training pipeline end-to-end

use boostrun::data::{DataInput, SplitKind, SplitOptions};
use boostrun::error::BoostError;
use boostrun::inference::ModelEvaluator;
use boostrun::training::{
    rebalance_class_weights, Booster, Objective, ParamValue, ParameterStore, TrainOptions, Trainer,
};
use ndarray::Array2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// Class `c` is centred on `(2c, -c)`, with unequal sizes and weights per class
fn gaussian_batches(input: &mut DataInput, class_ids: &[i32], options: &SplitOptions) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for (k, &class_id) in class_ids.iter().enumerate() {
        let n = 80 + 40 * k;
        let features = Array2::from_shape_fn((n, 2), |(_, j)| {
            let centre = if j == 0 { 2.0 * k as f64 } else { -(k as f64) };
            centre + rng.gen::<f64>() - 0.5
        });
        let weight = 0.5 + k as f64;
        input.add_data(features, weight, class_id, options).unwrap();
    }
}

fn store(num_round: i64) -> ParameterStore {
    let mut store = ParameterStore::new();
    store.set("num_round", num_round).unwrap();
    store
}

#[test]
fn test_three_class_training_with_control() {
    let mut input = DataInput::new(["x", "y"], None).unwrap();
    let options = SplitOptions::new(0.5).with_control_fraction(0.2);
    gaussian_batches(&mut input, &[10, 20, 30], &options);

    let mut trainer = Trainer::new();
    let train_options = TrainOptions::new().with_save_predictions(true);
    let booster = trainer.train(&input, &store(20), &train_options).unwrap();

    assert_eq!(booster.config().objective, Objective::MultiSoftprob);
    assert_eq!(booster.n_rounds(), 20);
    assert_eq!(booster.n_trees(), 60);

    let predictions = trainer.predictions().unwrap();
    let control = input.data_control().unwrap();
    let control_preds = predictions.get(SplitKind::Control).unwrap();
    assert_eq!(control_preds.dim(), (control.n_rows(), 3));

    // Well separated classes: the true class gets the highest probability
    let correct = control_preds
        .rows()
        .into_iter()
        .zip(control.classes.iter())
        .filter(|(row, &class_id)| {
            let best = row
                .iter()
                .enumerate()
                .fold((0, f64::MIN), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc });
            trainer.class_types()[best.0] == class_id
        })
        .count();
    assert_eq!(correct, control.n_rows());
}

#[test]
fn test_rebalanced_weights_are_equal_per_class() {
    let mut input = DataInput::new(["x", "y"], None).unwrap();
    let options = SplitOptions::new(0.5).with_control_fraction(0.25);
    gaussian_batches(&mut input, &[0, 1, 2, 3], &options);

    for kind in [SplitKind::Train, SplitKind::Test, SplitKind::Control] {
        let split = input.split(kind).unwrap();
        let mut weights = split.weights.clone();
        rebalance_class_weights(&split.classes, &mut weights, 4);

        let expected = split.n_rows() as f64 / 4.0;
        for class_id in 0..4 {
            let sum: f64 = split
                .classes
                .iter()
                .zip(weights.iter())
                .filter(|(&c, _)| c == class_id)
                .map(|(_, &w)| w)
                .sum();
            assert!((sum - expected).abs() < 1e-9, "{} class {}: {}", kind, class_id, sum);
        }
    }
}

#[test]
fn test_trainer_rebalances_every_split() {
    let mut input = DataInput::new(["x", "y"], None).unwrap();
    let options = SplitOptions::new(0.5).with_control_fraction(0.25);
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    for (class_id, weight) in [(0i32, -1.0), (1i32, 3.0), (2i32, 0.25)] {
        let n = 60 + 20 * class_id as usize;
        let features = Array2::from_shape_fn((n, 2), |(_, j)| {
            class_id as f64 * (1.0 + j as f64) + rng.gen::<f64>()
        });
        input.add_data(features, weight, class_id, &options).unwrap();
    }

    let mut trainer = Trainer::new();
    trainer.train(&input, &store(3), &TrainOptions::default()).unwrap();

    for kind in [SplitKind::Train, SplitKind::Test, SplitKind::Control] {
        let split = input.split(kind).unwrap();
        let weights = trainer.weights(kind).unwrap();
        assert_eq!(weights.len(), split.n_rows());
        assert!(weights.iter().all(|&w| w > 0.0));

        let expected = split.n_rows() as f64 / 3.0;
        for class_id in 0..3 {
            let sum: f64 = split
                .classes
                .iter()
                .zip(weights.iter())
                .filter(|(&c, _)| c == class_id)
                .map(|(_, &w)| w)
                .sum();
            assert!((sum - expected).abs() < 1e-9, "{} class {}: {}", kind, class_id, sum);
        }
    }
}

#[test]
fn test_unscaled_weights_are_absolute() {
    let mut input = DataInput::new(["x", "y"], None).unwrap();
    let options = SplitOptions::new(0.5).with_control_fraction(0.25);
    for (class_id, weight) in [(0i32, -2.0), (1i32, 0.5)] {
        let features = Array2::from_shape_fn((40, 2), |(i, j)| (i % 7) as f64 + class_id as f64 * 4.0 + j as f64);
        input.add_data(features, weight, class_id, &options).unwrap();
    }

    let mut trainer = Trainer::new();
    let train_options = TrainOptions::new().with_scale_weights(false);
    trainer.train(&input, &store(2), &train_options).unwrap();

    let control = input.data_control().unwrap();
    let weights = trainer.weights(SplitKind::Control).unwrap();
    for (&class_id, &w) in control.classes.iter().zip(weights.iter()) {
        assert_eq!(w, if class_id == 0 { 2.0 } else { 0.5 });
    }
}

#[test]
fn test_binary_resolution_overrides_multiclass_settings() {
    let mut input = DataInput::new(["x", "y"], None).unwrap();
    gaussian_batches(&mut input, &[0, 1], &SplitOptions::new(0.5));

    let mut params = store(5);
    params.set("objective", "multi:softprob").unwrap();
    params.set("eval_metric", "mlogloss").unwrap();
    params.define("num_class", 3i64).unwrap();

    let mut trainer = Trainer::new();
    let booster = trainer.train(&input, &params, &TrainOptions::default()).unwrap();
    assert_eq!(booster.config().objective, Objective::BinaryLogistic);
    assert_eq!(booster.n_groups(), 1);

    let resolved = trainer.resolved_parameters().unwrap();
    assert_eq!(resolved["objective"], ParamValue::from("binary:logistic"));
    assert_eq!(resolved["eval_metric"], ParamValue::from("logloss"));
    assert!(!resolved.contains_key("num_class"));

    // The caller's store keeps its own settings
    assert_eq!(params.get("objective"), Some(&ParamValue::from("multi:softprob")));
}

#[test]
fn test_early_stopping_keeps_best_round() {
    let mut input = DataInput::new(["x", "y"], None).unwrap();
    gaussian_batches(&mut input, &[0, 1, 2], &SplitOptions::new(0.5));

    let mut trainer = Trainer::new();
    let options = TrainOptions::new().with_early_stopping_rounds(5);
    let booster = trainer.train(&input, &store(200), &options).unwrap();

    let best = booster.best_iteration().unwrap();
    assert_eq!(booster.n_rounds(), best + 1);
    assert!(booster.n_rounds() <= 200);

    let eval = &booster.evals_result()[1];
    assert_eq!(eval.name, "eval");
    assert!(eval.values.len() >= booster.n_rounds());
}

#[test]
fn test_save_model_formats() {
    let mut input = DataInput::new(["x", "y"], None).unwrap();
    gaussian_batches(&mut input, &[0, 1], &SplitOptions::new(0.5).with_control_fraction(0.3));

    let mut trainer = Trainer::new();
    trainer
        .train(&input, &store(8), &TrainOptions::new().with_save_predictions(true))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let dump_path = dir.path().join("model.json");
    let native_path = dir.path().join("model.bin");
    trainer.save_model(&dump_path).unwrap();
    trainer.save_model(&native_path).unwrap();

    let dump: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&dump_path).unwrap()).unwrap();
    assert_eq!(dump.as_array().unwrap().len(), 8);

    let loaded = Booster::load_model(&native_path).unwrap();
    let control = input.data_control().unwrap();
    let saved = trainer.predictions().unwrap().control.as_ref().unwrap();
    assert_eq!(&loaded.predict(&control.features).unwrap(), saved);

    let evaluator = ModelEvaluator::build(&native_path, ["x", "y"], -999.0).unwrap();
    let row = control.features.row(0);
    let vars = HashMap::from([("x".to_string(), row[0]), ("y".to_string(), row[1])]);
    let score = evaluator.eval_single(&vars).unwrap();
    assert!((score - saved[[0, 0]]).abs() < 1e-12);
}

#[test]
fn test_save_model_before_training() {
    let dir = tempfile::tempdir().unwrap();
    let err = Trainer::new().save_model(dir.path().join("model.bin")).unwrap_err();
    assert!(matches!(err, BoostError::ModelNotFitted));
}

#[test]
fn test_unscaled_weights_still_train() {
    let mut input = DataInput::new(["x", "y"], None).unwrap();
    gaussian_batches(&mut input, &[0, 1], &SplitOptions::new(0.5));

    let mut trainer = Trainer::new();
    let options = TrainOptions::new().with_scale_weights(false);
    let booster = trainer.train(&input, &store(3), &options).unwrap();
    assert_eq!(booster.n_rounds(), 3);
    assert!(trainer.predictions().is_none());
}
