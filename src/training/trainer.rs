//! Trainer: turns the aggregated splits and hyperparameters into a booster

use super::booster::{Booster, BoosterConfig, DMatrix};
use super::objective::{EvalMetric, Objective};
use super::params::{round_count, ParamValue, ParameterStore};
use crate::data::split::distinct_sorted;
use crate::data::{DataInput, DataSplit, SplitKind};
use crate::error::{BoostError, Result};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Options for a training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    /// Stop once the test split has not improved for this many rounds
    pub early_stopping_rounds: Option<usize>,
    /// Equalize the per-class weight sums within every split
    pub scale_weights: bool,
    /// Keep predictions for every split after training
    pub save_predictions: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            early_stopping_rounds: None,
            scale_weights: true,
            save_predictions: false,
        }
    }
}

impl TrainOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_early_stopping_rounds(mut self, rounds: usize) -> Self {
        self.early_stopping_rounds = Some(rounds);
        self
    }

    pub fn with_scale_weights(mut self, scale: bool) -> Self {
        self.scale_weights = scale;
        self
    }

    pub fn with_save_predictions(mut self, save: bool) -> Self {
        self.save_predictions = save;
        self
    }
}

/// Predicted scores of each split, one row per entry
#[derive(Debug, Clone)]
pub struct SplitPredictions {
    pub train: Array2<f64>,
    pub test: Array2<f64>,
    pub control: Option<Array2<f64>>,
}

impl SplitPredictions {
    pub fn get(&self, kind: SplitKind) -> Option<&Array2<f64>> {
        match kind {
            SplitKind::Train => Some(&self.train),
            SplitKind::Test => Some(&self.test),
            SplitKind::Control => self.control.as_ref(),
        }
    }
}

/// Weights of each split as used by the last training run
#[derive(Debug, Clone)]
pub struct SplitWeights {
    pub train: Array1<f64>,
    pub test: Array1<f64>,
    pub control: Option<Array1<f64>>,
}

impl SplitWeights {
    pub fn get(&self, kind: SplitKind) -> Option<&Array1<f64>> {
        match kind {
            SplitKind::Train => Some(&self.train),
            SplitKind::Test => Some(&self.test),
            SplitKind::Control => self.control.as_ref(),
        }
    }
}

/// Trains boosters on the contents of a [`DataInput`]
#[derive(Debug, Default)]
pub struct Trainer {
    booster: Option<Booster>,
    predictions: Option<SplitPredictions>,
    weights: Option<SplitWeights>,
    resolved_parameters: Option<BTreeMap<String, ParamValue>>,
    class_types: Vec<i32>,
}

impl Trainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit a booster on the train split, tracking the train and test splits.
    ///
    /// The objective and metric are adapted to the number of classes in the
    /// training split; the caller's store is left untouched.
    pub fn train(
        &mut self,
        input: &DataInput,
        params: &ParameterStore,
        options: &TrainOptions,
    ) -> Result<&Booster> {
        let (train, test) = match (input.data_train(), input.data_test()) {
            (Some(train), Some(test)) => (train, test),
            _ => {
                return Err(BoostError::UsageError(
                    "no data has been added to the input".to_string(),
                ))
            }
        };

        let class_types = train.class_types();
        if class_types.len() < 2 {
            return Err(BoostError::ValidationError(format!(
                "training needs at least two classes, found {:?}",
                class_types
            )));
        }
        let n_classes = class_types.len();

        let resolved = resolve_objective(params.parameters(), n_classes)?;
        let num_round = round_count(&resolved)?;
        let config = BoosterConfig::from_parameters(&resolved)?;
        info!(
            classes = ?class_types,
            objective = %config.objective,
            eval_metric = %config.eval_metric,
            num_round,
            "Training"
        );

        let prepare = |split: &DataSplit, kind: SplitKind| {
            prepare_matrix(split, kind, &class_types, input.features(), options.scale_weights)
        };
        let dtrain = prepare(train, SplitKind::Train)?;
        let dtest = prepare(test, SplitKind::Test)?;
        let dcontrol = input
            .data_control()
            .map(|split| prepare(split, SplitKind::Control))
            .transpose()?;

        let booster = Booster::train(
            config,
            &dtrain,
            &[(&dtrain, "train"), (&dtest, "eval")],
            num_round,
            options.early_stopping_rounds,
        )?;

        info!(
            rounds = booster.n_rounds(),
            best_iteration = ?booster.best_iteration(),
            best_score = ?booster.best_score(),
            "Training finished"
        );

        self.predictions = if options.save_predictions {
            let control = dcontrol
                .as_ref()
                .map(|m| booster.predict(m.data()))
                .transpose()?;
            Some(SplitPredictions {
                train: booster.predict(dtrain.data())?,
                test: booster.predict(dtest.data())?,
                control,
            })
        } else {
            None
        };
        self.weights = Some(SplitWeights {
            train: Array1::from(dtrain.weights().to_vec()),
            test: Array1::from(dtest.weights().to_vec()),
            control: dcontrol.map(|m| Array1::from(m.weights().to_vec())),
        });
        self.resolved_parameters = Some(resolved);
        self.class_types = class_types;

        Ok(self.booster.insert(booster))
    }

    /// Write the trained model; a `.json` path gets the tree dump
    pub fn save_model(&self, path: impl AsRef<Path>) -> Result<()> {
        self.booster
            .as_ref()
            .ok_or(BoostError::ModelNotFitted)?
            .save_model(path)
    }

    pub fn booster(&self) -> Option<&Booster> {
        self.booster.as_ref()
    }

    pub fn predictions(&self) -> Option<&SplitPredictions> {
        self.predictions.as_ref()
    }

    /// Absolute, optionally rebalanced weights of a split in the last run
    pub fn weights(&self, kind: SplitKind) -> Option<&Array1<f64>> {
        self.weights.as_ref().and_then(|w| w.get(kind))
    }

    /// Parameters as handed to the booster in the last run
    pub fn resolved_parameters(&self) -> Option<&BTreeMap<String, ParamValue>> {
        self.resolved_parameters.as_ref()
    }

    /// Class ids of the last run; label `i` is `class_types()[i]`
    pub fn class_types(&self) -> &[i32] {
        &self.class_types
    }
}

/// Adapt objective, metric and `num_class` to the number of classes
pub fn resolve_objective(
    mut params: BTreeMap<String, ParamValue>,
    n_classes: usize,
) -> Result<BTreeMap<String, ParamValue>> {
    let objective = match params.get("objective").and_then(ParamValue::as_str) {
        Some(name) => name.parse::<Objective>()?,
        None => Objective::BinaryLogistic,
    };
    let metric = params
        .get("eval_metric")
        .and_then(ParamValue::as_str)
        .map(str::parse::<EvalMetric>)
        .transpose()?;

    if n_classes > 2 {
        params.insert("num_class".to_string(), ParamValue::Int(n_classes as i64));
        if !objective.is_multiclass() {
            params.insert("objective".to_string(), Objective::MultiSoftprob.as_str().into());
        }
        if metric.map_or(false, |m| m.is_binary_only()) {
            params.insert("eval_metric".to_string(), EvalMetric::MLogLoss.as_str().into());
        }
    } else {
        params.remove("num_class");
        if objective.is_multiclass() {
            params.insert("objective".to_string(), Objective::BinaryLogistic.as_str().into());
        }
        if metric.map_or(false, |m| m.is_multiclass_only()) {
            params.insert("eval_metric".to_string(), EvalMetric::LogLoss.as_str().into());
        }
    }
    Ok(params)
}

/// Scale weights so that every class present sums to `n_rows / n_classes`
pub fn rebalance_class_weights(classes: &Array1<i32>, weights: &mut Array1<f64>, n_classes: usize) {
    let target = classes.len() as f64 / n_classes as f64;
    for class_id in distinct_sorted(classes.iter().copied()) {
        let sum: f64 = classes
            .iter()
            .zip(weights.iter())
            .filter(|(&c, _)| c == class_id)
            .map(|(_, &w)| w)
            .sum();
        if sum <= 0.0 {
            warn!(class_id, "class has zero total weight, leaving it unscaled");
            continue;
        }
        let factor = target / sum;
        for (w, _) in weights
            .iter_mut()
            .zip(classes.iter())
            .filter(|(_, &c)| c == class_id)
        {
            *w *= factor;
        }
    }
}

fn prepare_matrix(
    split: &DataSplit,
    kind: SplitKind,
    class_types: &[i32],
    feature_names: &[String],
    scale_weights: bool,
) -> Result<DMatrix> {
    let mut weights = split.weights.mapv(f64::abs);
    if scale_weights {
        rebalance_class_weights(&split.classes, &mut weights, class_types.len());
    }

    let labels = split
        .classes
        .iter()
        .map(|c| {
            class_types
                .binary_search(c)
                .map(|label| label as f64)
                .map_err(|_| {
                    BoostError::ValidationError(format!(
                        "class {} of the {} split does not occur in the train split",
                        c, kind
                    ))
                })
        })
        .collect::<Result<Vec<f64>>>()?;

    DMatrix::new(split.features.clone(), labels, weights.to_vec())?
        .with_feature_names(feature_names.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SplitOptions;
    use crate::training::params::NUM_ROUND;
    use ndarray::array;

    fn three_class_input() -> DataInput {
        let mut input = DataInput::new(["x", "y"], None).unwrap();
        for class_id in [4i32, 7, 9] {
            let features = Array2::from_shape_fn((40, 2), |(i, j)| {
                class_id as f64 * 10.0 + (i % 8) as f64 + j as f64
            });
            input
                .add_data(features, 1.0 + class_id as f64, class_id, &SplitOptions::new(0.5))
                .unwrap();
        }
        input
    }

    fn small_store() -> ParameterStore {
        let mut store = ParameterStore::new();
        store.set(NUM_ROUND, 10i64).unwrap();
        store
    }

    #[test]
    fn test_resolve_multiclass() {
        let store = ParameterStore::new();
        let resolved = resolve_objective(store.parameters(), 4).unwrap();
        assert_eq!(resolved["objective"], ParamValue::from("multi:softprob"));
        assert_eq!(resolved["eval_metric"], ParamValue::from("mlogloss"));
        assert_eq!(resolved["num_class"], ParamValue::Int(4));
    }

    #[test]
    fn test_resolve_multiclass_keeps_softmax() {
        let mut params = ParameterStore::new().parameters();
        params.insert("objective".to_string(), "multi:softmax".into());
        params.insert("eval_metric".to_string(), "merror".into());
        let resolved = resolve_objective(params, 3).unwrap();
        assert_eq!(resolved["objective"], ParamValue::from("multi:softmax"));
        assert_eq!(resolved["eval_metric"], ParamValue::from("merror"));
    }

    #[test]
    fn test_resolve_binary_after_multiclass() {
        let mut params = ParameterStore::new().parameters();
        params.insert("objective".to_string(), "multi:softprob".into());
        params.insert("eval_metric".to_string(), "mlogloss".into());
        params.insert("num_class".to_string(), ParamValue::Int(3));

        let resolved = resolve_objective(params, 2).unwrap();
        assert_eq!(resolved["objective"], ParamValue::from("binary:logistic"));
        assert_eq!(resolved["eval_metric"], ParamValue::from("logloss"));
        assert!(!resolved.contains_key("num_class"));
    }

    #[test]
    fn test_resolve_binary_keeps_auc() {
        let store = ParameterStore::new();
        let resolved = resolve_objective(store.parameters(), 2).unwrap();
        assert_eq!(resolved["objective"], ParamValue::from("binary:logistic"));
        assert_eq!(resolved["eval_metric"], ParamValue::from("auc"));
        assert!(!resolved.contains_key("num_class"));
    }

    #[test]
    fn test_rebalance() {
        let classes = array![0, 0, 0, 1, 2, 2];
        let mut weights = array![1.0, 2.0, 3.0, 0.5, 1.0, 1.0];
        rebalance_class_weights(&classes, &mut weights, 3);

        for class_id in 0..3 {
            let sum: f64 = classes
                .iter()
                .zip(weights.iter())
                .filter(|(&c, _)| c == class_id)
                .map(|(_, &w)| w)
                .sum();
            assert!((sum - 2.0).abs() < 1e-12);
        }
        assert!((weights[1] / weights[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rebalance_skips_absent_class() {
        let classes = array![0, 0, 1, 1];
        let mut weights = array![1.0, 1.0, 3.0, 1.0];
        rebalance_class_weights(&classes, &mut weights, 4);
        assert!((weights.sum() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_train_without_data() {
        let input = DataInput::new(["x"], None).unwrap();
        let mut trainer = Trainer::new();
        let err = trainer
            .train(&input, &ParameterStore::new(), &TrainOptions::default())
            .unwrap_err();
        assert!(err.is_usage());
    }

    #[test]
    fn test_train_single_class() {
        let mut input = DataInput::new(["x"], None).unwrap();
        input
            .add_data(Array2::zeros((10, 1)), 1.0, 3i32, &SplitOptions::new(0.5))
            .unwrap();
        let err = Trainer::new()
            .train(&input, &small_store(), &TrainOptions::default())
            .unwrap_err();
        assert!(matches!(err, BoostError::ValidationError(_)));
    }

    #[test]
    fn test_save_before_train() {
        let file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        let err = Trainer::new().save_model(file.path()).unwrap_err();
        assert!(matches!(err, BoostError::ModelNotFitted));
    }

    #[test]
    fn test_three_class_training() {
        let input = three_class_input();
        let mut trainer = Trainer::new();
        let options = TrainOptions::new().with_save_predictions(true);
        let booster = trainer.train(&input, &small_store(), &options).unwrap();

        assert_eq!(booster.n_groups(), 3);
        assert_eq!(booster.feature_names(), &["x".to_string(), "y".to_string()]);
        assert_eq!(trainer.class_types(), &[4, 7, 9]);

        let predictions = trainer.predictions().unwrap();
        assert_eq!(predictions.train.dim(), (60, 3));
        assert_eq!(predictions.test.dim(), (60, 3));
        assert!(predictions.control.is_none());

        let resolved = trainer.resolved_parameters().unwrap();
        assert_eq!(resolved["num_class"], ParamValue::Int(3));
    }

    #[test]
    fn test_unseen_test_class() {
        let mut input = DataInput::new(["x"], None).unwrap();
        let features = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let classes: Vec<i32> = vec![0, 1, 0, 1, 0, 2, 2, 2, 2, 2];
        input
            .add_data(features, 1.0, classes, &SplitOptions::new(0.5).with_shuffle(false))
            .unwrap();

        let err = Trainer::new()
            .train(&input, &small_store(), &TrainOptions::default())
            .unwrap_err();
        assert!(matches!(err, BoostError::ValidationError(_)));
    }
}
