//! Gradient-boosted tree ensembles with second-order split finding
//!
//! Each round fits one tree per output group on the gradient and hessian of
//! the objective:
//! - leaf weight: w* = -T(G) / (H + lambda), T the soft-threshold at alpha
//! - split gain: 0.5 * [T(GL)²/(HL+λ) + T(GR)²/(HR+λ) - T(G)²/(H+λ)], kept when > gamma
//! - rows whose split feature is NaN follow the right branch
//!
//! Stored leaf values already include the learning rate.

use super::early_stopping::EarlyStopping;
use super::objective::{argmax, EvalMetric, Objective};
use super::params::ParamValue;
use crate::error::{BoostError, Result};
use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Labelled, weighted feature matrix handed to the booster
#[derive(Debug, Clone)]
pub struct DMatrix {
    data: Array2<f64>,
    labels: Vec<f64>,
    weights: Vec<f64>,
    feature_names: Vec<String>,
}

impl DMatrix {
    pub fn new(data: Array2<f64>, labels: Vec<f64>, weights: Vec<f64>) -> Result<Self> {
        let n = data.nrows();
        if labels.len() != n {
            return Err(BoostError::ShapeError {
                expected: format!("{} labels", n),
                actual: format!("{} labels", labels.len()),
            });
        }
        if weights.len() != n {
            return Err(BoostError::ShapeError {
                expected: format!("{} weights", n),
                actual: format!("{} weights", weights.len()),
            });
        }
        let feature_names = (0..data.ncols()).map(|j| format!("f{}", j)).collect();
        Ok(Self {
            data,
            labels,
            weights,
            feature_names,
        })
    }

    /// Name the feature columns; used in model dumps
    pub fn with_feature_names(mut self, names: Vec<String>) -> Result<Self> {
        if names.len() != self.data.ncols() {
            return Err(BoostError::ShapeError {
                expected: format!("{} feature names", self.data.ncols()),
                actual: format!("{} feature names", names.len()),
            });
        }
        self.feature_names = names;
        Ok(self)
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

/// Booster hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoosterConfig {
    pub objective: Objective,
    pub eval_metric: EvalMetric,
    /// Number of classes; only read by multi-class objectives
    pub num_class: usize,
    pub eta: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub lambda: f64,
    /// L1 regularization on leaf weights
    pub alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    /// Weight multiplier for positive rows of a binary objective
    pub scale_pos_weight: f64,
    /// Split-search threads; 0 lets rayon decide
    pub nthread: usize,
    pub seed: u64,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self {
            objective: Objective::BinaryLogistic,
            eval_metric: EvalMetric::LogLoss,
            num_class: 1,
            eta: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            lambda: 1.0,
            alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            scale_pos_weight: 1.0,
            nthread: 0,
            seed: 0,
        }
    }
}

impl BoosterConfig {
    /// Read the booster settings out of a flat parameter map.
    ///
    /// Numeric settings accept either numeric kind. Names the booster does
    /// not use are skipped.
    pub fn from_parameters(params: &BTreeMap<String, ParamValue>) -> Result<Self> {
        let mut config = Self::default();
        let mut metric = None;

        for (name, value) in params {
            match name.as_str() {
                "objective" => config.objective = read_str(name, value)?.parse()?,
                "eval_metric" => metric = Some(read_str(name, value)?.parse::<EvalMetric>()?),
                "num_class" => config.num_class = read_usize(name, value)?,
                "eta" | "learning_rate" => config.eta = read_f64(name, value)?,
                "max_depth" => config.max_depth = read_usize(name, value)?,
                "min_child_weight" => config.min_child_weight = read_f64(name, value)?,
                "lambda" | "reg_lambda" => config.lambda = read_f64(name, value)?,
                "alpha" | "reg_alpha" => config.alpha = read_f64(name, value)?,
                "gamma" => config.gamma = read_f64(name, value)?,
                "subsample" => config.subsample = read_f64(name, value)?,
                "colsample_bytree" => config.colsample_bytree = read_f64(name, value)?,
                "scale_pos_weight" => config.scale_pos_weight = read_f64(name, value)?,
                "nthread" => config.nthread = read_usize(name, value)?,
                "seed" => config.seed = read_usize(name, value)? as u64,
                "silent" | "num_round" => {}
                other => debug!(parameter = other, "booster ignores parameter"),
            }
        }

        config.eval_metric = metric.unwrap_or_else(|| config.objective.default_metric());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f64| {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(BoostError::ValidationError(format!(
                    "{} must lie in (0, 1], got {}",
                    name, v
                )))
            }
        };
        unit("subsample", self.subsample)?;
        unit("colsample_bytree", self.colsample_bytree)?;

        if !(self.eta > 0.0) {
            return Err(BoostError::ValidationError(format!(
                "eta must be positive, got {}",
                self.eta
            )));
        }
        for (name, v) in [
            ("lambda", self.lambda),
            ("alpha", self.alpha),
            ("gamma", self.gamma),
            ("min_child_weight", self.min_child_weight),
        ] {
            if !(v >= 0.0) {
                return Err(BoostError::ValidationError(format!(
                    "{} must be non-negative, got {}",
                    name, v
                )));
            }
        }
        if !(self.scale_pos_weight > 0.0) {
            return Err(BoostError::ValidationError(format!(
                "scale_pos_weight must be positive, got {}",
                self.scale_pos_weight
            )));
        }

        if self.objective.is_multiclass() {
            if self.num_class < 2 {
                return Err(BoostError::ValidationError(format!(
                    "objective {} needs num_class >= 2, got {}",
                    self.objective, self.num_class
                )));
            }
            if self.eval_metric.is_binary_only() {
                return Err(BoostError::ValidationError(format!(
                    "metric {} is not defined for objective {}",
                    self.eval_metric, self.objective
                )));
            }
        } else if self.eval_metric.is_multiclass_only() {
            return Err(BoostError::ValidationError(format!(
                "metric {} is not defined for objective {}",
                self.eval_metric, self.objective
            )));
        }
        Ok(())
    }

    fn n_groups(&self) -> usize {
        self.objective.n_groups(self.num_class)
    }
}

fn read_str<'a>(name: &str, value: &'a ParamValue) -> Result<&'a str> {
    value.as_str().ok_or_else(|| BoostError::ParameterType {
        name: name.to_string(),
        expected: "string".to_string(),
        actual: value.kind().to_string(),
    })
}

fn read_f64(name: &str, value: &ParamValue) -> Result<f64> {
    value.as_f64().ok_or_else(|| BoostError::ParameterType {
        name: name.to_string(),
        expected: "number".to_string(),
        actual: value.kind().to_string(),
    })
}

fn read_usize(name: &str, value: &ParamValue) -> Result<usize> {
    let v = read_f64(name, value)?;
    if v < 0.0 || v.fract() != 0.0 || !v.is_finite() {
        return Err(BoostError::ValidationError(format!(
            "{} must be a non-negative integer, got {}",
            name, value
        )));
    }
    Ok(v as usize)
}

/// A node of a regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        weight: f64,
        cover: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        gain: f64,
        cover: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            TreeNode::Leaf { weight, .. } => *weight,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                // NaN compares false and goes right
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    /// Nested JSON dump; children ids are allocated in pairs
    fn dump(&self, nodeid: usize, depth: usize, next_id: &mut usize, names: &[String]) -> Value {
        match self {
            TreeNode::Leaf { weight, cover } => json!({
                "nodeid": nodeid,
                "leaf": weight,
                "cover": cover,
            }),
            TreeNode::Split {
                feature,
                threshold,
                gain,
                cover,
                left,
                right,
            } => {
                let yes = *next_id;
                let no = yes + 1;
                *next_id += 2;
                let left = left.dump(yes, depth + 1, next_id, names);
                let right = right.dump(no, depth + 1, next_id, names);
                let split = names
                    .get(*feature)
                    .cloned()
                    .unwrap_or_else(|| format!("f{}", feature));
                json!({
                    "nodeid": nodeid,
                    "depth": depth,
                    "split": split,
                    "split_condition": threshold,
                    "yes": yes,
                    "no": no,
                    "missing": no,
                    "gain": gain,
                    "cover": cover,
                    "children": [left, right],
                })
            }
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

fn soft_threshold(g: f64, alpha: f64) -> f64 {
    if g > alpha {
        g - alpha
    } else if g < -alpha {
        g + alpha
    } else {
        0.0
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    -soft_threshold(g_sum, alpha) / (h_sum + lambda)
}

fn leaf_score(g_sum: f64, h_sum: f64, config: &BoosterConfig) -> f64 {
    let g = soft_threshold(g_sum, config.alpha);
    g * g / (h_sum + config.lambda)
}

/// Grow a tree with exact greedy split finding
fn build_tree(
    x: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &BoosterConfig,
) -> TreeNode {
    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();

    let leaf = TreeNode::Leaf {
        weight: config.eta * compute_leaf_weight(g_sum, h_sum, config.lambda, config.alpha),
        cover: h_sum,
    };

    if depth >= config.max_depth || indices.len() < 2 || h_sum < config.min_child_weight {
        return leaf;
    }

    let best = feature_indices
        .par_iter()
        .filter_map(|&f| find_best_split(x, grad, hess, indices, f, g_sum, h_sum, config))
        .max_by(|a, b| {
            a.gain
                .partial_cmp(&b.gain)
                .unwrap_or(Ordering::Equal)
                .then(b.feature.cmp(&a.feature))
        });

    match best {
        Some(split) if split.gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[[i, split.feature]] <= split.threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return leaf;
            }

            let left = build_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            TreeNode::Split {
                feature: split.feature,
                threshold: split.threshold,
                gain: split.gain,
                cover: h_sum,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => leaf,
    }
}

/// Best split of one feature; rows with a NaN value stay on the right
#[allow(clippy::too_many_arguments)]
fn find_best_split(
    x: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    indices: &[usize],
    feature: usize,
    g_total: f64,
    h_total: f64,
    config: &BoosterConfig,
) -> Option<SplitCandidate> {
    let mut present: Vec<usize> = indices
        .iter()
        .copied()
        .filter(|&i| !x[[i, feature]].is_nan())
        .collect();
    present.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
    let has_missing = present.len() < indices.len();

    let parent_score = leaf_score(g_total, h_total, config);
    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<SplitCandidate> = None;

    for (pos, &idx) in present.iter().enumerate() {
        g_left += grad[idx];
        h_left += hess[idx];

        let value = x[[idx, feature]];
        let threshold = match present.get(pos + 1) {
            Some(&next) => {
                let next_value = x[[next, feature]];
                if next_value - value < 1e-12 {
                    continue;
                }
                value + (next_value - value) / 2.0
            }
            None if has_missing => value,
            None => break,
        };

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;
        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5
            * (leaf_score(g_left, h_left, config) + leaf_score(g_right, h_right, config)
                - parent_score);

        if best.as_ref().map_or(true, |b| gain > b.gain) {
            best = Some(SplitCandidate {
                feature,
                threshold,
                gain,
            });
        }
    }

    best
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64) * ratio).ceil() as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k.max(1));
    indices.sort_unstable();
    indices
}

/// Metric values of one evaluation set, one per round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalHistory {
    pub name: String,
    pub metric: EvalMetric,
    pub values: Vec<f64>,
}

/// A trained tree ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booster {
    config: BoosterConfig,
    feature_names: Vec<String>,
    base_margin: Vec<f64>,
    /// Trees per round, one per output group
    trees: Vec<Vec<TreeNode>>,
    best_iteration: Option<usize>,
    best_score: Option<f64>,
    evals_result: Vec<EvalHistory>,
    trained_at: DateTime<Utc>,
}

impl Booster {
    /// Boost for up to `num_round` rounds.
    ///
    /// The metric of every evaluation set is recorded after each round. With
    /// `early_stopping_rounds`, training stops once the last evaluation set
    /// has not improved for that many rounds and the ensemble keeps the trees
    /// up to and including the best round.
    pub fn train(
        config: BoosterConfig,
        dtrain: &DMatrix,
        evals: &[(&DMatrix, &str)],
        num_round: usize,
        early_stopping_rounds: Option<usize>,
    ) -> Result<Booster> {
        config.validate()?;
        if dtrain.n_rows() == 0 {
            return Err(BoostError::TrainingError("training matrix is empty".to_string()));
        }
        check_labels(&config, dtrain, "train")?;
        for (matrix, name) in evals {
            if matrix.n_features() != dtrain.n_features() {
                return Err(BoostError::ShapeError {
                    expected: format!("{} features in '{}'", dtrain.n_features(), name),
                    actual: format!("{} features", matrix.n_features()),
                });
            }
            check_labels(&config, matrix, name)?;
        }
        if early_stopping_rounds.is_some() && evals.is_empty() {
            return Err(BoostError::ValidationError(
                "early stopping needs at least one evaluation set".to_string(),
            ));
        }

        let objective = config.objective;
        let metric = config.eval_metric;
        let n_groups = config.n_groups();
        let n = dtrain.n_rows();
        let x = dtrain.data();
        let labels = dtrain.labels();

        let weights: Vec<f64> = if objective.is_multiclass() {
            dtrain.weights().to_vec()
        } else {
            dtrain
                .weights()
                .iter()
                .zip(labels)
                .map(|(&w, &y)| if y > 0.5 { w * config.scale_pos_weight } else { w })
                .collect()
        };

        let base_margin = objective.base_margin(labels, &weights, n_groups);
        let init = |rows: usize| -> Vec<f64> {
            base_margin
                .iter()
                .flat_map(|&b| std::iter::repeat(b).take(rows))
                .collect()
        };
        let mut margins = init(n);
        let mut eval_margins: Vec<Vec<f64>> = evals.iter().map(|(m, _)| init(m.n_rows())).collect();
        let mut evals_result: Vec<EvalHistory> = evals
            .iter()
            .map(|(_, name)| EvalHistory {
                name: name.to_string(),
                metric,
                values: Vec::new(),
            })
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.nthread)
            .build()
            .map_err(|e| BoostError::TrainingError(e.to_string()))?;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
        let mut stopper = early_stopping_rounds.map(|p| EarlyStopping::new(p, metric.higher_is_better()));

        info!(
            objective = %objective,
            eval_metric = %metric,
            rows = n,
            features = dtrain.n_features(),
            num_round,
            "training booster"
        );

        let mut trees: Vec<Vec<TreeNode>> = Vec::with_capacity(num_round);
        let mut grad = vec![0.0; n * n_groups];
        let mut hess = vec![0.0; n * n_groups];

        for round in 0..num_round {
            objective.gradients(&margins, labels, &weights, n_groups, &mut grad, &mut hess);

            let rows = subsample(&mut rng, n, config.subsample);
            let cols = subsample(&mut rng, dtrain.n_features(), config.colsample_bytree);

            let mut round_trees = Vec::with_capacity(n_groups);
            for k in 0..n_groups {
                let g = &grad[k * n..(k + 1) * n];
                let h = &hess[k * n..(k + 1) * n];
                let tree = pool.install(|| build_tree(x, g, h, &rows, &cols, 0, &config));

                add_tree(&tree, x, &mut margins[k * n..(k + 1) * n]);
                for ((matrix, _), em) in evals.iter().zip(eval_margins.iter_mut()) {
                    let m = matrix.n_rows();
                    add_tree(&tree, matrix.data(), &mut em[k * m..(k + 1) * m]);
                }
                round_trees.push(tree);
            }
            trees.push(round_trees);

            for (((matrix, _), em), history) in evals.iter().zip(&eval_margins).zip(evals_result.iter_mut()) {
                let probs = objective.probabilities(em, matrix.n_rows(), n_groups);
                let value = metric.evaluate(&probs, matrix.labels(), matrix.weights(), n_groups);
                history.values.push(value);
            }
            debug!(round, metrics = %format_round(&evals_result), "boosting round");

            if let (Some(stopper), Some(last)) = (stopper.as_mut(), evals_result.last()) {
                let value = last.values.last().copied().unwrap_or(f64::NAN);
                if stopper.should_stop(value) {
                    info!(
                        round,
                        best_iteration = stopper.best_round(),
                        "stopping early, '{}' has not improved",
                        last.name
                    );
                    break;
                }
            }
        }

        let (best_iteration, best_score) = match &stopper {
            Some(stopper) => {
                trees.truncate(stopper.best_round() + 1);
                (Some(stopper.best_round()), stopper.best_value())
            }
            None => (
                trees.len().checked_sub(1),
                evals_result.last().and_then(|h| h.values.last().copied()),
            ),
        };

        Ok(Booster {
            config,
            feature_names: dtrain.feature_names().to_vec(),
            base_margin,
            trees,
            best_iteration,
            best_score,
            evals_result,
            trained_at: Utc::now(),
        })
    }

    pub fn config(&self) -> &BoosterConfig {
        &self.config
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Output columns of [`Booster::predict_raw`]
    pub fn n_groups(&self) -> usize {
        self.config.n_groups()
    }

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.iter().map(Vec::len).sum()
    }

    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    pub fn evals_result(&self) -> &[EvalHistory] {
        &self.evals_result
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Raw margins, shape `(n_rows, n_groups)`
    pub fn predict_raw(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        let n = data.nrows();
        let margins = self.margins(data)?;
        Ok(Array2::from_shape_fn((n, self.n_groups()), |(i, k)| margins[k * n + i]))
    }

    /// Transformed predictions.
    ///
    /// `binary:logistic` gives one probability column, `multi:softprob` one
    /// probability column per class and `multi:softmax` the predicted class
    /// index in a single column.
    pub fn predict(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        let n = data.nrows();
        let n_groups = self.n_groups();
        let margins = self.margins(data)?;
        let probs = self.config.objective.probabilities(&margins, n, n_groups);

        let out = match self.config.objective {
            Objective::BinaryLogistic => Array2::from_shape_vec((n, 1), probs)?,
            Objective::MultiSoftprob => Array2::from_shape_vec((n, n_groups), probs)?,
            Objective::MultiSoftmax => Array2::from_shape_fn((n, 1), |(i, _)| {
                argmax(&probs[i * n_groups..(i + 1) * n_groups]) as f64
            }),
        };
        Ok(out)
    }

    fn margins(&self, data: &Array2<f64>) -> Result<Vec<f64>> {
        if data.ncols() != self.n_features() {
            return Err(BoostError::ShapeError {
                expected: format!("{} feature columns", self.n_features()),
                actual: format!("{} feature columns", data.ncols()),
            });
        }
        let n = data.nrows();
        let mut margins: Vec<f64> = self
            .base_margin
            .iter()
            .flat_map(|&b| std::iter::repeat(b).take(n))
            .collect();
        for round in &self.trees {
            for (k, tree) in round.iter().enumerate() {
                add_tree(tree, data, &mut margins[k * n..(k + 1) * n]);
            }
        }
        Ok(margins)
    }

    /// JSON array with one nested node object per tree, in boosting order
    pub fn dump_model(&self) -> Value {
        let trees: Vec<Value> = self
            .trees
            .iter()
            .flatten()
            .map(|tree| {
                let mut next_id = 1;
                tree.dump(0, 0, &mut next_id, &self.feature_names)
            })
            .collect();
        Value::Array(trees)
    }

    /// Write the model; a `.json` path gets the tree dump, anything else
    /// the native binary format.
    pub fn save_model(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        if is_json_path(path) {
            serde_json::to_writer_pretty(&mut writer, &self.dump_model())?;
        } else {
            bincode::serialize_into(&mut writer, self)?;
        }
        writer.flush()?;
        info!(path = %path.display(), trees = self.n_trees(), "saved model");
        Ok(())
    }

    /// Read a model written in the native binary format
    pub fn load_model(path: impl AsRef<Path>) -> Result<Booster> {
        let path = path.as_ref();
        if is_json_path(path) {
            return Err(BoostError::UsageError(format!(
                "{} is a tree dump and cannot be loaded; save the model without a .json suffix",
                path.display()
            )));
        }
        let reader = BufReader::new(File::open(path)?);
        let booster: Booster = bincode::deserialize_from(reader)?;
        Ok(booster)
    }
}

fn add_tree(tree: &TreeNode, data: &Array2<f64>, margins: &mut [f64]) {
    for (m, row) in margins.iter_mut().zip(data.rows()) {
        *m += tree.predict(row);
    }
}

fn check_labels(config: &BoosterConfig, matrix: &DMatrix, name: &str) -> Result<()> {
    let n_labels = if config.objective.is_multiclass() {
        config.num_class
    } else {
        2
    };
    let bad = matrix
        .labels()
        .iter()
        .find(|&&y| y.fract() != 0.0 || y < 0.0 || y >= n_labels as f64);
    match bad {
        Some(y) => Err(BoostError::ValidationError(format!(
            "label {} in '{}' is not a class index below {}",
            y, name, n_labels
        ))),
        None => Ok(()),
    }
}

fn format_round(history: &[EvalHistory]) -> String {
    history
        .iter()
        .filter_map(|h| h.values.last().map(|v| format!("{}-{}:{:.5}", h.name, h.metric, v)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("json"))
}
