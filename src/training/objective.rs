//! Learning objectives and evaluation metrics understood by the booster
//!
//! Predictions are held as raw margins in column-major order: output `k`
//! of row `i` lives at `k * n_rows + i`.

use crate::error::{BoostError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const HESS_MIN: f64 = 1e-6;
const PROB_EPS: f64 = 1e-15;

/// Training objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    /// Logistic regression on labels {0, 1}, predicts a probability
    BinaryLogistic,
    /// Softmax over `num_class` outputs, predicts class probabilities
    MultiSoftprob,
    /// Softmax over `num_class` outputs, predicts the most likely class index
    MultiSoftmax,
}

impl Objective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Objective::BinaryLogistic => "binary:logistic",
            Objective::MultiSoftprob => "multi:softprob",
            Objective::MultiSoftmax => "multi:softmax",
        }
    }

    pub fn is_multiclass(&self) -> bool {
        !matches!(self, Objective::BinaryLogistic)
    }

    /// Metric tracked when none is configured
    pub fn default_metric(&self) -> EvalMetric {
        if self.is_multiclass() {
            EvalMetric::MLogLoss
        } else {
            EvalMetric::LogLoss
        }
    }

    /// Number of trees grown per round
    pub fn n_groups(&self, num_class: usize) -> usize {
        if self.is_multiclass() {
            num_class
        } else {
            1
        }
    }

    /// Initial margin per output group
    pub fn base_margin(&self, labels: &[f64], weights: &[f64], n_groups: usize) -> Vec<f64> {
        match self {
            Objective::BinaryLogistic => {
                let (pos, total) = labels
                    .iter()
                    .zip(weights)
                    .fold((0.0, 0.0), |(pos, total), (&y, &w)| (pos + y * w, total + w));
                if total <= 0.0 {
                    return vec![0.0];
                }
                let p = (pos / total).clamp(1e-7, 1.0 - 1e-7);
                vec![(p / (1.0 - p)).ln()]
            }
            Objective::MultiSoftprob | Objective::MultiSoftmax => vec![0.0; n_groups],
        }
    }

    /// Fill weighted first and second derivatives of the loss
    pub fn gradients(
        &self,
        margins: &[f64],
        labels: &[f64],
        weights: &[f64],
        n_groups: usize,
        grad: &mut [f64],
        hess: &mut [f64],
    ) {
        let n_rows = labels.len();
        debug_assert_eq!(margins.len(), n_rows * n_groups);

        match self {
            Objective::BinaryLogistic => {
                for i in 0..n_rows {
                    let p = sigmoid(margins[i]);
                    let w = weights[i];
                    grad[i] = w * (p - labels[i]);
                    hess[i] = (w * p * (1.0 - p)).max(HESS_MIN);
                }
            }
            Objective::MultiSoftprob | Objective::MultiSoftmax => {
                let mut probs = vec![0.0; n_groups];
                for i in 0..n_rows {
                    for (k, p) in probs.iter_mut().enumerate() {
                        *p = margins[k * n_rows + i];
                    }
                    softmax_inplace(&mut probs);

                    let label = labels[i] as usize;
                    let w = weights[i];
                    for (k, &p) in probs.iter().enumerate() {
                        let target = if k == label { 1.0 } else { 0.0 };
                        grad[k * n_rows + i] = w * (p - target);
                        hess[k * n_rows + i] = (2.0 * w * p * (1.0 - p)).max(HESS_MIN);
                    }
                }
            }
        }
    }

    /// Turn raw margins into per-row probabilities, row-major `[n_rows * n_groups]`
    pub fn probabilities(&self, margins: &[f64], n_rows: usize, n_groups: usize) -> Vec<f64> {
        match self {
            Objective::BinaryLogistic => margins.iter().map(|&m| sigmoid(m)).collect(),
            Objective::MultiSoftprob | Objective::MultiSoftmax => {
                let mut out = vec![0.0; n_rows * n_groups];
                for i in 0..n_rows {
                    let row = &mut out[i * n_groups..(i + 1) * n_groups];
                    for (k, v) in row.iter_mut().enumerate() {
                        *v = margins[k * n_rows + i];
                    }
                    softmax_inplace(row);
                }
                out
            }
        }
    }
}

impl FromStr for Objective {
    type Err = BoostError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "binary:logistic" => Ok(Objective::BinaryLogistic),
            "multi:softprob" => Ok(Objective::MultiSoftprob),
            "multi:softmax" => Ok(Objective::MultiSoftmax),
            other => Err(BoostError::ValidationError(format!(
                "unsupported objective '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evaluation metric tracked per round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalMetric {
    LogLoss,
    MLogLoss,
    Auc,
    Error,
    MError,
}

impl EvalMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalMetric::LogLoss => "logloss",
            EvalMetric::MLogLoss => "mlogloss",
            EvalMetric::Auc => "auc",
            EvalMetric::Error => "error",
            EvalMetric::MError => "merror",
        }
    }

    /// Metric only defined for two classes
    pub fn is_binary_only(&self) -> bool {
        matches!(self, EvalMetric::LogLoss | EvalMetric::Auc | EvalMetric::Error)
    }

    /// Metric only defined for more than two classes
    pub fn is_multiclass_only(&self) -> bool {
        matches!(self, EvalMetric::MLogLoss | EvalMetric::MError)
    }

    pub fn higher_is_better(&self) -> bool {
        matches!(self, EvalMetric::Auc)
    }

    /// Weighted metric value.
    ///
    /// `probs` is row-major `[n_rows * n_groups]` as returned by
    /// [`Objective::probabilities`]; for binary metrics `n_groups` is 1.
    pub fn evaluate(&self, probs: &[f64], labels: &[f64], weights: &[f64], n_groups: usize) -> f64 {
        let total: f64 = weights.iter().sum();
        if labels.is_empty() || total <= 0.0 {
            return f64::NAN;
        }

        match self {
            EvalMetric::LogLoss => {
                let loss: f64 = probs
                    .iter()
                    .zip(labels)
                    .zip(weights)
                    .map(|((&p, &y), &w)| {
                        let p = p.clamp(PROB_EPS, 1.0 - PROB_EPS);
                        -w * (y * p.ln() + (1.0 - y) * (1.0 - p).ln())
                    })
                    .sum();
                loss / total
            }
            EvalMetric::Error => {
                let wrong: f64 = probs
                    .iter()
                    .zip(labels)
                    .zip(weights)
                    .filter(|((&p, &y), _)| (p > 0.5) != (y > 0.5))
                    .map(|(_, &w)| w)
                    .sum();
                wrong / total
            }
            EvalMetric::MLogLoss => {
                let loss: f64 = labels
                    .iter()
                    .zip(weights)
                    .enumerate()
                    .map(|(i, (&y, &w))| {
                        let p = probs[i * n_groups + y as usize].clamp(PROB_EPS, 1.0 - PROB_EPS);
                        -w * p.ln()
                    })
                    .sum();
                loss / total
            }
            EvalMetric::MError => {
                let wrong: f64 = labels
                    .iter()
                    .zip(weights)
                    .enumerate()
                    .filter(|(i, (&y, _))| argmax(&probs[i * n_groups..(i + 1) * n_groups]) != y as usize)
                    .map(|(_, (_, &w))| w)
                    .sum();
                wrong / total
            }
            EvalMetric::Auc => weighted_auc(probs, labels, weights),
        }
    }
}

impl FromStr for EvalMetric {
    type Err = BoostError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "logloss" => Ok(EvalMetric::LogLoss),
            "mlogloss" => Ok(EvalMetric::MLogLoss),
            "auc" => Ok(EvalMetric::Auc),
            "error" => Ok(EvalMetric::Error),
            "merror" => Ok(EvalMetric::MError),
            other => Err(BoostError::ValidationError(format!(
                "unsupported evaluation metric '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for EvalMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax_inplace(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Weighted ROC AUC; tied scores contribute half credit
fn weighted_auc(scores: &[f64], labels: &[f64], weights: &[f64]) -> f64 {
    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(std::cmp::Ordering::Equal));

    let (mut tp, mut fp, mut area) = (0.0, 0.0, 0.0);
    let mut i = 0;
    while i < order.len() {
        let score = scores[order[i]];
        let (mut dtp, mut dfp) = (0.0, 0.0);
        while i < order.len() && scores[order[i]] == score {
            let idx = order[i];
            if labels[idx] > 0.5 {
                dtp += weights[idx];
            } else {
                dfp += weights[idx];
            }
            i += 1;
        }
        area += dfp * (tp + dtp / 2.0);
        tp += dtp;
        fp += dfp;
    }

    if tp <= 0.0 || fp <= 0.0 {
        return 0.5;
    }
    area / (tp * fp)
}
