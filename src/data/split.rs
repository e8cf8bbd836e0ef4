//! Train/test/control splits and the seeded partitioning behind them

use crate::error::{BoostError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seed used for every partition step, so repeated runs split identically.
pub const SPLIT_SEED: u64 = 12345;

/// Which of the three accumulated partitions a split belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SplitKind {
    Train,
    Test,
    Control,
}

impl SplitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitKind::Train => "train",
            SplitKind::Test => "test",
            SplitKind::Control => "control",
        }
    }
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value given either once for the whole batch or once per row
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues<T> {
    Scalar(T),
    PerRow(Vec<T>),
}

impl<T: Clone> RowValues<T> {
    /// Expand to exactly `n_rows` values.
    ///
    /// `what` names the quantity in the error raised when a per-row input
    /// has the wrong length.
    pub fn resolve(self, n_rows: usize, what: &str) -> Result<Array1<T>> {
        match self {
            RowValues::Scalar(value) => Ok(Array1::from_elem(n_rows, value)),
            RowValues::PerRow(values) => {
                if values.len() != n_rows {
                    return Err(BoostError::ValidationError(format!(
                        "{} has {} entries but the feature matrix has {} rows",
                        what,
                        values.len(),
                        n_rows
                    )));
                }
                Ok(Array1::from_vec(values))
            }
        }
    }
}

impl From<f64> for RowValues<f64> {
    fn from(value: f64) -> Self {
        RowValues::Scalar(value)
    }
}

impl From<Vec<f64>> for RowValues<f64> {
    fn from(values: Vec<f64>) -> Self {
        RowValues::PerRow(values)
    }
}

impl From<Array1<f64>> for RowValues<f64> {
    fn from(values: Array1<f64>) -> Self {
        RowValues::PerRow(values.to_vec())
    }
}

impl From<i32> for RowValues<i32> {
    fn from(value: i32) -> Self {
        RowValues::Scalar(value)
    }
}

impl From<Vec<i32>> for RowValues<i32> {
    fn from(values: Vec<i32>) -> Self {
        RowValues::PerRow(values)
    }
}

impl From<Array1<i32>> for RowValues<i32> {
    fn from(values: Array1<i32>) -> Self {
        RowValues::PerRow(values.to_vec())
    }
}

/// Features, weights and class ids of one partition
#[derive(Debug, Clone)]
pub struct DataSplit {
    pub features: Array2<f64>,
    pub weights: Array1<f64>,
    pub classes: Array1<i32>,
}

impl DataSplit {
    /// Bundle row-aligned arrays into a split
    pub fn new(features: Array2<f64>, weights: Array1<f64>, classes: Array1<i32>) -> Result<Self> {
        let n = features.nrows();
        if weights.len() != n || classes.len() != n {
            return Err(BoostError::ValidationError(format!(
                "row counts disagree: features = {}, weights = {}, classes = {}",
                n,
                weights.len(),
                classes.len()
            )));
        }
        Ok(Self { features, weights, classes })
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Copy out the given rows, in the given order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            weights: self.weights.select(Axis(0), indices),
            classes: self.classes.select(Axis(0), indices),
        }
    }

    /// Append another split's rows after this one's
    pub fn append(&mut self, other: &DataSplit) -> Result<()> {
        if other.n_features() != self.n_features() {
            return Err(BoostError::ShapeError {
                expected: format!("{} feature columns", self.n_features()),
                actual: format!("{} feature columns", other.n_features()),
            });
        }
        self.features.append(Axis(0), other.features.view())?;
        self.weights.append(Axis(0), other.weights.view())?;
        self.classes.append(Axis(0), other.classes.view())?;
        Ok(())
    }

    /// Sorted distinct class ids
    pub fn class_types(&self) -> Vec<i32> {
        distinct_sorted(self.classes.iter().copied())
    }

    /// Sum of weights over the rows of one class
    pub fn class_weight_sum(&self, class_id: i32) -> f64 {
        self.classes
            .iter()
            .zip(self.weights.iter())
            .filter(|(&c, _)| c == class_id)
            .map(|(_, &w)| w)
            .sum()
    }
}

pub(crate) fn distinct_sorted(values: impl Iterator<Item = i32>) -> Vec<i32> {
    let mut out: Vec<i32> = values.collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Split `0..n_rows` into a selected part of `floor(fraction * n_rows)` rows
/// and the remainder.
///
/// Without shuffling the selected part is the leading rows. With shuffling
/// the rows are permuted first by a ChaCha8 generator seeded with `seed`.
pub fn partition_indices(
    n_rows: usize,
    fraction: f64,
    shuffle: bool,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(BoostError::ValidationError(format!(
            "split fraction must lie strictly between 0 and 1, got {}",
            fraction
        )));
    }

    let n_selected = (fraction * n_rows as f64).floor() as usize;
    if n_selected == 0 || n_selected == n_rows {
        return Err(BoostError::ValidationError(format!(
            "splitting {} rows with fraction {} leaves one side empty",
            n_rows, fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    if shuffle {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
    }

    let rest = indices.split_off(n_selected);
    Ok((indices, rest))
}
