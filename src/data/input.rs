//! Accumulation of labelled batches into train/test/control splits

use super::split::{distinct_sorted, partition_indices, DataSplit, RowValues, SplitKind, SPLIT_SEED};
use crate::error::{BoostError, Result};
use crate::utils::data_loader::{column_names, f64_column, i32_column, DataLoader};
use ndarray::Array2;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// How one batch is partitioned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitOptions {
    /// Fraction of the (non-control) rows used for training
    pub train_fraction: f64,
    /// Fraction of the batch held out as control sample, taken first
    pub control_fraction: Option<f64>,
    /// Shuffle before splitting. Must be set for batches with several classes.
    pub shuffle: Option<bool>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            train_fraction: 0.5,
            control_fraction: None,
            shuffle: None,
        }
    }
}

impl SplitOptions {
    pub fn new(train_fraction: f64) -> Self {
        Self {
            train_fraction,
            ..Default::default()
        }
    }

    pub fn with_control_fraction(mut self, fraction: f64) -> Self {
        self.control_fraction = Some(fraction);
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = Some(shuffle);
        self
    }
}

/// Options for reading a batch out of a columnar source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadOptions {
    pub split: SplitOptions,
    /// Column holding per-entry weights; unit weights when absent
    pub weight_column: Option<String>,
    /// Constant class id for every entry; overrides the class column
    pub class_id: Option<i32>,
}

impl LoadOptions {
    pub fn new(split: SplitOptions) -> Self {
        Self {
            split,
            ..Default::default()
        }
    }

    pub fn with_weight_column(mut self, name: impl Into<String>) -> Self {
        self.weight_column = Some(name.into());
        self
    }

    pub fn with_class_id(mut self, class_id: i32) -> Self {
        self.class_id = Some(class_id);
        self
    }
}

/// Row counts produced by one `add_data` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub n_rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub n_control: usize,
}

/// Aggregates batches of features, weights and classes into the three splits.
///
/// The feature list is fixed at construction and determines the column
/// order of every matrix held here.
#[derive(Debug, Clone)]
pub struct DataInput {
    features: Vec<String>,
    class_column: Option<String>,
    data_train: Option<DataSplit>,
    data_test: Option<DataSplit>,
    data_control: Option<DataSplit>,
}

impl DataInput {
    /// Create an aggregator for the given features.
    ///
    /// A class column that also appears among the features is removed from
    /// them.
    pub fn new<I, S>(features: I, class_column: Option<&str>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut features: Vec<String> = features.into_iter().map(Into::into).collect();
        if let Some(class_column) = class_column {
            features.retain(|f| f != class_column);
        }
        if features.is_empty() {
            return Err(BoostError::ValidationError(
                "there should be at least one feature name".to_string(),
            ));
        }

        Ok(Self {
            features,
            class_column: class_column.map(str::to_string),
            data_train: None,
            data_test: None,
            data_control: None,
        })
    }

    /// Create an aggregator from a comma-separated feature list such as `"pt, eta, phi"`
    pub fn from_feature_list(list: &str, class_column: Option<&str>) -> Result<Self> {
        let features = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self::new(features, class_column)
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn class_column(&self) -> Option<&str> {
        self.class_column.as_deref()
    }

    pub fn data_train(&self) -> Option<&DataSplit> {
        self.data_train.as_ref()
    }

    pub fn data_test(&self) -> Option<&DataSplit> {
        self.data_test.as_ref()
    }

    pub fn data_control(&self) -> Option<&DataSplit> {
        self.data_control.as_ref()
    }

    pub fn split(&self, kind: SplitKind) -> Option<&DataSplit> {
        match kind {
            SplitKind::Train => self.data_train(),
            SplitKind::Test => self.data_test(),
            SplitKind::Control => self.data_control(),
        }
    }

    /// Total number of entries across all splits
    pub fn n_entries(&self) -> usize {
        self.data_train
            .iter()
            .chain(self.data_test.iter())
            .chain(self.data_control.iter())
            .map(DataSplit::n_rows)
            .sum()
    }

    /// Sorted distinct class ids of the accumulated training split
    pub fn class_types(&self) -> Result<Vec<i32>> {
        self.data_train
            .as_ref()
            .map(DataSplit::class_types)
            .ok_or_else(|| BoostError::UsageError("no data has been added yet".to_string()))
    }

    /// Partition one batch and append it to the accumulated splits
    pub fn add_data(
        &mut self,
        features: Array2<f64>,
        weights: impl Into<RowValues<f64>>,
        classes: impl Into<RowValues<i32>>,
        options: &SplitOptions,
    ) -> Result<BatchSummary> {
        let n_rows = features.nrows();
        let weights = weights.into().resolve(n_rows, "weights")?;
        let classes = classes.into().resolve(n_rows, "classes")?;

        if features.ncols() != self.features.len() {
            return Err(BoostError::ShapeError {
                expected: format!("{} feature columns", self.features.len()),
                actual: format!("{} feature columns", features.ncols()),
            });
        }

        let batch_classes = distinct_sorted(classes.iter().copied());
        let shuffle = match options.shuffle {
            Some(shuffle) => shuffle,
            None if batch_classes.len() > 1 => {
                return Err(BoostError::ValidationError(format!(
                    "the batch holds {} classes {:?}; choose shuffle explicitly",
                    batch_classes.len(),
                    batch_classes
                )));
            }
            None => false,
        };

        let batch = DataSplit::new(features, weights, classes)?;

        let (control, remainder) = match options.control_fraction {
            Some(fraction) => {
                let (control_idx, rest_idx) = partition_indices(n_rows, fraction, shuffle, SPLIT_SEED)?;
                (Some(batch.select(&control_idx)), batch.select(&rest_idx))
            }
            None => (None, batch),
        };

        let (train_idx, test_idx) =
            partition_indices(remainder.n_rows(), options.train_fraction, shuffle, SPLIT_SEED)?;
        let train = remainder.select(&train_idx);
        let test = remainder.select(&test_idx);

        let summary = BatchSummary {
            n_rows,
            n_train: train.n_rows(),
            n_test: test.n_rows(),
            n_control: control.as_ref().map_or(0, DataSplit::n_rows),
        };

        extend(&mut self.data_train, train)?;
        extend(&mut self.data_test, test)?;
        if let Some(control) = control {
            extend(&mut self.data_control, control)?;
        }

        info!(
            rows = summary.n_rows,
            train = summary.n_train,
            test = summary.n_test,
            control = summary.n_control,
            classes = ?batch_classes,
            "Added batch"
        );

        Ok(summary)
    }

    /// Read features, weights and classes out of an in-memory frame and add them
    pub fn add_frame(&mut self, df: &DataFrame, options: &LoadOptions) -> Result<BatchSummary> {
        let available = column_names(df);
        let has_column = |name: &str| available.iter().any(|c| c == name);

        if let Some(weight_column) = &options.weight_column {
            if !has_column(weight_column) {
                return Err(BoostError::ValidationError(format!(
                    "the weight column '{}' does not exist in the input",
                    weight_column
                )));
            }
        }

        let class_source = match (options.class_id, &self.class_column) {
            (Some(class_id), _) => ClassSource::Constant(class_id),
            (None, None) => {
                return Err(BoostError::ValidationError(
                    "no class column was configured, so a class id must be given".to_string(),
                ));
            }
            (None, Some(column)) => {
                if !has_column(column) {
                    return Err(BoostError::ValidationError(format!(
                        "the class column '{}' is not among the input columns",
                        column
                    )));
                }
                ClassSource::Column(column.clone())
            }
        };

        for feature in &self.features {
            if !has_column(feature) {
                return Err(BoostError::ColumnNotFound(feature.clone()));
            }
        }

        let n_rows = df.height();
        let columns = self
            .features
            .iter()
            .map(|name| f64_column(df, name, f64::NAN))
            .collect::<Result<Vec<_>>>()?;
        let features = Array2::from_shape_fn((n_rows, columns.len()), |(i, j)| columns[j][i]);

        let weights = match &options.weight_column {
            Some(name) => RowValues::PerRow(strict_f64_column(df, name)?),
            None => RowValues::Scalar(1.0),
        };
        let classes = match class_source {
            ClassSource::Constant(class_id) => RowValues::Scalar(class_id),
            ClassSource::Column(name) => RowValues::PerRow(i32_column(df, &name)?),
        };

        debug!(rows = n_rows, features = self.features.len(), "Extracted columns");
        self.add_data(features, weights, classes, &options.split)
    }

    /// Read a columnar file (Parquet, CSV or JSON) and add its contents
    pub fn load_input(&mut self, path: impl AsRef<Path>, options: &LoadOptions) -> Result<BatchSummary> {
        let path = path.as_ref();
        let df = DataLoader::new().load_auto(path)?;
        info!(path = %path.display(), rows = df.height(), "Loaded input");
        self.add_frame(&df, options)
    }
}

enum ClassSource {
    Constant(i32),
    Column(String),
}

fn strict_f64_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let values = f64_column(df, name, f64::NAN)?;
    if values.iter().any(|v| v.is_nan()) {
        return Err(BoostError::ValidationError(format!(
            "the weight column '{}' contains missing values",
            name
        )));
    }
    Ok(values)
}

fn extend(store: &mut Option<DataSplit>, split: DataSplit) -> Result<()> {
    match store {
        Some(existing) => existing.append(&split),
        None => {
            *store = Some(split);
            Ok(())
        }
    }
}
