//! boostrun - experiment layer for gradient-boosted tree classifiers
//!
//! Batches of labelled, weighted entries are split into train, test and
//! control samples, hyperparameters are kept in a type-checked store, and a
//! trainer fits a boosted tree ensemble with class-balanced weights.
//!
//! # Modules
//!
//! - [`data`] - train/test/control aggregation of input batches
//! - [`training`] - parameter store, trainer and the boosting engine
//! - [`inference`] - evaluation of saved models on named variables
//! - [`utils`] - columnar file loading and saving
//! - [`cli`] - command-line interface

// Core error handling
pub mod error;

pub mod data;
pub mod training;
pub mod inference;
pub mod utils;

pub mod cli;

pub use error::{BoostError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{BoostError, Result};

    // Data input
    pub use crate::data::{BatchSummary, DataInput, DataSplit, LoadOptions, RowValues, SplitKind, SplitOptions};

    // Training
    pub use crate::training::{
        Booster, BoosterConfig, DMatrix, EvalMetric, Objective, ParamValue, ParameterStore,
        SplitPredictions, TrainOptions, Trainer,
    };

    // Inference
    pub use crate::inference::ModelEvaluator;
}
