//! Model training
//!
//! - [`params`] - the type-checked hyperparameter store
//! - [`trainer`] - class rebalancing, objective selection and fitting
//! - [`booster`] - the gradient-boosted tree engine
//! - [`objective`] - losses and evaluation metrics
//! - [`early_stopping`] - patience-based stopping on an evaluation metric

pub mod booster;
pub mod early_stopping;
pub mod objective;
pub mod params;
pub mod trainer;

pub use booster::{Booster, BoosterConfig, DMatrix, EvalHistory};
pub use early_stopping::EarlyStopping;
pub use objective::{EvalMetric, Objective};
pub use params::{ParamKind, ParamValue, ParameterStore, NUM_ROUND};
pub use trainer::{rebalance_class_weights, resolve_objective, SplitPredictions, SplitWeights, TrainOptions, Trainer};
