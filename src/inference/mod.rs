//! Inference on saved models
//!
//! [`ModelEvaluator`] loads a native model and evaluates it either one entry
//! at a time from named variables or on whole frames.

mod evaluator;

pub use evaluator::ModelEvaluator;
