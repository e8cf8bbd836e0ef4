//! Evaluation of a saved booster on named variables

use crate::error::{BoostError, Result};
use crate::training::Booster;
use crate::utils::data_loader::{column_names, f64_column};
use ndarray::Array2;
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// A loaded booster bound to an ordered list of input variables.
///
/// Inputs equal to the missing value, and variables that are not supplied,
/// are treated as missing by the trees.
#[derive(Debug, Clone)]
pub struct ModelEvaluator {
    booster: Booster,
    variable_names: Vec<String>,
    missing_value: f64,
}

impl ModelEvaluator {
    /// Load a model saved in the native format
    pub fn build<I, S>(path: impl AsRef<Path>, variable_names: I, missing_value: f64) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BoostError::DataError(format!(
                "model file {} does not exist",
                path.display()
            )));
        }
        let booster = Booster::load_model(path)?;
        info!(path = %path.display(), trees = booster.n_trees(), "Loaded model");
        Self::from_booster(booster, variable_names, missing_value)
    }

    pub fn from_booster<I, S>(booster: Booster, variable_names: I, missing_value: f64) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let variable_names: Vec<String> = variable_names.into_iter().map(Into::into).collect();
        if variable_names.len() != booster.n_features() {
            return Err(BoostError::ShapeError {
                expected: format!("{} variables", booster.n_features()),
                actual: format!("{} variables", variable_names.len()),
            });
        }
        Ok(Self {
            booster,
            variable_names,
            missing_value,
        })
    }

    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    pub fn missing_value(&self) -> f64 {
        self.missing_value
    }

    pub fn booster(&self) -> &Booster {
        &self.booster
    }

    /// Predictions for one entry
    pub fn eval(&self, vars: &HashMap<String, f64>) -> Result<Vec<f64>> {
        let row = Array2::from_shape_fn((1, self.variable_names.len()), |(_, j)| {
            let value = vars
                .get(&self.variable_names[j])
                .copied()
                .unwrap_or(self.missing_value);
            self.mark_missing(value)
        });
        let preds = self.booster.predict(&row)?;
        Ok(preds.row(0).to_vec())
    }

    /// The single prediction of a model with one output
    pub fn eval_single(&self, vars: &HashMap<String, f64>) -> Result<f64> {
        match self.eval(vars)?.as_slice() {
            [value] => Ok(*value),
            values => Err(BoostError::InferenceError(format!(
                "the model returns {} values per entry, not 1",
                values.len()
            ))),
        }
    }

    /// Predictions for every row of a frame; absent columns count as missing
    pub fn eval_frame(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let available = column_names(df);
        let n_rows = df.height();
        let columns = self
            .variable_names
            .iter()
            .map(|name| {
                if available.iter().any(|c| c == name) {
                    f64_column(df, name, self.missing_value)
                } else {
                    Ok(vec![self.missing_value; n_rows])
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let data = Array2::from_shape_fn((n_rows, columns.len()), |(i, j)| self.mark_missing(columns[j][i]));
        self.booster.predict(&data)
    }

    fn mark_missing(&self, value: f64) -> f64 {
        if value == self.missing_value {
            f64::NAN
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{BoosterConfig, DMatrix, EvalMetric, Objective};
    use polars::prelude::df;

    fn trained(objective: Objective) -> Booster {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y: Vec<f64> = (0..30).map(|i| (i / 10) as f64).collect();
        let dtrain = DMatrix::new(x, y, vec![1.0; 30]).unwrap();
        let config = BoosterConfig {
            objective,
            eval_metric: EvalMetric::MLogLoss,
            num_class: 3,
            ..Default::default()
        };
        Booster::train(config, &dtrain, &[], 5, None).unwrap()
    }

    #[test]
    fn test_build_missing_file() {
        let err = ModelEvaluator::build("/nonexistent/model.bin", ["a", "b"], -999.0).unwrap_err();
        assert!(matches!(err, BoostError::DataError(_)));
    }

    #[test]
    fn test_variable_count_mismatch() {
        let err = ModelEvaluator::from_booster(trained(Objective::MultiSoftprob), ["a"], -999.0).unwrap_err();
        assert!(matches!(err, BoostError::ShapeError { .. }));
    }

    #[test]
    fn test_eval_substitutes_missing() {
        let booster = trained(Objective::MultiSoftprob);
        let evaluator = ModelEvaluator::from_booster(booster.clone(), ["a", "b"], -999.0).unwrap();

        let vars = HashMap::from([("a".to_string(), 25.0)]);
        let values = evaluator.eval(&vars).unwrap();
        let expected = booster.predict(&ndarray::array![[25.0, f64::NAN]]).unwrap();
        assert_eq!(values, expected.row(0).to_vec());
        assert_eq!(values.len(), 3);

        let err = evaluator.eval_single(&vars).unwrap_err();
        assert!(matches!(err, BoostError::InferenceError(_)));
    }

    #[test]
    fn test_eval_single_and_frame() {
        let file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        trained(Objective::MultiSoftmax).save_model(file.path()).unwrap();
        let evaluator = ModelEvaluator::build(file.path(), ["a", "b"], -999.0).unwrap();

        let vars = HashMap::from([("a".to_string(), 2.0), ("b".to_string(), 2.0)]);
        assert_eq!(evaluator.eval_single(&vars).unwrap(), 0.0);

        let frame = df!("a" => &[2.0, 28.0]).unwrap();
        let preds = evaluator.eval_frame(&frame).unwrap();
        assert_eq!(preds.dim(), (2, 1));
        assert_eq!(preds[[1, 0]], 2.0);
    }
}
