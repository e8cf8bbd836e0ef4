//! Type-checked hyperparameter store

use crate::error::{BoostError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
}

/// The type tag of a [`ParamValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Float,
    Str,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Str => "string",
        };
        f.write_str(name)
    }
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Str(_) => ParamKind::Str,
        }
    }

    /// Numeric view of the value; integers widen to floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Str(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Parse text into a value of the given kind
    pub fn parse_as(text: &str, kind: ParamKind) -> Option<Self> {
        let text = text.trim();
        match kind {
            ParamKind::Int => text.parse().ok().map(ParamValue::Int),
            ParamKind::Float => text.parse().ok().map(ParamValue::Float),
            ParamKind::Str => Some(ParamValue::Str(text.to_string())),
        }
    }

    /// Parse text, trying int, then float, then falling back to string
    pub fn infer(text: &str) -> Self {
        let text = text.trim();
        if let Ok(v) = text.parse::<i64>() {
            ParamValue::Int(v)
        } else if let Ok(v) = text.parse::<f64>() {
            ParamValue::Float(v)
        } else {
            ParamValue::Str(text.to_string())
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// Name of the boosting round count parameter
pub const NUM_ROUND: &str = "num_round";

fn default_parameters() -> BTreeMap<String, ParamValue> {
    let defaults: [(&str, ParamValue); 14] = [
        ("objective", "binary:logistic".into()),
        ("eta", 0.07.into()),
        ("max_depth", 5.into()),
        ("silent", 1.into()),
        ("nthread", 1.into()),
        ("eval_metric", "auc".into()),
        ("subsample", 0.6.into()),
        ("alpha", 8.0.into()),
        ("gamma", 2.0.into()),
        ("lambda", 1.0.into()),
        ("min_child_weight", 1.0.into()),
        ("colsample_bytree", 1.0.into()),
        ("scale_pos_weight", 1.0.into()),
        (NUM_ROUND, 500.into()),
    ];
    defaults
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Named hyperparameters whose types are fixed by their first value.
///
/// `set_*` only touches known names; `define_*` may also introduce new
/// ones. Both reject a value whose type differs from the stored one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterStore {
    params: BTreeMap<String, ParamValue>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self {
            params: default_parameters(),
        }
    }
}

impl ParameterStore {
    /// Store holding the default parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite known parameters; nothing is changed if any update is rejected
    pub fn set_parameters<I, K>(&mut self, updates: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        self.apply(updates, false)
    }

    /// Overwrite known parameters and introduce unknown ones
    pub fn define_parameters<I, K>(&mut self, updates: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        self.apply(updates, true)
    }

    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        self.set_parameters([(name, value.into())])
    }

    pub fn define(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        self.define_parameters([(name, value.into())])
    }

    fn apply<I, K>(&mut self, updates: I, allow_new: bool) -> Result<()>
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        let updates: Vec<(String, ParamValue)> =
            updates.into_iter().map(|(k, v)| (k.into(), v)).collect();

        for (name, value) in &updates {
            self.check(name, value, allow_new)?;
        }
        self.params.extend(updates);
        Ok(())
    }

    fn check(&self, name: &str, value: &ParamValue, allow_new: bool) -> Result<()> {
        match self.params.get(name) {
            Some(current) if current.kind() != value.kind() => Err(BoostError::ParameterType {
                name: name.to_string(),
                expected: current.kind().to_string(),
                actual: value.kind().to_string(),
            }),
            Some(_) => Ok(()),
            None if allow_new => Ok(()),
            None => Err(BoostError::UnknownParameter(name.to_string())),
        }
    }

    /// Apply a `name=value` assignment to a known parameter, parsing the
    /// value as the stored type
    pub fn set_from_str(&mut self, assignment: &str) -> Result<()> {
        let (name, text) = split_assignment(assignment)?;
        let current = self
            .params
            .get(name)
            .ok_or_else(|| BoostError::UnknownParameter(name.to_string()))?;
        let value = parse_for(name, text, current.kind())?;
        self.set(name, value)
    }

    /// Apply a `name=value` assignment, introducing the name if needed
    pub fn define_from_str(&mut self, assignment: &str) -> Result<()> {
        let (name, text) = split_assignment(assignment)?;
        let value = match self.params.get(name) {
            Some(current) => parse_for(name, text, current.kind())?,
            None => ParamValue::infer(text),
        };
        self.define(name, value)
    }

    /// Apply a JSON object of known parameters.
    ///
    /// Integral JSON numbers are accepted for float parameters, since JSON
    /// does not tell `1` and `1.0` apart.
    pub fn apply_json_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        let updates: BTreeMap<String, ParamValue> = serde_json::from_str(&text)?;
        let updates = updates.into_iter().map(|(name, value)| {
            let value = match (self.params.get(&name).map(ParamValue::kind), value) {
                (Some(ParamKind::Float), ParamValue::Int(v)) => ParamValue::Float(v as f64),
                (_, value) => value,
            };
            (name, value)
        });
        let updates: Vec<_> = updates.collect();
        self.set_parameters(updates)
    }

    /// Independent copy of all parameters
    pub fn parameters(&self) -> BTreeMap<String, ParamValue> {
        self.params.clone()
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Number of boosting rounds
    pub fn num_round(&self) -> Result<usize> {
        round_count(&self.params)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.params)?)
    }
}

/// Read the round count out of a parameter map
pub fn round_count(params: &BTreeMap<String, ParamValue>) -> Result<usize> {
    match params.get(NUM_ROUND).and_then(ParamValue::as_i64) {
        Some(n) if n > 0 => Ok(n as usize),
        Some(n) => Err(BoostError::ValidationError(format!(
            "{} must be positive, got {}",
            NUM_ROUND, n
        ))),
        None => Err(BoostError::ValidationError(format!(
            "{} must be set as an integer",
            NUM_ROUND
        ))),
    }
}

fn split_assignment(assignment: &str) -> Result<(&str, &str)> {
    assignment
        .split_once('=')
        .map(|(name, value)| (name.trim(), value))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| {
            BoostError::ValidationError(format!(
                "expected an assignment of the form name=value, got '{}'",
                assignment
            ))
        })
}

fn parse_for(name: &str, text: &str, kind: ParamKind) -> Result<ParamValue> {
    ParamValue::parse_as(text, kind).ok_or_else(|| BoostError::ParameterType {
        name: name.to_string(),
        expected: kind.to_string(),
        actual: format!("'{}'", text.trim()),
    })
}
