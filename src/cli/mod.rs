//! boostrun CLI Module
//!
//! Command-line interface for training, prediction and parameter inspection.

use clap::{Args, Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::data::{DataInput, LoadOptions, SplitKind, SplitOptions};
use crate::inference::ModelEvaluator;
use crate::training::{ParameterStore, SplitPredictions, TrainOptions, Trainer};
use crate::utils::{DataLoader, DataSaver};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "boostrun")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and evaluate gradient-boosted tree classifiers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split input files into train/test/control and train a booster
    Train(TrainArgs),

    /// Evaluate a saved model on a data file
    Predict(PredictArgs),

    /// Print the hyperparameters after applying overrides
    Params(ParamArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ParamArgs {
    /// JSON object of parameter values, applied before the overrides
    #[arg(long)]
    pub params_file: Option<PathBuf>,

    /// Override a known parameter: name=value
    #[arg(long = "param", value_name = "NAME=VALUE")]
    pub params: Vec<String>,

    /// Set or introduce a parameter: name=value
    #[arg(long = "define", value_name = "NAME=VALUE")]
    pub defines: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Input file (Parquet, CSV or JSON), optionally with a constant class id: PATH[:CLASS]
    #[arg(short, long = "input", value_name = "PATH[:CLASS]", required = true)]
    pub inputs: Vec<String>,

    /// Comma-separated feature names
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub features: Vec<String>,

    /// Column holding the class id of each entry
    #[arg(long)]
    pub class_column: Option<String>,

    /// Column holding the weight of each entry
    #[arg(long)]
    pub weight_column: Option<String>,

    /// Fraction of each batch (after the control split) used for training
    #[arg(long, default_value_t = 0.5)]
    pub train_fraction: f64,

    /// Fraction of each batch set aside as control
    #[arg(long)]
    pub control_fraction: Option<f64>,

    /// Shuffle batches before splitting; required for multi-class files
    #[arg(long)]
    pub shuffle: Option<bool>,

    #[command(flatten)]
    pub params: ParamArgs,

    /// Stop once the test split has not improved for this many rounds
    #[arg(long)]
    pub early_stopping_rounds: Option<usize>,

    /// Keep the input weights instead of equalizing classes
    #[arg(long)]
    pub no_scale_weights: bool,

    /// Write per-entry predictions of every split to this CSV file
    #[arg(long)]
    pub predictions: Option<PathBuf>,

    /// Output model file; a .json suffix writes a tree dump
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// Model saved in the native format
    #[arg(short, long)]
    pub model: PathBuf,

    /// Input data file
    #[arg(short, long)]
    pub data: PathBuf,

    /// Comma-separated variable names, in training order
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub features: Vec<String>,

    /// Value that marks a missing entry
    #[arg(long, default_value_t = -999.0, allow_negative_numbers = true)]
    pub missing: f64,

    /// Output predictions file (CSV)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// An input file and the class id its entries take, if constant
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub path: PathBuf,
    pub class_id: Option<i32>,
}

impl InputSpec {
    /// Parse `PATH` or `PATH:CLASS`
    pub fn parse(arg: &str) -> Self {
        match arg.rsplit_once(':') {
            Some((path, class)) if !path.is_empty() => match class.trim().parse::<i32>() {
                Ok(class_id) => Self {
                    path: PathBuf::from(path),
                    class_id: Some(class_id),
                },
                Err(_) => Self {
                    path: PathBuf::from(arg),
                    class_id: None,
                },
            },
            _ => Self {
                path: PathBuf::from(arg),
                class_id: None,
            },
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Build a parameter store from a JSON file and command-line assignments
pub fn build_parameters(args: &ParamArgs) -> crate::Result<ParameterStore> {
    let mut store = ParameterStore::new();
    if let Some(path) = &args.params_file {
        store.apply_json_file(path)?;
    }
    for assignment in &args.params {
        store.set_from_str(assignment)?;
    }
    for assignment in &args.defines {
        store.define_from_str(assignment)?;
    }
    Ok(store)
}

pub fn cmd_train(args: &TrainArgs) -> anyhow::Result<()> {
    section("Train");

    let store = build_parameters(&args.params)?;
    let mut input = DataInput::new(args.features.iter().cloned(), args.class_column.as_deref())?;

    let mut split = SplitOptions::new(args.train_fraction);
    if let Some(fraction) = args.control_fraction {
        split = split.with_control_fraction(fraction);
    }
    if let Some(shuffle) = args.shuffle {
        split = split.with_shuffle(shuffle);
    }

    for source in args.inputs.iter().map(|s| InputSpec::parse(s)) {
        let mut options = LoadOptions::new(split.clone());
        if let Some(column) = &args.weight_column {
            options = options.with_weight_column(column.clone());
        }
        if let Some(class_id) = source.class_id {
            options = options.with_class_id(class_id);
        }

        step_run(&format!("Loading {}", source.path.display()));
        let start = Instant::now();
        let summary = input.load_input(&source.path, &options)?;
        step_done(&format!(
            "{} rows -> {} train / {} test / {} control in {:?}",
            summary.n_rows,
            summary.n_train,
            summary.n_test,
            summary.n_control,
            start.elapsed()
        ));
    }

    println!("  {}", kv("Classes", &format!("{:?}", input.class_types()?)));

    let options = TrainOptions {
        early_stopping_rounds: args.early_stopping_rounds,
        scale_weights: !args.no_scale_weights,
        save_predictions: args.predictions.is_some(),
    };

    step_run("Training");
    let start = Instant::now();
    let mut trainer = Trainer::new();
    let booster = trainer.train(&input, &store, &options)?;
    step_done(&format!("{} rounds in {:?}", booster.n_rounds(), start.elapsed()));

    println!();
    for history in booster.evals_result() {
        if let Some(value) = history.values.last() {
            println!(
                "  {:<16} {}",
                muted(&format!("{}-{}", history.name, history.metric)),
                format!("{:.5}", value).white().bold()
            );
        }
    }
    if let Some(best) = booster.best_iteration() {
        println!("  {:<16} {}", muted("Best iteration"), best.to_string().white());
    }
    println!();

    if let Some(path) = &args.output {
        trainer.save_model(path)?;
        step_ok(&format!("Model saved to {}", path.display()));
    }

    if let (Some(path), Some(predictions)) = (&args.predictions, trainer.predictions()) {
        let mut df = prediction_frame(&input, &trainer, predictions)?;
        DataSaver::save_csv(&mut df, path)?;
        step_ok(&format!("Predictions saved to {}", path.display()));
    }

    Ok(())
}

pub fn cmd_predict(args: &PredictArgs) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let evaluator = ModelEvaluator::build(&args.model, args.features.iter().cloned(), args.missing)?;
    step_done(&format!("{} trees", evaluator.booster().n_trees()));

    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_auto(&args.data)?;
    step_done(&format!("{} rows in {:?}", df.height(), start.elapsed()));

    let preds = evaluator.eval_frame(&df)?;
    let names = score_names(preds.ncols(), &[]);
    let columns: Vec<Column> = names
        .iter()
        .zip(preds.columns())
        .map(|(name, values)| Column::new(name.as_str().into(), values.to_vec()))
        .collect();
    let mut out = DataFrame::new(columns)?;

    match &args.output {
        Some(path) => {
            DataSaver::save_csv(&mut out, path)?;
            step_ok(&format!("Predictions saved to {}", path.display()));
        }
        None => {
            println!();
            println!("{}", out.head(Some(10)));
        }
    }

    Ok(())
}

pub fn cmd_params(args: &ParamArgs) -> anyhow::Result<()> {
    section("Parameters");
    let store = build_parameters(args)?;
    for (name, value) in store.parameters() {
        println!("  {:<20} {}", muted(&name), value.to_string().white());
    }
    println!();
    Ok(())
}

fn score_names(n_outputs: usize, class_types: &[i32]) -> Vec<String> {
    if n_outputs == 1 {
        return vec!["score".to_string()];
    }
    (0..n_outputs)
        .map(|k| match class_types.get(k) {
            Some(class_id) => format!("score_{}", class_id),
            None => format!("score_{}", k),
        })
        .collect()
}

/// One row per entry of every split: split name, class, training weight and scores
fn prediction_frame(
    input: &DataInput,
    trainer: &Trainer,
    predictions: &SplitPredictions,
) -> crate::Result<DataFrame> {
    let mut split_names: Vec<&str> = Vec::new();
    let mut classes: Vec<i32> = Vec::new();
    let mut weights: Vec<f64> = Vec::new();
    let n_outputs = predictions.train.ncols();
    let mut scores: Vec<Vec<f64>> = vec![Vec::new(); n_outputs];

    for kind in [SplitKind::Train, SplitKind::Test, SplitKind::Control] {
        let (Some(split), Some(preds), Some(split_weights)) =
            (input.split(kind), predictions.get(kind), trainer.weights(kind))
        else {
            continue;
        };
        split_names.extend(std::iter::repeat(kind.as_str()).take(split.n_rows()));
        classes.extend(split.classes.iter().copied());
        weights.extend(split_weights.iter().copied());
        for (column, values) in scores.iter_mut().zip(preds.columns()) {
            column.extend(values.iter().copied());
        }
    }

    let mut columns = vec![
        Column::new("split".into(), split_names),
        Column::new("class".into(), classes),
        Column::new("weight".into(), weights),
    ];
    for (name, values) in score_names(n_outputs, trainer.class_types()).iter().zip(scores) {
        columns.push(Column::new(name.as_str().into(), values));
    }
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_frame_writes_training_weights() {
        let mut input = DataInput::new(["x", "y"], None).unwrap();
        let options = SplitOptions::new(0.5).with_control_fraction(0.25);
        for (class_id, weight) in [(0i32, -1.0), (1i32, 3.0)] {
            let features = ndarray::Array2::from_shape_fn((60, 2), |(i, j)| {
                (i % 10) as f64 + 5.0 * class_id as f64 + j as f64
            });
            input.add_data(features, weight, class_id, &options).unwrap();
        }

        let mut store = ParameterStore::new();
        store.set("num_round", 3i64).unwrap();
        let mut trainer = Trainer::new();
        trainer
            .train(&input, &store, &TrainOptions::new().with_save_predictions(true))
            .unwrap();

        let df = prediction_frame(&input, &trainer, trainer.predictions().unwrap()).unwrap();
        assert_eq!(df.height(), 120);

        let split_column = df.column("split").unwrap().as_materialized_series();
        let splits = split_column.str().unwrap();
        let classes = crate::utils::i32_column(&df, "class").unwrap();
        let weights = crate::utils::f64_column(&df, "weight", f64::NAN).unwrap();
        let control_sum = |class_id: i32| -> f64 {
            splits
                .into_iter()
                .zip(classes.iter().zip(weights.iter()))
                .filter(|(s, (&c, _))| *s == Some("control") && c == class_id)
                .map(|(_, (_, &w))| w)
                .sum()
        };
        assert!((control_sum(0) - 15.0).abs() < 1e-9);
        assert!((control_sum(1) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_input_path_with_class() {
        assert_eq!(
            InputSpec::parse("signal.parquet:1"),
            InputSpec { path: PathBuf::from("signal.parquet"), class_id: Some(1) }
        );
        assert_eq!(InputSpec::parse("mixed.parquet").class_id, None);
        assert_eq!(InputSpec::parse("dir:with/colon.csv").path, PathBuf::from("dir:with/colon.csv"));
        assert_eq!(InputSpec::parse("bkg.csv:-2").class_id, Some(-2));
    }

    #[test]
    fn test_cli_parses_train() {
        let cli = Cli::try_parse_from([
            "boostrun", "train",
            "--input", "a.parquet:0", "--input", "b.parquet:1",
            "--features", "pt,eta",
            "--param", "eta=0.1",
            "--early-stopping-rounds", "10",
            "--shuffle", "true",
        ])
        .unwrap();

        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.inputs.len(), 2);
                assert_eq!(args.features, vec!["pt", "eta"]);
                assert_eq!(args.params.params, vec!["eta=0.1"]);
                assert_eq!(args.shuffle, Some(true));
                assert_eq!(args.early_stopping_rounds, Some(10));
                assert!(!args.no_scale_weights);
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_cli_parses_negative_missing() {
        let cli = Cli::try_parse_from([
            "boostrun", "predict", "--model", "m.bin", "--data", "d.csv",
            "--features", "a,b", "--missing", "-1",
        ])
        .unwrap();
        match cli.command {
            Commands::Predict(args) => assert_eq!(args.missing, -1.0),
            _ => panic!("expected predict"),
        }
    }

    #[test]
    fn test_build_parameters() {
        let args = ParamArgs {
            params_file: None,
            params: vec!["max_depth=3".to_string()],
            defines: vec!["seed=7".to_string()],
        };
        let store = build_parameters(&args).unwrap();
        assert_eq!(store.get("max_depth").and_then(|v| v.as_i64()), Some(3));
        assert_eq!(store.get("seed").and_then(|v| v.as_i64()), Some(7));

        let bad = ParamArgs {
            params: vec!["max_depth=deep".to_string()],
            ..Default::default()
        };
        assert!(build_parameters(&bad).is_err());
    }

    #[test]
    fn test_score_names() {
        assert_eq!(score_names(1, &[0, 1]), vec!["score"]);
        assert_eq!(score_names(3, &[2, 5, 9]), vec!["score_2", "score_5", "score_9"]);
    }
}
