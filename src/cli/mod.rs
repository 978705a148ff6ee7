//! model-trainer CLI module
//!
//! `train` runs model selection over CSV train/test files; `predict` applies a
//! saved artifact to new rows.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

use crate::export::ModelArtifact;
use crate::training::{
    default_candidates, format_params, r2_score, split_features_target, ModelReport, ModelTrainer,
    Regressor, TrainerConfig,
};
use crate::utils::{load_matrix_csv, write_predictions_csv, Timer};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

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
#[command(name = "model-trainer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fit a catalog of regressors, keep the one with the best held-out R²")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Select and save the best regressor for a train/test split
    Train {
        /// Training CSV (header row, label in the last column)
        #[arg(long)]
        train: PathBuf,

        /// Test CSV with the same columns as the training CSV
        #[arg(long)]
        test: PathBuf,

        /// Where to write the selected model
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON trainer configuration; flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Minimum test R² the best model must reach
        #[arg(long)]
        min_score: Option<f64>,

        /// Number of cross-validation folds for the grid search
        #[arg(long)]
        cv_folds: Option<usize>,

        /// Write the selection report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Make predictions using a saved model
    Predict {
        /// Model artifact written by `train`
        #[arg(short, long)]
        model: PathBuf,

        /// Input CSV; one extra trailing column is treated as the label
        #[arg(short, long)]
        data: PathBuf,

        /// Output predictions CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Resolve the trainer configuration from an optional file plus flag overrides
pub fn resolve_config(
    config_path: Option<&Path>,
    output: Option<&Path>,
    min_score: Option<f64>,
    cv_folds: Option<usize>,
) -> anyhow::Result<TrainerConfig> {
    let mut config = match config_path {
        Some(path) => TrainerConfig::from_json_file(path)?,
        None => TrainerConfig::default(),
    };
    if let Some(path) = output {
        config = config.with_artifact_path(path);
    }
    if let Some(score) = min_score {
        config = config.with_min_score(score);
    }
    if let Some(folds) = cv_folds {
        config = config.with_cv(folds);
    }
    config.validate()?;
    Ok(config)
}

fn print_report(report: &ModelReport, best: &str) {
    println!(
        "  {:<24} {:>10} {:>10}  {}",
        muted("Model"),
        muted("Test R²"),
        muted("Train R²"),
        muted("Params")
    );
    println!("  {}", dim(&"─".repeat(72)));
    for score in report.iter() {
        let name = if score.name == best {
            format!("{:<24}", score.name).green().bold()
        } else {
            format!("{:<24}", score.name).white()
        };
        println!(
            "  {} {:>10.4} {:>10.4}  {}",
            name,
            score.test_score,
            score.train_score,
            dim(&format_params(&score.best_params))
        );
    }
}

pub fn cmd_train(
    train_path: &Path,
    test_path: &Path,
    output: Option<&Path>,
    config_path: Option<&Path>,
    min_score: Option<f64>,
    cv_folds: Option<usize>,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let config = resolve_config(config_path, output, min_score, cv_folds)?;

    step_run("Loading data");
    let timer = Timer::start();
    let train = load_matrix_csv(train_path)?;
    let test = load_matrix_csv(test_path)?;
    step_done(&format!(
        "train {} × {}, test {} × {} in {:.2}s",
        train.nrows(),
        train.ncols(),
        test.nrows(),
        test.ncols(),
        timer.elapsed_secs()
    ));

    let candidates = default_candidates(config.random_seed);
    println!(
        "  {} Evaluating {} models ({}-fold grid search)",
        accent("›"),
        candidates.len(),
        config.cv_folds
    );

    let timer = Timer::start();
    let trainer = ModelTrainer::new(config);
    let outcome = trainer.run(&train, &test, &candidates)?;

    section("Report");
    print_report(&outcome.report, &outcome.best_model_name);

    println!();
    step_ok(&format!(
        "Best model {} with test R² {}",
        outcome.best_model_name.cyan(),
        format!("{:.4}", outcome.best_score).white().bold()
    ));
    step_ok(&format!("Saved to {}", outcome.artifact_path.display()));
    println!("  {:<16} {}", muted("Time"), format!("{:.3}s", timer.elapsed_secs()).white());

    if let Some(path) = report_path {
        std::fs::write(path, serde_json::to_string_pretty(&outcome)?)?;
        step_ok(&format!("Report written to {}", path.display()));
    }
    println!();

    Ok(())
}

pub fn cmd_predict(model_path: &Path, data_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let artifact = ModelArtifact::load(model_path)?;
    let meta = artifact.metadata().clone();
    let model = artifact.into_model()?;
    step_done(&format!("{} ({})", meta.model_name, meta.model_type));

    step_run("Loading data");
    let data = load_matrix_csv(data_path)?;
    step_done(&format!("{} rows × {} cols", data.nrows(), data.ncols()));

    let (x, y) = if data.ncols() == meta.n_features {
        (data, None)
    } else if data.ncols() == meta.n_features + 1 {
        let (x, y) = split_features_target(&data)?;
        (x, Some(y))
    } else {
        anyhow::bail!(
            "model expects {} feature columns (optionally plus a label), got {}",
            meta.n_features,
            data.ncols()
        );
    };

    let predictions = model.predict(&x)?;
    println!();
    println!("  {:<16} {}", muted("Predictions"), predictions.len().to_string().white());
    if let Some(y) = y {
        println!(
            "  {:<16} {}",
            muted("R²"),
            format!("{:.4}", r2_score(&y, &predictions)).white().bold()
        );
    }

    if let Some(path) = output {
        write_predictions_csv(&predictions, path)?;
        step_ok(&format!("Predictions written to {}", path.display()));
    } else {
        for (i, p) in predictions.iter().take(10).enumerate() {
            println!("  {:>4}  {:.6}", dim(&i.to_string()), p);
        }
        if predictions.len() > 10 {
            println!("  {}", dim(&format!("... {} more", predictions.len() - 10)));
        }
    }
    println!();

    Ok(())
}
