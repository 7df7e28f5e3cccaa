//! Cardiorisk CLI Module
//!
//! Command-line interface for training, prediction and dataset inspection.

use clap::{Parser, Subcommand};
use colored::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::context::PipelineContext;
use crate::inference::{FeatureRow, PredictionResult, RiskLevel};
use crate::preprocessing::FeatureEncoder;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
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

fn risk_colored(level: RiskLevel) -> ColoredString {
    match level {
        RiskLevel::High => "High".red().bold(),
        RiskLevel::Low => "Low".green().bold(),
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cardiorisk")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Heart disease risk prediction")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Local training dataset (CSV)
    #[arg(long, global = true)]
    pub dataset: Option<PathBuf>,

    /// Model artifact path
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model and persist the artifact
    Train,

    /// Predict heart disease risk for one record or an array of records
    Predict {
        /// JSON file holding a record object or an array of them
        #[arg(short, long)]
        input: PathBuf,

        /// Write predictions as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show dataset and artifact information
    Info,
}

impl Cli {
    /// Resolve the pipeline configuration from file, environment and flags
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(dataset) = &self.dataset {
            config = config.with_dataset_path(dataset);
        }
        if let Some(model) = &self.model {
            config = config.with_artifact_path(model);
        }
        Ok(config)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(ctx: &PipelineContext) -> anyhow::Result<()> {
    section("Train");

    step_run("Training random forest");
    let start = Instant::now();
    let artifact = ctx.retrain()?;
    step_done(&format!("{:.2?}", start.elapsed()));

    let meta = &artifact.metadata;
    println!();
    if let Some(source) = &meta.dataset_source {
        kv("Dataset", &source.to_string());
    }
    kv("Features", &artifact.feature_names.join(", "));
    kv("Train / test", &format!("{} / {}", meta.n_train, meta.n_test));
    if let Some(report) = &meta.report {
        println!(
            "  {:<18} {}",
            muted("Accuracy"),
            format!("{:.4}", report.accuracy).white().bold()
        );
        kv("Macro F1", &format!("{:.4}", report.macro_f1()));
        println!();
        for line in report.to_string().lines() {
            println!("  {}", dim(line));
        }
    }
    kv("Saved to", &ctx.store().path().display().to_string());
    println!();

    Ok(())
}

#[derive(Serialize)]
struct PredictionOutput {
    #[serde(flatten)]
    result: PredictionResult,
    risk_level: RiskLevel,
    risk_probability: f64,
}

fn read_records(path: &Path) -> anyhow::Result<Vec<FeatureRow>> {
    let json = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&json)?;
    let records = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<FeatureRow>, _>>()?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(records)
}

pub fn cmd_predict(
    ctx: &PipelineContext,
    input: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Reading records");
    let records = read_records(input)?;
    step_done(&format!("{} record(s)", records.len()));

    step_run("Loading model");
    let start = Instant::now();
    let predictor = ctx.predictor()?;
    step_done(&format!("{:.2?}", start.elapsed()));

    let results = predictor.predict_batch(&records)?;

    println!();
    println!(
        "  {:<6} {:>6} {:>10} {:>10}  {}",
        muted("#"),
        muted("label"),
        muted("p(0)"),
        muted("p(1)"),
        muted("risk")
    );
    for (i, r) in results.iter().enumerate() {
        println!(
            "  {:<6} {:>6} {:>10.4} {:>10.4}  {} {}",
            i,
            r.label,
            r.probabilities[0],
            r.probabilities[1],
            risk_colored(r.risk_level()),
            dim(&format!("({:.1}%)", r.risk_probability() * 100.0))
        );
    }

    if let Some(path) = output {
        let out: Vec<PredictionOutput> = results
            .iter()
            .map(|r| PredictionOutput {
                result: *r,
                risk_level: r.risk_level(),
                risk_probability: r.risk_probability(),
            })
            .collect();
        std::fs::write(path, serde_json::to_string_pretty(&out)?)?;
        println!();
        kv("Written to", &path.display().to_string());
    }
    println!();

    Ok(())
}

pub fn cmd_info(ctx: &PipelineContext) -> anyhow::Result<()> {
    section("Dataset");

    step_run("Loading dataset");
    let dataset = ctx.load_dataset()?;
    step_done(&format!("{} rows", dataset.n_rows()));

    let names: Vec<String> = dataset
        .frame
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let encoded = FeatureEncoder::new()
        .with_missing_policy(ctx.config().training.missing_features)
        .encode(&dataset.frame)?;
    let (negatives, positives) = encoded.class_counts();

    println!();
    kv("Source", &dataset.source.to_string());
    kv("Rows", &dataset.n_rows().to_string());
    kv("Columns", &names.join(", "));
    kv("No disease", &negatives.to_string());
    kv("Disease", &positives.to_string());

    section("Model");
    match ctx.store().try_load() {
        Some(artifact) => {
            let meta = &artifact.metadata;
            kv("Path", &ctx.store().path().display().to_string());
            kv("Trained at", &meta.trained_at.to_rfc3339());
            kv("Trees", &artifact.model.n_trees().to_string());
            kv("Mean depth", &format!("{:.1}", artifact.model.mean_depth()));
            kv("Leaves", &artifact.model.n_leaves().to_string());
            kv("Features", &artifact.n_features().to_string());
            if let Some(report) = &meta.report {
                kv("Accuracy", &format!("{:.4}", report.accuracy));
                kv("Macro F1", &format!("{:.4}", report.macro_f1()));
            }
        }
        None => {
            println!(
                "  {}",
                "No artifact yet; it will be trained on first prediction".yellow()
            );
        }
    }
    println!();

    Ok(())
}
