//! Trains and compares the candidate models on a prepared split.

use std::path::PathBuf;

use regionrisk::config::PipelineConfig;
use regionrisk::logging;
use regionrisk::pipeline;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    let config = PipelineConfig::resolve(options.config.as_deref())
        .map_err(|err| err.to_string())?
        .with_overrides(None, options.out_dir);

    let outcome = pipeline::train(&config).map_err(|err| err.to_string())?;
    for score in &outcome.scores {
        let auc = score
            .roc_auc
            .map_or_else(|| "n/a".to_string(), |auc| format!("{auc:.4}"));
        println!(
            "{:<14} accuracy={:.4}  precision={:.4}  recall={:.4}  f1={:.4}  roc_auc={auc}",
            score.model, score.accuracy, score.precision, score.recall, score.f1_score
        );
    }
    println!("grid search best: {}", outcome.grid_best);
    println!("best model: {} -> {}", outcome.best_model, outcome.model_path.display());
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    out_dir: Option<PathBuf>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config = Some(PathBuf::from(value));
            }
            "--out-dir" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--out-dir requires a value".to_string())?;
                options.out_dir = Some(PathBuf::from(value));
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(options)
}

fn help_text() -> String {
    [
        "regionrisk-train",
        "",
        "Fits the baseline, three decision trees and a random forest, then saves the best by F1.",
        "",
        "Usage:",
        "  regionrisk-train [--config <file>] [--out-dir <dir>]",
        "",
        "Options:",
        "  --config <file>   Pipeline config (default: <app root>/regionrisk.toml, else built-in).",
        "  --out-dir <dir>   Output directory (overrides output.dir).",
    ]
    .join("\n")
}
