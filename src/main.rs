//! Runs every pipeline stage: explore, prepare, train and evaluate.

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
        .with_overrides(options.input, options.out_dir);

    let outcome = pipeline::run_all(&config).map_err(|err| err.to_string())?;
    let target = &outcome.explore.exploration.target;
    println!(
        "records: {} ({:.2}% with cases)",
        outcome.explore.exploration.overview.total_records, target.non_zero_pct
    );
    println!(
        "feature rows: {} (train {}, test {})",
        outcome.prepare.feature_rows,
        outcome.prepare.train_rows(),
        outcome.prepare.test_rows()
    );
    for score in &outcome.train.scores {
        println!(
            "{:<14} accuracy={:.4}  precision={:.4}  recall={:.4}  f1={:.4}",
            score.model, score.accuracy, score.precision, score.recall, score.f1_score
        );
    }
    println!("best model: {}", outcome.train.best_model);
    println!(
        "high-risk regencies: {}",
        outcome.evaluate.evaluation.high_risk_count()
    );
    println!("outputs: {}", config.output.dir.display());
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    input: Option<PathBuf>,
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
            "--input" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--input requires a value".to_string())?;
                options.input = Some(PathBuf::from(value));
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
        "regionrisk",
        "",
        "Runs the full regional risk pipeline: explore, prepare, train and evaluate.",
        "",
        "Usage:",
        "  regionrisk [--config <file>] [--input <csv>] [--out-dir <dir>]",
        "",
        "Options:",
        "  --config <file>   Pipeline config (default: <app root>/regionrisk.toml, else built-in).",
        "  --input <csv>     Raw incident CSV (overrides input.path).",
        "  --out-dir <dir>   Output directory (overrides output.dir).",
    ]
    .join("\n")
}
