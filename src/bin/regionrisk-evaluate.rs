//! Analyses the selected model's test predictions and writes business reports.

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

    let outcome = pipeline::evaluate(&config).map_err(|err| err.to_string())?;
    let evaluation = &outcome.evaluation;
    let m = &evaluation.metrics;
    println!("best model: {}", evaluation.best.model);
    println!(
        "TN={}  FP={}  FN={}  TP={}",
        m.true_negatives, m.false_positives, m.false_negatives, m.true_positives
    );
    for check in &evaluation.criteria {
        println!(
            "{:<10} {}",
            check.name,
            if check.passed { "pass" } else { "fail" }
        );
    }
    println!("high-risk regencies: {}", evaluation.high_risk_count());
    for path in &outcome.written {
        println!("wrote {}", path.display());
    }
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
        "regionrisk-evaluate",
        "",
        "Reads the train stage outputs and writes the risk map, recommendations and summary.",
        "",
        "Usage:",
        "  regionrisk-evaluate [--config <file>] [--out-dir <dir>]",
        "",
        "Options:",
        "  --config <file>   Pipeline config (default: <app root>/regionrisk.toml, else built-in).",
        "  --out-dir <dir>   Output directory (overrides output.dir).",
    ]
    .join("\n")
}
