//! Scores a features CSV with a saved best model.

use std::path::PathBuf;

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
    let features = options
        .features
        .ok_or_else(|| format!("--features is required\n\n{}", help_text()))?;
    let outcome = pipeline::predict(&options.model, &features, &options.out)
        .map_err(|err| err.to_string())?;
    println!(
        "{}: scored {} rows, {} at risk",
        outcome.model_name,
        outcome.rows.len(),
        outcome.at_risk()
    );
    println!("wrote {}", outcome.output.display());
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    model: PathBuf,
    features: Option<PathBuf>,
    out: PathBuf,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            model: PathBuf::from("output").join("best_model.json"),
            features: None,
            out: PathBuf::from("predictions.csv"),
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                options.model = PathBuf::from(value);
            }
            "--features" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--features requires a value".to_string())?;
                options.features = Some(PathBuf::from(value));
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                options.out = PathBuf::from(value);
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(options)
}

fn help_text() -> String {
    [
        "regionrisk-predict",
        "",
        "Scores regency-year feature rows with a model saved by regionrisk-train.",
        "",
        "Usage:",
        "  regionrisk-predict --features <csv> [--model <json>] [--out <csv>]",
        "",
        "Options:",
        "  --features <csv>  Feature CSV with the engineered columns (required).",
        "  --model <json>    Saved model (default: output/best_model.json).",
        "  --out <csv>       Scored output (default: predictions.csv).",
    ]
    .join("\n")
}
